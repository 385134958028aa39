/*!
 * Tests for the assignment writer and SR review schedule
 */

use chrono::{Duration, Utc};

use aphasia_exercises::database::models::{AssignmentStatus, SrStatus, Visibility};
use aphasia_exercises::errors::AssignmentError;
use aphasia_exercises::exercises::review::is_due;
use aphasia_exercises::exercises::AssignmentWriter;

use crate::common::{self, HOSPITAL, PATIENT};

#[tokio::test]
async fn test_assign_withExistingPriorities_shouldUseMaxPlusOne() {
    let repo = common::memory_repo();
    for priority in [1, 3, 5] {
        let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
        common::seed_assignment(&repo, PATIENT, &exercise, HOSPITAL, priority, None)
            .await
            .unwrap();
    }
    let fresh = common::seed_vnest(&repo, HOSPITAL, "medir", Visibility::Public).await.unwrap();

    let record = AssignmentWriter::new(repo.clone()).assign(PATIENT, &fresh.id).await.unwrap();

    assert_eq!(record.priority, 6);
    assert_eq!(record.status, AssignmentStatus::Pending);
    assert_eq!(record.times_performed, 0);
}

#[tokio::test]
async fn test_assign_forOtherPatient_shouldStartAtOne() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &exercise, HOSPITAL, 9, None).await.unwrap();

    let record = AssignmentWriter::new(repo).assign("luis@example.com", &exercise.id).await.unwrap();

    assert_eq!(record.priority, 1);
}

#[tokio::test]
async fn test_assign_personalizedExercise_shouldCarryFlag() {
    let repo = common::memory_repo();
    let base = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let copy = common::seed_personalized_vnest(&repo, &base.id, PATIENT, HOSPITAL, "cortar")
        .await
        .unwrap();

    let record = AssignmentWriter::new(repo).assign(PATIENT, &copy.id).await.unwrap();

    assert!(record.personalized);
    assert_eq!(record.context.as_deref(), Some(HOSPITAL));
}

#[tokio::test]
async fn test_recordCompletion_twice_shouldCountBoth() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let writer = AssignmentWriter::new(repo);
    writer.assign(PATIENT, &exercise.id).await.unwrap();
    let first = Utc::now() - Duration::days(1);
    let second = Utc::now();

    writer.record_completion(PATIENT, &exercise.id, first).await.unwrap();
    let record = writer.record_completion(PATIENT, &exercise.id, second).await.unwrap();

    assert_eq!(record.status, AssignmentStatus::Completed);
    assert_eq!(record.times_performed, 2);
    assert_eq!(record.last_performed.map(|t| t.timestamp()), Some(second.timestamp()));
}

#[tokio::test]
async fn test_recordSrReview_failureAfterSuccesses_shouldResetSchedule() {
    let repo = common::memory_repo();
    let card = common::seed_sr(&repo, "¿Cómo se llama tu esposo?", "Luis").await.unwrap();
    let writer = AssignmentWriter::new(repo);
    let now = Utc::now();

    writer.record_sr_review(&card.id, true, now).await.unwrap();
    writer.record_sr_review(&card.id, true, now).await.unwrap();
    let failed = writer.record_sr_review(&card.id, false, now).await.unwrap();

    assert_eq!(failed.interval_index, 0);
    assert_eq!(failed.lapses, 1);
    assert_eq!(failed.success_streak, 0);
    assert_eq!(failed.next_due, now.timestamp() + 15);
    assert!(!is_due(&failed, now.timestamp()));
    assert!(is_due(&failed, now.timestamp() + 15));
}

#[tokio::test]
async fn test_recordSrReview_throughWholeSchedule_shouldMaster() {
    let repo = common::memory_repo();
    let card = common::seed_sr(&repo, "¿En qué ciudad naciste?", "Bogotá").await.unwrap();
    let writer = AssignmentWriter::new(repo);
    let now = Utc::now();

    let mut last = None;
    for _ in 0..5 {
        last = Some(writer.record_sr_review(&card.id, true, now).await.unwrap());
    }
    let last = last.unwrap();

    assert_eq!(last.status, SrStatus::Mastered);
    assert_eq!(last.interval_index, 4);
    assert_eq!(last.next_due, now.timestamp() + 300);
}

#[tokio::test]
async fn test_recordSrReview_forVnestExercise_shouldReturnNotFound() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();

    let result = AssignmentWriter::new(repo).record_sr_review(&exercise.id, true, Utc::now()).await;

    assert!(matches!(result, Err(AssignmentError::ExerciseNotFound(_))));
}
