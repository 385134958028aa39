/*!
 * Tests for exercise selection order
 */

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use aphasia_exercises::database::models::{AssignmentStatus, Visibility};
use aphasia_exercises::exercises::{ExerciseSelector, SelectionOrigin, SelectionOutcome};

use crate::common::{self, HOSPITAL, PATIENT};

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

#[tokio::test]
async fn test_select_withPersonalizedPending_shouldWinOverLowerPriority() {
    let repo = common::memory_repo();
    let base = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let copy = common::seed_personalized_vnest(&repo, &base.id, PATIENT, HOSPITAL, "cortar")
        .await
        .unwrap();
    common::seed_assignment(&repo, PATIENT, &base, HOSPITAL, 1, None).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &copy, HOSPITAL, 7, None).await.unwrap();

    let outcome = ExerciseSelector::new(repo)
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert_eq!(outcome.exercise().map(|e| e.id.as_str()), Some(copy.id.as_str()));
    assert!(outcome.highlight());
    assert_eq!(outcome.origin(), Some(SelectionOrigin::Pending));
}

#[tokio::test]
async fn test_select_withSeveralPending_shouldPickLowestPriority() {
    let repo = common::memory_repo();
    let later = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let sooner = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &later, HOSPITAL, 3, None).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &sooner, HOSPITAL, 2, None).await.unwrap();

    let outcome = ExerciseSelector::new(repo)
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert_eq!(outcome.exercise().map(|e| e.id.clone()), Some(sooner.id));
    assert!(!outcome.highlight());
}

#[tokio::test]
async fn test_select_hospitalCortar_withPendingAndCompleted_shouldReturnPending() {
    let repo = common::memory_repo();
    let pending = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let done = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &pending, HOSPITAL, 2, None).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &done, HOSPITAL, 1, Some(Utc::now() - Duration::days(3)))
        .await
        .unwrap();

    let outcome = ExerciseSelector::new(repo)
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert_eq!(outcome.exercise().map(|e| e.id.clone()), Some(pending.id));
    assert_eq!(outcome.origin(), Some(SelectionOrigin::Pending));
}

#[tokio::test]
async fn test_select_withOnlyCompleted_shouldReturnOldestPerformed() {
    let repo = common::memory_repo();
    let recent = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let oldest = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &recent, HOSPITAL, 1, Some(Utc::now() - Duration::days(1)))
        .await
        .unwrap();
    common::seed_assignment(&repo, PATIENT, &oldest, HOSPITAL, 2, Some(Utc::now() - Duration::days(10)))
        .await
        .unwrap();

    let outcome = ExerciseSelector::new(repo)
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert_eq!(outcome.exercise().map(|e| e.id.clone()), Some(oldest.id));
    assert_eq!(outcome.origin(), Some(SelectionOrigin::OldestCompleted));
}

#[tokio::test]
async fn test_select_withNothingAnywhere_shouldReturnErrorOutcome() {
    let repo = common::memory_repo();
    common::seed_vnest(&repo, HOSPITAL, "medir", Visibility::Public).await.unwrap();

    let outcome = ExerciseSelector::new(repo)
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert!(matches!(outcome, SelectionOutcome::Unavailable { .. }));
    let message = outcome.error_message().unwrap();
    assert!(message.contains("'cortar'"));
    assert!(message.contains("'Un hospital'"));
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({"error": message})
    );
}

#[tokio::test]
async fn test_select_withPublicCatalogEntry_shouldAssignIt() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let selector = ExerciseSelector::new(repo.clone());

    let first = selector.select(PATIENT, HOSPITAL, "cortar", &mut rng()).await;

    assert_eq!(first.origin(), Some(SelectionOrigin::NewlyAssigned));
    assert_eq!(first.exercise().map(|e| e.id.clone()), Some(exercise.id.clone()));
    let assignment = repo.get_assignment(PATIENT, &exercise.id).await.unwrap().unwrap();
    assert_eq!(assignment.priority, 1);
    assert_eq!(assignment.status, AssignmentStatus::Pending);

    let second = selector.select(PATIENT, HOSPITAL, "cortar", &mut rng()).await;
    assert_eq!(second.origin(), Some(SelectionOrigin::Pending));
    assert_eq!(second.exercise().map(|e| e.id.clone()), Some(exercise.id));
}

#[tokio::test]
async fn test_select_withSeededRng_shouldPickAmongPublicEntries() {
    let repo = common::memory_repo();
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap().id);
    }

    let outcome = ExerciseSelector::new(repo.clone())
        .select(PATIENT, HOSPITAL, "cortar", &mut StdRng::seed_from_u64(7))
        .await;

    let chosen = outcome.exercise().map(|e| e.id.clone()).unwrap();
    assert!(ids.contains(&chosen));
    assert_eq!(repo.list_assignments(PATIENT).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_select_withOnlyPrivateEntry_shouldNeverAssignIt() {
    let repo = common::memory_repo();
    let private = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Private).await.unwrap();

    let outcome = ExerciseSelector::new(repo.clone())
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert!(matches!(outcome, SelectionOutcome::Unavailable { .. }));
    assert!(repo.get_assignment(PATIENT, &private.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_select_withEntryAssignedUnderOtherContext_shouldNotReassign() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &exercise, "Una cocina", 4, None).await.unwrap();

    let outcome = ExerciseSelector::new(repo.clone())
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert!(matches!(outcome, SelectionOutcome::Unavailable { .. }));
    let assignment = repo.get_assignment(PATIENT, &exercise.id).await.unwrap().unwrap();
    assert_eq!(assignment.context.as_deref(), Some("Una cocina"));
    assert_eq!(assignment.priority, 4);
}

#[tokio::test]
async fn test_select_withCorruptAssignmentRow_shouldReturnFailedOutcome() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::seed_assignment(&repo, PATIENT, &exercise, HOSPITAL, 1, None).await.unwrap();
    repo.connection()
        .execute(|conn| {
            conn.execute("UPDATE assignments SET therapy = 'MIT'", [])?;
            Ok(())
        })
        .unwrap();

    let outcome = ExerciseSelector::new(repo)
        .select(PATIENT, HOSPITAL, "cortar", &mut rng())
        .await;

    assert!(matches!(outcome, SelectionOutcome::Failed { .. }));
    assert!(outcome.exercise().is_none());
    let message = outcome.error_message().unwrap().to_string();
    assert!(message.contains("MIT"), "{}", message);
    assert_eq!(serde_json::to_value(&outcome).unwrap(), serde_json::json!({"error": message}));
}
