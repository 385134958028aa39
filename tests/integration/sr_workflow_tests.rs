/*!
 * Integration tests for spaced-retrieval card generation
 */

use serde_json::json;

use aphasia_exercises::database::models::{AssignmentStatus, SrStatus, TherapyType, Visibility};
use aphasia_exercises::errors::GenerationError;
use aphasia_exercises::generation::SrWorkflow;
use aphasia_exercises::providers::MockProvider;

use crate::common::{self, PATIENT};

#[tokio::test]
async fn test_srWorkflow_withCards_shouldStoreAndAssignEach() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted([json!({
        "cards": [
            {"stimulus": "¿Cómo se llama tu esposo?", "answer": "Luis"},
            {"pregunta": "¿En qué ciudad naciste?", "respuesta": "Bogotá"}
        ]
    })
    .to_string()]);

    let output = SrWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &common::sample_profile())
        .await
        .unwrap();

    assert_eq!(output.user_id, PATIENT);
    assert_eq!(output.cards.len(), 2);
    assert_eq!(output.exercise_ids.len(), 2);
    assert!(provider.requests()[0].user.contains("Bogotá"));

    let assignments = repo.list_assignments(PATIENT).await.unwrap();
    assert_eq!(assignments.iter().map(|a| a.priority).collect::<Vec<_>>(), vec![1, 2]);
    assert!(assignments.iter().all(|a| a.status == AssignmentStatus::Pending && a.context.is_none()));

    for id in &output.exercise_ids {
        let general = repo.get_exercise(id).await.unwrap().unwrap();
        assert_eq!(general.therapy, TherapyType::Sr);
        assert_eq!(general.visibility, Visibility::Private);
        assert_eq!(general.created_by, "IA");
        assert_eq!(general.patient_id.as_deref(), Some(PATIENT));
        assert!(!general.personalized);

        let card = repo.get_sr_exercise(id).await.unwrap().unwrap();
        assert_eq!(card.status, SrStatus::Learning);
        assert_eq!(card.interval_index, 0);
    }

    let second = repo.get_sr_exercise(&output.exercise_ids[1]).await.unwrap().unwrap();
    assert_eq!(second.correct_answer, "Bogotá");
}

#[tokio::test]
async fn test_srWorkflow_withEmptyCards_shouldFail() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted([r#"{"cards": []}"#]);

    let result = SrWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::NoCards)));
    assert!(repo.list_assignments(PATIENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_srWorkflow_withOnlyBlankCards_shouldFail() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted([r#"{"cards": [{"stimulus": " ", "answer": "Luis"}]}"#]);

    let result = SrWorkflow::new(&provider, repo)
        .run(PATIENT, &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::NoCards)));
}

#[test]
fn test_srWorkflow_withUnparseableReply_shouldReturnMalformed() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted(["Lo siento, no puedo ayudar con eso."]);

    let result = tokio_test::block_on(SrWorkflow::new(&provider, repo).run(PATIENT, &common::sample_profile()));

    assert!(matches!(result, Err(GenerationError::MalformedJson(_))));
}

#[tokio::test]
async fn test_srWorkflow_whenAssignmentFails_shouldLeaveNoCardBehind() {
    let repo = common::memory_repo();
    common::reject_assignments(&repo).unwrap();
    let provider = MockProvider::scripted([r#"{"cards": [{"stimulus": "¿Cómo se llama tu esposo?", "answer": "Luis"}]}"#]);

    let result = SrWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::Store(_))));
    let stats = repo.connection().stats().unwrap();
    assert_eq!(stats.exercise_count, 0);
    assert_eq!(stats.sr_count, 0);
}
