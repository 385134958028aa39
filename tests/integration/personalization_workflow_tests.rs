/*!
 * Integration tests for personalization and profile structuring
 */

use serde_json::json;

use aphasia_exercises::database::models::{PatientRecord, TherapyType, Visibility};
use aphasia_exercises::errors::GenerationError;
use aphasia_exercises::generation::{PersonalizationWorkflow, ProfileWorkflow};
use aphasia_exercises::providers::MockProvider;

use crate::common::{self, HOSPITAL, PATIENT};

fn personalized_vnest_reply() -> String {
    json!({
        "terapia": "VNEST",
        "verbo": "cortar",
        "nivel": "medio",
        "pares": [{"sujeto": "Luis", "objeto": "el pan"}],
        "oraciones": [
            {"oracion": "Luis corta el pan en la cocina", "correcta": true},
            "Luis corta el pan por la mañana"
        ],
        "descripcion_adaptado": "Adaptado a la familia de Ana"
    })
    .to_string()
}

#[tokio::test]
async fn test_personalize_vnestBase_shouldStorePrivateCopyAndAssignIt() {
    let repo = common::memory_repo();
    let base = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let provider = MockProvider::scripted([personalized_vnest_reply()]);

    let output = PersonalizationWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &base.id, &common::sample_profile())
        .await
        .unwrap();

    assert!(output.ok);
    assert_ne!(output.saved_id, base.id);
    assert_eq!(output.personalized["id"], output.saved_id.as_str());
    assert_eq!(output.personalized["referencia_base"], base.id.as_str());
    assert_eq!(output.personalized["id_paciente"], PATIENT);
    assert_eq!(output.personalized["personalizado"], true);
    assert_eq!(output.personalized["contexto"], HOSPITAL);

    let general = repo.get_exercise(&output.saved_id).await.unwrap().unwrap();
    assert!(general.personalized);
    assert_eq!(general.visibility, Visibility::Private);
    assert_eq!(general.base_reference.as_deref(), Some(base.id.as_str()));
    assert_eq!(general.patient_id.as_deref(), Some(PATIENT));
    assert_eq!(general.created_by, "IA");
    assert_eq!(general.adapted_description, "Adaptado a la familia de Ana");

    let detail = repo.get_vnest_exercise(&output.saved_id).await.unwrap().unwrap();
    assert_eq!(detail.context, HOSPITAL);
    assert_eq!(detail.sentences.len(), 2);

    let assignment = repo.get_assignment(PATIENT, &output.saved_id).await.unwrap().unwrap();
    assert!(assignment.personalized);
    assert_eq!(assignment.priority, 1);

    let prompt = &provider.requests()[0].user;
    assert!(prompt.contains(&base.id));
    assert!(prompt.contains("Luis"));
}

#[tokio::test]
async fn test_personalize_srBase_shouldAssignWithoutContext() {
    let repo = common::memory_repo();
    let base = common::seed_sr(&repo, "¿Cómo se llama tu esposo?", "Luis").await.unwrap();
    let provider = MockProvider::scripted([json!({
        "pregunta": "¿Cómo se llama el esposo con quien caminas al parque?",
        "rta_correcta": "Luis",
        "descripcion_adaptado": "Incluye la rutina del parque"
    })
    .to_string()]);

    let output = PersonalizationWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &base.id, &common::sample_profile())
        .await
        .unwrap();

    let card = repo.get_sr_exercise(&output.saved_id).await.unwrap().unwrap();
    assert_eq!(card.correct_answer, "Luis");
    assert!(card.question.contains("parque"));
    assert_eq!(output.personalized["terapia"], "SR");

    let assignment = repo.get_assignment(PATIENT, &output.saved_id).await.unwrap().unwrap();
    assert_eq!(assignment.therapy, TherapyType::Sr);
    assert_eq!(assignment.context, None);
}

#[tokio::test]
async fn test_personalize_withUnknownExercise_shouldFailBeforeCallingModel() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted([personalized_vnest_reply()]);

    let result = PersonalizationWorkflow::new(&provider, repo)
        .run(PATIENT, "E000000", &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::ExerciseNotFound(id)) if id == "E000000"));
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_personalize_withMismatchedTherapy_shouldFail() {
    let repo = common::memory_repo();
    let base = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let provider = MockProvider::scripted([r#"{"terapia": "SR", "pregunta": "¿Quién?", "rta_correcta": "Luis"}"#]);

    let result = PersonalizationWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &base.id, &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::UnsupportedTherapy(_))));
    assert!(repo.list_assignments(PATIENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_structureProfile_withSave_shouldPersistOnPatient() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted([r#"{"personal": {"nombre": "Ana"}, "familia": [{"nombre": "Luis"}],}"#]);

    let output = ProfileWorkflow::new(&provider, repo.clone())
        .run(PATIENT, "Ana vive con su esposo Luis.", true)
        .await
        .unwrap();

    assert!(output.ok && output.saved);
    assert_eq!(output.structured_profile["personal"]["nombre"], "Ana");
    let patient = repo.get_patient(PATIENT).await.unwrap().unwrap();
    assert_eq!(patient.profile, output.structured_profile);
}

#[tokio::test]
async fn test_structureProfile_withoutSave_shouldLeaveStoreUntouched() {
    let repo = common::memory_repo();
    repo.upsert_patient(&PatientRecord::new(PATIENT, json!({"personal": {"nombre": "Ana María"}})))
        .await
        .unwrap();
    let provider = MockProvider::scripted([r#"{"personal": {"nombre": "Ana"}}"#]);

    let output = ProfileWorkflow::new(&provider, repo.clone())
        .run(PATIENT, "Ana", false)
        .await
        .unwrap();

    assert!(!output.saved);
    let patient = repo.get_patient(PATIENT).await.unwrap().unwrap();
    assert_eq!(patient.profile["personal"]["nombre"], "Ana María");
}

#[tokio::test]
async fn test_structureProfile_withNonObjectReply_shouldFail() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted([r#"["Ana", "Luis"]"#]);

    let result = ProfileWorkflow::new(&provider, repo).run(PATIENT, "Ana", true).await;

    assert!(matches!(result, Err(GenerationError::MalformedJson(_))));
}

#[tokio::test]
async fn test_personalize_whenAssignmentFails_shouldNotStoreCopy() {
    let repo = common::memory_repo();
    let base = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    common::reject_assignments(&repo).unwrap();
    let provider = MockProvider::scripted([personalized_vnest_reply()]);

    let result = PersonalizationWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &base.id, &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::Store(_))));
    let stats = repo.connection().stats().unwrap();
    assert_eq!(stats.exercise_count, 1);
    assert_eq!(stats.vnest_count, 1);
}

#[tokio::test]
async fn test_personalize_vnestBaseWithoutContext_shouldFailBeforeStoring() {
    let repo = common::memory_repo();
    let base = common::seed_vnest(&repo, "  ", "cortar", Visibility::Public).await.unwrap();
    let provider = MockProvider::scripted([personalized_vnest_reply()]);

    let result = PersonalizationWorkflow::new(&provider, repo.clone())
        .run(PATIENT, &base.id, &common::sample_profile())
        .await;

    assert!(matches!(result, Err(GenerationError::Assignment(_))));
    assert_eq!(repo.connection().stats().unwrap().exercise_count, 1);
}
