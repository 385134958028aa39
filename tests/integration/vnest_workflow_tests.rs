/*!
 * Integration tests for the VNEST generation pipeline
 */

use aphasia_exercises::database::models::{Difficulty, TherapyType, Visibility};
use aphasia_exercises::errors::GenerationError;
use aphasia_exercises::generation::{PromptSettings, VnestRequest, VnestWorkflow};
use aphasia_exercises::providers::MockProvider;

use crate::common::{self, HOSPITAL};

#[tokio::test]
async fn test_vnestWorkflow_withTenSentences_shouldStoreExercise() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted(common::vnest_script(10));
    let request = VnestRequest::new(HOSPITAL, Difficulty::Medium)
        .created_by("dra.perez")
        .visibility(Visibility::Public);

    let output = VnestWorkflow::new(&provider, repo.clone()).run(&request).await.unwrap();

    assert_eq!(output.verb, "cortar");
    assert_eq!(output.level, Difficulty::Medium);
    assert_eq!(output.context, HOSPITAL);
    assert!(!output.reviewed);
    assert_eq!(output.pairs.len(), 2);
    assert_eq!(output.sentences.len(), 10);
    assert_eq!(provider.request_count(), 5);

    let general = repo.get_exercise(&output.id).await.unwrap().unwrap();
    assert_eq!(general.therapy, TherapyType::Vnest);
    assert_eq!(general.visibility, Visibility::Public);
    assert_eq!(general.created_by, "dra.perez");
    assert!(!general.personalized);

    let detail = repo.get_vnest_exercise(&output.id).await.unwrap().unwrap();
    assert_eq!(detail.sentences, output.sentences);
    assert_eq!(detail.pairs[1].subject, "El médico");
}

#[tokio::test]
async fn test_vnestWorkflow_withNineSentences_shouldRejectAndStoreNothing() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted(common::vnest_script(9));

    let result = VnestWorkflow::new(&provider, repo.clone())
        .run(&VnestRequest::new(HOSPITAL, Difficulty::Easy))
        .await;

    assert!(matches!(result, Err(GenerationError::SentenceCount { expected: 10, found: 9 })));
    assert!(repo.list_vnest_by_context(HOSPITAL).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vnestWorkflow_shouldSendSettingsAndContextInPrompts() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted(common::vnest_script(10));

    VnestWorkflow::new(&provider, repo)
        .with_settings(PromptSettings::new(0.1, 900))
        .run(&VnestRequest::new(HOSPITAL, Difficulty::Hard))
        .await
        .unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    assert!(requests.iter().all(|r| r.temperature == 0.1 && r.max_tokens == 900 && r.json_response));
    assert!(requests[0].user.contains(HOSPITAL));
    assert!(requests[3].user.contains("cortar"));
}

#[tokio::test]
async fn test_vnestWorkflow_withMissingSelectedVerb_shouldFail() {
    let repo = common::memory_repo();
    let mut script = common::vnest_script(10);
    script[2] = r#"{"oraciones": ["La enfermera corta la gasa"]}"#.to_string();
    let provider = MockProvider::scripted(script);

    let result = VnestWorkflow::new(&provider, repo)
        .run(&VnestRequest::new(HOSPITAL, Difficulty::Easy))
        .await;

    assert!(matches!(result, Err(GenerationError::MissingField(f)) if f == "verbo_seleccionado"));
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_vnestWorkflow_withFailingProvider_shouldReturnProviderError() {
    let repo = common::memory_repo();
    let provider = MockProvider::failing();

    let result = VnestWorkflow::new(&provider, repo)
        .run(&VnestRequest::new(HOSPITAL, Difficulty::Easy))
        .await;

    assert!(matches!(result, Err(GenerationError::Provider(_))));
}
