/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use aphasia_exercises::app_config::{Config, ProviderKind};
use aphasia_exercises::database::models::{Difficulty, PatientRecord, Visibility};
use aphasia_exercises::errors::AppError;
use aphasia_exercises::generation::graph::{export_mermaid, render_mermaid};
use aphasia_exercises::generation::VnestRequest;
use aphasia_exercises::providers::MockProvider;
use aphasia_exercises::{Controller, SelectionOutcome, WorkflowKind};

use crate::common::{self, HOSPITAL, PATIENT};

fn ollama_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Ollama;
    config.database_path = Some(dir.path().join("afasia.db").to_string_lossy().into_owned());
    config
}

#[test]
fn test_controller_withDatabasePath_shouldOpenFileStore() -> Result<()> {
    let dir = TempDir::new()?;

    let controller = Controller::with_config(ollama_config(&dir))?;

    assert!(dir.path().join("afasia.db").exists());
    assert_eq!(controller.config().llm.provider, ProviderKind::Ollama);
    Ok(())
}

#[test]
fn test_controller_withoutApiKey_shouldStillServeSelection() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = ollama_config(&dir);
    config.llm.provider = ProviderKind::Azure;
    config.llm.api_key = String::new();
    config.llm.endpoint = String::new();

    let controller = Controller::with_config(config)?;
    let outcome = tokio_test::block_on(controller.select(PATIENT, HOSPITAL, "cortar"));

    assert!(matches!(outcome, SelectionOutcome::Unavailable { .. }));

    let generation = tokio_test::block_on(controller.generate_vnest(&VnestRequest::new(HOSPITAL, Difficulty::Easy)));
    assert!(matches!(generation, Err(AppError::Config(_))));
    Ok(())
}

#[tokio::test]
async fn test_controller_fullRound_shouldGenerateSelectAndComplete() {
    let repo = common::memory_repo();
    let provider = MockProvider::scripted(common::vnest_script(10));
    let controller = Controller::with_parts(Config::default(), repo.clone(), Arc::new(provider));

    let exercise = controller
        .generate_vnest(&VnestRequest::new(HOSPITAL, Difficulty::Easy).visibility(Visibility::Public))
        .await
        .unwrap();

    let outcome = controller.select(PATIENT, HOSPITAL, "cortar").await;
    assert_eq!(outcome.exercise().map(|e| e.id.clone()), Some(exercise.id.clone()));

    let completed = controller.complete(PATIENT, &exercise.id).await.unwrap();
    assert_eq!(completed.times_performed, 1);

    let again = controller.select(PATIENT, HOSPITAL, "cortar").await;
    assert_eq!(again.exercise().map(|e| e.id.clone()), Some(exercise.id));
}

#[tokio::test]
async fn test_controller_generateSr_withStoredProfile_shouldUseIt() {
    let repo = common::memory_repo();
    repo.upsert_patient(&PatientRecord::new(PATIENT, common::sample_profile()))
        .await
        .unwrap();
    let provider = Arc::new(MockProvider::scripted([
        json!({"cards": [{"stimulus": "¿Cómo se llama tu esposo?", "answer": "Luis"}]}).to_string(),
    ]));
    let controller = Controller::with_parts(Config::default(), repo, provider.clone());

    let output = controller.generate_sr(PATIENT, None).await.unwrap();

    assert_eq!(output.cards.len(), 1);
    assert!(provider.requests()[0].user.contains("caminar por el parque"));
}

#[tokio::test]
async fn test_controller_assign_withNoContextFlag_shouldAcceptSrCard() {
    let repo = common::memory_repo();
    let card = common::seed_sr(&repo, "¿Dónde vives?", "En Cali").await.unwrap();
    let controller = Controller::with_parts(Config::default(), repo, Arc::new(MockProvider::failing()));

    assert!(matches!(
        controller.assign(PATIENT, &card.id, true).await,
        Err(AppError::Assignment(_))
    ));
    let record = controller.assign(PATIENT, &card.id, false).await.unwrap();
    assert_eq!(record.priority, 1);

    let reviewed = controller.review(&card.id, true).await.unwrap();
    assert_eq!(reviewed.interval_index, 1);
}

#[test]
fn test_exportMermaid_shouldWriteGraphAndReturnAbsolutePath() -> Result<()> {
    let dir = TempDir::new()?;
    let out = dir.path().join("nested").join("vnest.mmd");

    let path = export_mermaid(WorkflowKind::Vnest, Some(&out))?;

    assert!(path.is_absolute());
    let content = std::fs::read_to_string(&path)?;
    assert_eq!(content, render_mermaid(WorkflowKind::Vnest));
    assert!(content.starts_with("flowchart TD"));
    assert!(content.contains("START([Start]) --> step1_generate_verbs"));
    assert!(content.ends_with("step5_save_db --> END([Finish])"));
    Ok(())
}

#[test]
fn test_renderMermaid_everyWorkflow_shouldHaveOneEdgePerStepPlusFinish() {
    for kind in WorkflowKind::ALL {
        let graph = render_mermaid(kind);
        let edges = graph.lines().filter(|l| l.contains("-->")).count();
        assert_eq!(edges, kind.steps().len() + 1, "{}", kind);
        assert_eq!(kind.file_name(), format!("langgraph_{}.mmd", kind));
    }
}

#[tokio::test]
async fn test_controller_markReviewedAndStats_shouldReflectStore() {
    let repo = common::memory_repo();
    let exercise = common::seed_vnest(&repo, HOSPITAL, "cortar", Visibility::Public).await.unwrap();
    let controller = Controller::with_parts(Config::default(), repo, Arc::new(MockProvider::failing()));

    let reviewed = controller.mark_reviewed(&exercise.id, true).await.unwrap();
    assert!(reviewed.reviewed);

    let missing = controller.mark_reviewed("E999999", true).await;
    assert!(matches!(missing, Err(AppError::Assignment(_))));

    let stats = controller.stats().await.unwrap();
    assert_eq!(stats.exercise_count, 1);
    assert_eq!(stats.vnest_count, 1);
    assert_eq!(stats.assignment_count, 0);
}
