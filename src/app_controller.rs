use chrono::Utc;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{Config, LlmConfig, ProviderKind};
use crate::database::models::{AssignmentRecord, ExerciseRecord, SrExerciseRecord};
use crate::database::{DatabaseConnection, DatabaseStats, Repository};
use crate::errors::{AppError, AssignmentError};
use crate::exercises::{AssignmentWriter, ExerciseSelector, SelectionOutcome};
use crate::generation::graph::{self, WorkflowKind};
use crate::generation::{
    PersonalizationOutput, PersonalizationWorkflow, ProfileOutput, ProfileWorkflow, SrOutput, SrWorkflow,
    VnestOutput, VnestRequest, VnestWorkflow,
};
use crate::providers::{Ollama, OpenAI, Provider};

// @module: Application controller wiring config, store and provider

/// Port used when the Ollama endpoint carries none
const OLLAMA_DEFAULT_PORT: u16 = 11434;

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    repo: Repository,
    // None until the provider section validates
    provider: Option<Arc<dyn Provider>>,
}

impl Controller {
    /// Create a controller from configuration, opening the configured store
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        config
            .validate_settings()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let db = match &config.database_path {
            Some(path) => DatabaseConnection::new(path)?,
            None => DatabaseConnection::new_default()?,
        };

        let provider = match config.validate() {
            Ok(()) => Some(Self::build_provider(&config.llm)?),
            Err(e) => {
                debug!("Provider not configured: {}", e);
                None
            }
        };

        Ok(Self {
            config,
            repo: Repository::new(db),
            provider,
        })
    }

    /// Create a controller over an existing store and provider
    pub fn with_parts(config: Config, repo: Repository, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            repo,
            provider: Some(provider),
        }
    }

    /// Build the completion provider described by the config
    pub fn build_provider(llm: &LlmConfig) -> Result<Arc<dyn Provider>, AppError> {
        let endpoint = llm.get_endpoint();
        let provider: Arc<dyn Provider> = match llm.provider {
            ProviderKind::Azure => {
                let api_version = llm
                    .api_version
                    .clone()
                    .ok_or_else(|| AppError::Config("Azure OpenAI requires an api_version".to_string()))?;
                Arc::new(
                    OpenAI::azure(llm.get_api_key(), endpoint, &llm.model, api_version).with_policy(
                        llm.timeout_secs,
                        llm.retry_count,
                        llm.retry_backoff_ms,
                    ),
                )
            }
            ProviderKind::OpenAI => Arc::new(OpenAI::new(llm.get_api_key(), endpoint, &llm.model).with_policy(
                llm.timeout_secs,
                llm.retry_count,
                llm.retry_backoff_ms,
            )),
            ProviderKind::Ollama => Arc::new(Ollama::new(endpoint, OLLAMA_DEFAULT_PORT, &llm.model)),
        };

        info!("Using {} provider with model {}", llm.provider.display_name(), llm.model);
        Ok(provider)
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying store
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn provider(&self) -> Result<&dyn Provider, AppError> {
        match &self.provider {
            Some(provider) => Ok(provider.as_ref()),
            None => Err(AppError::Config(match self.config.validate() {
                Err(e) => e.to_string(),
                Ok(()) => "No completion provider configured".to_string(),
            })),
        }
    }

    /// Select an exercise with an OS-seeded random source
    pub async fn select(&self, patient_id: &str, context: &str, verb: &str) -> SelectionOutcome {
        let mut rng = StdRng::from_os_rng();
        self.select_with_rng(patient_id, context, verb, &mut rng).await
    }

    /// Select an exercise with the given random source
    pub async fn select_with_rng<R: Rng + ?Sized>(
        &self,
        patient_id: &str,
        context: &str,
        verb: &str,
        rng: &mut R,
    ) -> SelectionOutcome {
        ExerciseSelector::new(self.repo.clone())
            .select(patient_id, context, verb, rng)
            .await
    }

    /// Assign an exercise; `require_context` rejects exercises without one
    pub async fn assign(
        &self,
        patient_id: &str,
        exercise_id: &str,
        require_context: bool,
    ) -> Result<AssignmentRecord, AppError> {
        let writer = AssignmentWriter::new(self.repo.clone());
        let record = if require_context {
            writer.assign(patient_id, exercise_id).await?
        } else {
            writer.assign_without_context(patient_id, exercise_id).await?
        };
        Ok(record)
    }

    /// Mark an assignment as performed now
    pub async fn complete(&self, patient_id: &str, exercise_id: &str) -> Result<AssignmentRecord, AppError> {
        let record = AssignmentWriter::new(self.repo.clone())
            .record_completion(patient_id, exercise_id, Utc::now())
            .await?;
        Ok(record)
    }

    /// Record one SR recall attempt
    pub async fn review(&self, exercise_id: &str, success: bool) -> Result<SrExerciseRecord, AppError> {
        let card = AssignmentWriter::new(self.repo.clone())
            .record_sr_review(exercise_id, success, Utc::now())
            .await?;
        Ok(card)
    }

    /// Set the therapist-reviewed flag of an exercise
    pub async fn mark_reviewed(&self, exercise_id: &str, reviewed: bool) -> Result<ExerciseRecord, AppError> {
        if !self.repo.set_exercise_reviewed(exercise_id, reviewed).await? {
            return Err(AssignmentError::ExerciseNotFound(exercise_id.to_string()).into());
        }
        self.repo
            .get_exercise(exercise_id)
            .await?
            .ok_or_else(|| AssignmentError::ExerciseNotFound(exercise_id.to_string()).into())
    }

    /// Record counts of the store
    pub async fn stats(&self) -> Result<DatabaseStats, AppError> {
        let db = self.repo.connection().clone();
        let stats = tokio::task::spawn_blocking(move || db.stats())
            .await
            .map_err(|e| AppError::Unknown(e.to_string()))??;
        Ok(stats)
    }

    /// Check that the completion endpoint answers
    pub async fn check_provider(&self) -> Result<String, AppError> {
        let provider = self.provider()?;
        provider.test_connection().await?;
        info!("{} provider is reachable", provider.name());
        Ok(provider.name().to_string())
    }

    /// Generate and store a VNEST exercise
    pub async fn generate_vnest(&self, request: &VnestRequest) -> Result<VnestOutput, AppError> {
        let output = VnestWorkflow::new(self.provider()?, self.repo.clone())
            .with_settings(self.config.prompts.vnest)
            .run(request)
            .await?;
        Ok(output)
    }

    /// Generate SR cards for a patient
    pub async fn generate_sr(&self, patient_id: &str, profile: Option<Value>) -> Result<SrOutput, AppError> {
        let profile = self.resolve_profile(patient_id, profile).await?;
        let output = SrWorkflow::new(self.provider()?, self.repo.clone())
            .with_settings(self.config.prompts.sr)
            .run(patient_id, &profile)
            .await?;
        Ok(output)
    }

    /// Personalize an exercise for a patient
    pub async fn personalize(
        &self,
        patient_id: &str,
        exercise_id: &str,
        profile: Option<Value>,
    ) -> Result<PersonalizationOutput, AppError> {
        let profile = self.resolve_profile(patient_id, profile).await?;
        let output = PersonalizationWorkflow::new(self.provider()?, self.repo.clone())
            .with_settings(self.config.prompts.personalization)
            .run(patient_id, exercise_id, &profile)
            .await?;
        Ok(output)
    }

    /// Structure free text into a patient profile
    pub async fn structure_profile(
        &self,
        patient_id: &str,
        raw_text: &str,
        persist: bool,
    ) -> Result<ProfileOutput, AppError> {
        let output = ProfileWorkflow::new(self.provider()?, self.repo.clone())
            .with_settings(self.config.prompts.profile)
            .run(patient_id, raw_text, persist)
            .await?;
        Ok(output)
    }

    /// Export one workflow graph
    pub fn export_graph(&self, kind: WorkflowKind, out_path: Option<&Path>) -> Result<PathBuf, AppError> {
        graph::export_mermaid(kind, out_path).map_err(|e| AppError::File(format!("{:#}", e)))
    }

    /// Explicit profile, or the one stored on the patient record
    async fn resolve_profile(&self, patient_id: &str, profile: Option<Value>) -> Result<Value, AppError> {
        if let Some(profile) = profile {
            return Ok(profile);
        }
        self.repo
            .get_patient(patient_id)
            .await?
            .map(|patient| patient.profile)
            .filter(|profile| !profile.is_null())
            .ok_or_else(|| AppError::MissingProfile(patient_id.to_string()))
    }
}
