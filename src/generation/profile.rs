/*!
 * Structured patient profile from free text.
 */

use chrono::Utc;
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::database::models::PatientRecord;
use crate::database::Repository;
use crate::errors::GenerationError;
use crate::generation::{json::expect_object, prompts, run_prompt, PromptSettings};
use crate::providers::Provider;

/// Result of a profile structuring run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOutput {
    pub ok: bool,
    pub user_id: String,
    pub structured_profile: Value,
    /// Whether the profile was written to the patient record
    pub saved: bool,
}

/// Runs the profile structuring pipeline
pub struct ProfileWorkflow<'a> {
    provider: &'a dyn Provider,
    repo: Repository,
    settings: PromptSettings,
}

impl<'a> ProfileWorkflow<'a> {
    pub fn new(provider: &'a dyn Provider, repo: Repository) -> Self {
        Self {
            provider,
            repo,
            settings: PromptSettings::profile(),
        }
    }

    pub fn with_settings(mut self, settings: PromptSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Structure `raw_text` into a profile, optionally saving it on the patient
    pub async fn run(&self, patient_id: &str, raw_text: &str, persist: bool) -> Result<ProfileOutput, GenerationError> {
        let prompt = prompts::profile_structure_prompt(raw_text, patient_id);
        let result = run_prompt(self.provider, prompts::PROFILE_SYSTEM, self.settings, prompt).await?;
        let profile = Value::Object(expect_object(result)?);

        if persist {
            let patient = match self.repo.get_patient(patient_id).await? {
                Some(mut existing) => {
                    existing.profile = profile.clone();
                    existing.updated_at = Utc::now();
                    existing
                }
                None => PatientRecord::new(patient_id, profile.clone()),
            };
            self.repo.upsert_patient(&patient).await?;
            info!("Saved structured profile for {}", patient_id);
        }

        Ok(ProfileOutput {
            ok: true,
            user_id: patient_id.to_string(),
            structured_profile: profile,
            saved: persist,
        })
    }
}
