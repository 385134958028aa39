/*!
 * Spaced-retrieval card generation from a patient profile.
 */

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::models::{ExerciseRecord, SrExerciseRecord, TherapyType, Visibility};
use crate::database::Repository;
use crate::errors::GenerationError;
use crate::generation::{prompts, run_prompt, PromptSettings};
use crate::providers::Provider;

/// Creator recorded on generated cards
const GENERATED_BY: &str = "IA";

/// One question/answer card as produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrCard {
    #[serde(alias = "pregunta")]
    pub stimulus: String,
    #[serde(alias = "respuesta", alias = "rta_correcta")]
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct SrPayload {
    #[serde(default)]
    cards: Vec<SrCard>,
}

/// Result of an SR generation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SrOutput {
    pub user_id: String,
    pub cards: Vec<SrCard>,
    /// Ids of the stored exercises, in card order
    #[serde(rename = "ejercicios")]
    pub exercise_ids: Vec<String>,
}

/// Runs the SR pipeline
pub struct SrWorkflow<'a> {
    provider: &'a dyn Provider,
    repo: Repository,
    settings: PromptSettings,
}

impl<'a> SrWorkflow<'a> {
    /// Create the workflow with default prompt settings
    pub fn new(provider: &'a dyn Provider, repo: Repository) -> Self {
        Self {
            provider,
            repo,
            settings: PromptSettings::sr(),
        }
    }

    /// Override prompt settings
    pub fn with_settings(mut self, settings: PromptSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Generate cards for a patient, store them privately and assign each one
    pub async fn run(&self, patient_id: &str, profile: &Value) -> Result<SrOutput, GenerationError> {
        let result = run_prompt(self.provider, prompts::SR_SYSTEM, self.settings, prompts::sr_cards_prompt(profile)).await?;
        let payload: SrPayload = serde_json::from_value(result)
            .map_err(|e| GenerationError::MalformedJson(format!("cards: {}", e)))?;

        let (cards, blank): (Vec<SrCard>, Vec<SrCard>) = payload
            .cards
            .into_iter()
            .partition(|c| !c.stimulus.trim().is_empty() && !c.answer.trim().is_empty());
        if !blank.is_empty() {
            warn!("Dropped {} SR cards with an empty question or answer", blank.len());
        }
        if cards.is_empty() {
            return Err(GenerationError::NoCards);
        }

        let mut exercise_ids = Vec::with_capacity(cards.len());
        for card in &cards {
            exercise_ids.push(self.save_card(patient_id, card).await?);
        }

        info!("Stored and assigned {} SR cards for {}", exercise_ids.len(), patient_id);
        Ok(SrOutput {
            user_id: patient_id.to_string(),
            cards,
            exercise_ids,
        })
    }

    async fn save_card(&self, patient_id: &str, card: &SrCard) -> Result<String, GenerationError> {
        let mut general = ExerciseRecord::new(TherapyType::Sr, Visibility::Private, GENERATED_BY);
        general.patient_id = Some(patient_id.to_string());
        let detail = SrExerciseRecord::new(general.id.clone(), card.stimulus.trim(), card.answer.trim());

        self.repo.create_assigned_sr_exercise(&general, &detail, patient_id).await?;
        Ok(general.id)
    }
}
