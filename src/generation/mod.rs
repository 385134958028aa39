/*!
 * Generation workflows.
 *
 * Each workflow is a fixed linear pipeline: build a prompt, call the
 * completion provider, parse the JSON leniently, validate, persist and
 * optionally assign.
 *
 * - `vnest`: five-step VNEST exercise generation
 * - `sr`: spaced-retrieval cards from a patient profile
 * - `personalization`: personalized copy of a base exercise
 * - `profile`: structured profile from free text
 * - `graph`: Mermaid export of the pipelines
 * - `json`: lenient JSON parsing
 * - `prompts`: prompt builders
 */

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GenerationError;
use crate::providers::{CompletionRequest, Provider};

pub mod graph;
pub mod json;
pub mod personalization;
pub mod profile;
pub mod prompts;
pub mod sr;
pub mod vnest;

pub use personalization::{PersonalizationOutput, PersonalizationWorkflow};
pub use profile::{ProfileOutput, ProfileWorkflow};
pub use sr::{SrOutput, SrWorkflow};
pub use vnest::{VnestOutput, VnestRequest, VnestWorkflow};

/// Sampling settings for one workflow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
}

impl PromptSettings {
    /// Create settings
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self { temperature, max_tokens }
    }

    /// VNEST pipeline defaults
    pub const fn vnest() -> Self {
        Self::new(0.4, 2100)
    }

    /// SR card defaults
    pub const fn sr() -> Self {
        Self::new(0.3, 1000)
    }

    /// Personalization defaults
    pub const fn personalization() -> Self {
        Self::new(0.4, 3000)
    }

    /// Profile structuring defaults
    pub const fn profile() -> Self {
        Self::new(0.2, 1500)
    }
}

/// Send one prompt and parse the reply as JSON
pub async fn run_prompt(
    provider: &dyn Provider,
    system: &str,
    settings: PromptSettings,
    prompt: String,
) -> Result<Value, GenerationError> {
    let request = CompletionRequest::new(system, prompt)
        .temperature(settings.temperature)
        .max_tokens(settings.max_tokens);

    let response = provider.complete(request).await?;
    debug!(
        "{} replied with {} chars (tokens: {:?} in / {:?} out)",
        provider.name(),
        response.text.len(),
        response.prompt_tokens,
        response.completion_tokens
    );

    json::parse_lenient(&response.text)
}

/// Take a required field out of a JSON object
pub(crate) fn take_field(value: &mut Value, field: &str) -> Result<Value, GenerationError> {
    value
        .get_mut(field)
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or_else(|| GenerationError::MissingField(field.to_string()))
}
