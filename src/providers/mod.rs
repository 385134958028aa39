/*!
 * Provider implementations for chat-completion endpoints.
 *
 * This module contains client implementations for the supported endpoints:
 * - OpenAI: Azure OpenAI deployments and OpenAI-compatible APIs
 * - Ollama: Local LLM server
 * - Mock: Scripted provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single chat completion request, independent of the wire format
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    /// System role message
    pub system: String,
    /// User message
    pub user: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Ask the endpoint for a JSON object response
    pub json_response: bool,
}

impl CompletionRequest {
    /// Create a request from a system role and a user prompt
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.4,
            max_tokens: 1000,
            json_response: true,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum number of tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request free-form text instead of a JSON object
    pub fn plain_text(mut self) -> Self {
        self.json_response = false;
        self
    }
}

/// Text returned by a completion endpoint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionResponse {
    /// Message content of the first choice
    pub text: String,
    /// Prompt tokens, when reported
    pub prompt_tokens: Option<u64>,
    /// Completion tokens, when reported
    pub completion_tokens: Option<u64>,
}

/// Common trait for all completion providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the generation workflows.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<CompletionResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Map an unsuccessful HTTP status to a provider error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        code => ProviderError::ApiError {
            status_code: code,
            message: body,
        },
    }
}

pub mod ollama;
pub mod openai;
pub mod mock;

pub use mock::MockProvider;
pub use ollama::Ollama;
pub use openai::OpenAI;
