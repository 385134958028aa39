/*!
 * Client for OpenAI-style chat completion endpoints.
 *
 * Two flavours share the same wire format:
 * - Azure OpenAI: `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
 *   authenticated with an `api-key` header
 * - OpenAI-compatible: `{endpoint}/chat/completions` with a bearer token
 */

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{status_error, CompletionRequest, CompletionResponse, Provider};

/// Default endpoint for the public OpenAI API
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

/// Upper bound for a single retry delay
const MAX_BACKOFF_MS: u64 = 60_000;

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Response format selector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseFormat {
    /// Format type, `json_object` for structured output
    #[serde(rename = "type")]
    pub format_type: String,
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize, Default)]
pub struct OpenAIRequest {
    /// Model name; Azure ignores it in favour of the deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    /// Conversation messages
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

impl OpenAIRequest {
    /// Create a new request for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Default::default()
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of tokens to generate
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask for a JSON object response
    pub fn json_object(mut self) -> Self {
        self.response_format = Some(ResponseFormat {
            format_type: "json_object".to_string(),
        });
        self
    }

    /// Build the wire request from a provider-independent one
    pub fn from_completion(model: &str, request: &CompletionRequest) -> Self {
        let mut wire = Self::new(model)
            .add_message("system", &request.system)
            .add_message("user", &request.user)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);
        if request.json_response {
            wire = wire.json_object();
        }
        wire
    }
}

/// Choice returned by the endpoint
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    /// Generated message
    pub message: OpenAIMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage
#[derive(Debug, Deserialize, Default)]
pub struct OpenAIUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    /// Generated choices
    pub choices: Vec<OpenAIChoice>,
    /// Token usage, when reported
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

impl OpenAIResponse {
    /// Content of the first choice
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Endpoint flavour
#[derive(Debug, Clone, PartialEq)]
enum Flavor {
    Azure { deployment: String, api_version: String },
    Compatible,
}

/// OpenAI / Azure OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAI {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    flavor: Flavor,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl OpenAI {
    fn build_client(timeout_secs: u64) -> Client {
        Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default()
    }

    /// Create a client for an OpenAI-compatible endpoint
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Self::build_client(120),
            api_key: api_key.into(),
            endpoint: if endpoint.trim().is_empty() {
                DEFAULT_OPENAI_ENDPOINT.to_string()
            } else {
                endpoint
            },
            model: model.into(),
            flavor: Flavor::Compatible,
            max_retries: 2,
            backoff_base_ms: 1000,
        }
    }

    /// Create a client for an Azure OpenAI deployment
    pub fn azure(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let deployment = deployment.into();
        Self {
            client: Self::build_client(120),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: deployment.clone(),
            flavor: Flavor::Azure {
                deployment,
                api_version: api_version.into(),
            },
            max_retries: 2,
            backoff_base_ms: 1000,
        }
    }

    /// Override timeout and retry policy
    pub fn with_policy(mut self, timeout_secs: u64, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.client = Self::build_client(timeout_secs);
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Full URL of the chat completions route
    pub fn completions_url(&self) -> Result<Url, ProviderError> {
        let base = format!("{}/", self.endpoint.trim_end_matches('/'));
        let base = Url::parse(&base)
            .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint '{}': {}", self.endpoint, e)))?;

        match &self.flavor {
            Flavor::Azure { deployment, api_version } => {
                let mut url = base
                    .join(&format!("openai/deployments/{}/chat/completions", deployment))
                    .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
                url.query_pairs_mut().append_pair("api-version", api_version);
                Ok(url)
            }
            Flavor::Compatible => base
                .join("chat/completions")
                .map_err(|e| ProviderError::ConnectionError(e.to_string())),
        }
    }

    /// Delay before retry number `attempt + 1`: base doubled per attempt, capped
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        2u64.checked_pow(attempt)
            .map_or(u64::MAX, |factor| self.backoff_base_ms.saturating_mul(factor))
            .min(MAX_BACKOFF_MS)
    }

    /// Send a wire request, retrying rate limits and server errors
    pub async fn send(&self, request: &OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let url = self.completions_url()?;
        let mut attempt = 0;

        loop {
            let builder = self.client.post(url.clone()).json(request);
            let builder = match self.flavor {
                Flavor::Azure { .. } => builder.header("api-key", &self.api_key),
                Flavor::Compatible => builder.bearer_auth(&self.api_key),
            };

            debug!("POST {} (attempt {})", url.path(), attempt + 1);

            let error = match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<OpenAIResponse>()
                        .await
                        .map_err(|e| ProviderError::ParseError(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let error = status_error(status, body);
                    if !retryable {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_connect() || e.is_timeout() => ProviderError::ConnectionError(e.to_string()),
                Err(e) => return Err(ProviderError::RequestFailed(e.to_string())),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }

            let delay = self.backoff_delay_ms(attempt);
            warn!("Completion request failed ({}), retrying in {}ms", error, delay);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Provider for OpenAI {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let wire = OpenAIRequest::from_completion(&self.model, &request);
        let response = self.send(&wire).await?;

        let text = response
            .first_text()
            .ok_or_else(|| ProviderError::ParseError("Response contained no choices".to_string()))?
            .to_string();
        let usage = response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = CompletionRequest::new("Responde con una palabra.", "Hola")
            .max_tokens(5)
            .plain_text();
        self.complete(request).await.map(|_| ())
    }

    fn name(&self) -> &str {
        match self.flavor {
            Flavor::Azure { .. } => "azure",
            Flavor::Compatible => "openai",
        }
    }
}
