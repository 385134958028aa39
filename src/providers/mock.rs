/*!
 * Mock provider implementation for testing.
 *
 * This module provides a provider that replays scripted responses:
 * - `MockProvider::scripted(..)` - Returns the queued texts in order
 * - `MockProvider::with_responder(..)` - Builds each response from the request
 * - `MockProvider::failing()` - Always fails with an error
 *
 * Every request is recorded so tests can assert on prompts and settings.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    /// Replays queued responses, fails once the queue is empty
    Scripted,
    /// Builds the response from the request
    Responder(fn(&CompletionRequest) -> String),
    /// Always fails with an error
    Failing,
}

/// Mock provider for testing generation workflows
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    responses: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    request_count: Arc<AtomicUsize>,
}

impl MockProvider {
    fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a provider that returns the given texts in order
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new(MockBehavior::Scripted);
        provider
            .responses
            .lock()
            .extend(responses.into_iter().map(Into::into));
        provider
    }

    /// Create a provider that computes every response from its request
    pub fn with_responder(responder: fn(&CompletionRequest) -> String) -> Self {
        Self::new(MockBehavior::Responder(responder))
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let text = match self.behavior {
            MockBehavior::Scripted => self
                .responses
                .lock()
                .pop_front()
                .ok_or_else(|| ProviderError::RequestFailed("No scripted response left".to_string()))?,
            MockBehavior::Responder(responder) => responder(&request),
            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "Mock provider failure".to_string(),
                });
            }
        };

        Ok(CompletionResponse {
            prompt_tokens: Some(request.user.len() as u64),
            completion_tokens: Some(text.len() as u64),
            text,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Mock provider offline".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
