//! Mock provider backend for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ProviderBackend, ProviderError};
use crate::prompt::Prompt;

/// A configurable mock response for [`MockProvider`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Raw generated text, passed on to the sanitizer unchanged.
    Text(String),
    /// Non-2xx HTTP status.
    Status(u16),
    /// Any other provider failure.
    Error(ProviderError),
}

impl MockResponse {
    pub fn text(s: impl Into<String>) -> Self {
        MockResponse::Text(s.into())
    }
}

/// A hand-rolled mock implementing [`ProviderBackend`] for tests.
///
/// Supports a fixed response or a sequence (last one repeats), per-call
/// latency, call counting, and a call log shared between mocks so tests can
/// assert the order providers were tried in.
pub struct MockProvider {
    name: &'static str,
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    call_log: Option<Arc<Mutex<Vec<String>>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockProvider {
    /// Create a mock that always returns `response`.
    pub fn new(name: &'static str, response: MockResponse) -> Self {
        Self {
            name,
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            call_log: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(name: &'static str, mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        let mut mock = Self::new(name, fallback);
        mock.responses = Mutex::new(responses);
        mock
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_call_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.call_log = Some(log);
        self
    }

    /// How many times `send()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl ProviderBackend for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn send<'a>(
        &'a self,
        prompt: &'a Prompt,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(log) = &self.call_log {
            log.lock().unwrap().push(self.name.to_string());
        }
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Text(text) => Ok(text),
                MockResponse::Status(status) => Err(ProviderError::Transport {
                    status,
                    message: None,
                }),
                MockResponse::Error(e) => Err(e),
            }
        })
    }
}
