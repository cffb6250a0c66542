//! Provider backend trait and implementations for the supported model APIs.

pub mod chat;
pub mod gemini;
#[cfg(test)]
pub mod mock;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ProviderConfig;
use crate::prompt::Prompt;
use crate::sanitize::MalformedResponse;

/// Failure of a single provider attempt. Every variant is recoverable by
/// falling back to the next provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Server answered with a non-2xx status.
    #[error("HTTP {status}{}", detail_suffix(.message))]
    Transport {
        status: u16,
        message: Option<String>,
    },
    /// The request never got a status (DNS, TLS, connection reset, ...).
    #[error("network error: {0}")]
    Network(String),
    #[error("unsupported provider '{0}'")]
    UnsupportedProvider(String),
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] MalformedResponse),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl ProviderError {
    /// HTTP status for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Glm,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Gemini,
}

impl ProviderKind {
    /// Default fallback order.
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Glm, ProviderKind::DeepSeek, ProviderKind::Gemini];

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Glm => "glm",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Glm => "GLM (Zhipu)",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Gemini => "Gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Glm => "glm-4-flash",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    /// Where to obtain an API key.
    pub fn key_guide(&self) -> &'static str {
        match self {
            ProviderKind::Glm => "https://open.bigmodel.cn/",
            ProviderKind::DeepSeek => "https://platform.deepseek.com/",
            ProviderKind::Gemini => "https://aistudio.google.com/",
        }
    }

    /// Environment variable the CLI reads the key from.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Glm => "GLM_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProviderError::UnsupportedProvider(s.to_string()))
    }
}

/// Endpoint URLs, overridable for self-hosted gateways and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Full chat-completions URL.
    pub glm: String,
    /// Full chat-completions URL.
    pub deepseek: String,
    /// Models base URL; `/{model}:generateContent` is appended.
    pub gemini: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            glm: "https://open.bigmodel.cn/api/paas/v4/chat/completions".into(),
            deepseek: "https://api.deepseek.com/v1/chat/completions".into(),
            gemini: "https://generativelanguage.googleapis.com/v1beta/models".into(),
        }
    }
}

impl Endpoints {
    pub fn for_kind(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Glm => &self.glm,
            ProviderKind::DeepSeek => &self.deepseek,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}

/// A model API that turns a prompt into raw generated text.
pub trait ProviderBackend: Send + Sync {
    /// Provider identifier (e.g., "glm", "gemini").
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Send the prompt and return the generated text, not yet validated.
    fn send<'a>(
        &'a self,
        prompt: &'a Prompt,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;
}

/// Build the backend for one configured provider.
pub fn build_backend(
    config: &ProviderConfig,
    endpoints: &Endpoints,
) -> Result<Arc<dyn ProviderBackend>, ProviderError> {
    let kind: ProviderKind = config.provider.parse()?;
    let model = if config.model.trim().is_empty() {
        kind.default_model().to_string()
    } else {
        config.model.trim().to_string()
    };
    let endpoint = endpoints.for_kind(kind).to_string();
    let api_key = config.api_key.trim().to_string();

    Ok(match kind {
        ProviderKind::Glm | ProviderKind::DeepSeek => {
            Arc::new(chat::ChatCompletions::new(kind, endpoint, model, api_key))
        }
        ProviderKind::Gemini => Arc::new(gemini::Gemini::new(endpoint, model, api_key)),
    })
}

/// Send a prepared request and decode the JSON envelope of a 2xx answer.
pub(crate) async fn send_for_json(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let resp = request.timeout(timeout).send().await.map_err(|e| request_error(e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Transport {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    let body = resp.text().await.map_err(|e| request_error(e, timeout))?;
    serde_json::from_str(&body)
        .map_err(|e| MalformedResponse::InvalidEnvelope(e.to_string()).into())
}

/// Map a reqwest failure, dropping the URL so a query-string key never
/// reaches a diagnostic.
fn request_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Network(e.without_url().to_string())
    }
}

/// Pull a short human-readable message out of an API error body.
fn error_message(body: &str) -> Option<String> {
    const MAX_LEN: usize = 200;
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value["error"]["message"]
        .as_str()
        .or_else(|| value["message"].as_str())
        .or_else(|| value["error"].as_str())?
        .trim();
    if message.is_empty() {
        return None;
    }
    Some(if message.chars().count() > MAX_LEN {
        let cut: String = message.chars().take(MAX_LEN).collect();
        format!("{cut}...")
    } else {
        message.to_string()
    })
}
