//! Google Gemini `generateContent` API.
//!
//! Unlike the chat-completions providers there is no system role: the
//! instruction and the task travel in one text part, and the key goes in the
//! query string.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use super::{ProviderBackend, ProviderError, send_for_json};
use crate::prompt::Prompt;
use crate::sanitize::MalformedResponse;

const TEXT_PATH: &str = "candidates[0].content.parts[0].text";

pub struct Gemini {
    /// Models base URL, without the trailing `/{model}:generateContent`.
    base_url: String,
    model: String,
    api_key: String,
}

impl Gemini {
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            base_url,
            model,
            api_key,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl std::fmt::Debug for Gemini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gemini")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"***")
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

impl ProviderBackend for Gemini {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn send<'a>(
        &'a self,
        prompt: &'a Prompt,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            let text = prompt.combined();
            let body = GenerateRequest {
                contents: [Content {
                    parts: [Part { text: &text }],
                }],
                generation_config: GenerationConfig {
                    response_mime_type: "application/json",
                },
            };

            let request = client
                .post(self.url())
                .query(&[("key", self.api_key.as_str())])
                .json(&body);

            let data = send_for_json(request, timeout).await?;
            data["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .map(String::from)
                .ok_or(ProviderError::MalformedResponse(MalformedResponse::MissingText(
                    TEXT_PATH,
                )))
        })
    }
}
