//! Chat-completions style APIs (GLM and DeepSeek share this shape).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use super::{ProviderBackend, ProviderError, ProviderKind, send_for_json};
use crate::prompt::Prompt;
use crate::sanitize::MalformedResponse;

const CONTENT_PATH: &str = "choices[0].message.content";

pub struct ChatCompletions {
    kind: ProviderKind,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletions {
    pub fn new(kind: ProviderKind, endpoint: String, model: String, api_key: String) -> Self {
        Self {
            kind,
            endpoint,
            model,
            api_key,
        }
    }
}

impl std::fmt::Debug for ChatCompletions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletions")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"***")
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

impl ProviderBackend for ChatCompletions {
    fn name(&self) -> &str {
        self.kind.id()
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
            let body = ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: &prompt.system,
                    },
                    ChatMessage {
                        role: "user",
                        content: &prompt.user,
                    },
                ],
                response_format: ResponseFormat {
                    r#type: "json_object",
                },
            };

            let request = client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body);

            let data = send_for_json(request, timeout).await?;
            data["choices"][0]["message"]["content"]
                .as_str()
                .map(String::from)
                .ok_or(ProviderError::MalformedResponse(MalformedResponse::MissingText(
                    CONTENT_PATH,
                )))
        })
    }
}
