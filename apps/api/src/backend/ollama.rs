//! Ollama-backed `ModelBackend` — talks to a local model runtime over HTTP.
//!
//! Availability maps the runtime's state onto the tri-state contract:
//! unreachable runtime → `Unavailable`, model missing from the tag list →
//! `NeedsDownload`, otherwise `Available`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Availability, BackendError, ModelBackend, ModelSession, SessionOptions};

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        OllamaBackend {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Tags are listed as `name:tag` (e.g. `llama3.2:latest`); a bare model name
/// matches any tag of that model.
fn model_installed(tags: &TagsResponse, model: &str) -> bool {
    tags.models
        .iter()
        .any(|m| m.name == model || m.name.starts_with(&format!("{model}:")))
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn availability(&self) -> Availability {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                return Availability::Unavailable {
                    detail: format!(
                        "Cannot reach the model runtime at {}: {e}. Is Ollama running?",
                        self.base_url
                    ),
                }
            }
        };

        if !response.status().is_success() {
            return Availability::Unavailable {
                detail: format!("Model runtime returned status {}.", response.status()),
            };
        }

        let tags: TagsResponse = match response.json().await {
            Ok(t) => t,
            Err(e) => {
                return Availability::Unavailable {
                    detail: format!("Unrecognized model runtime response: {e}."),
                }
            }
        };

        if model_installed(&tags, &self.model) {
            Availability::Available
        } else {
            Availability::NeedsDownload {
                detail: format!(
                    "Model '{}' is not installed. Run `ollama pull {}` and try again.",
                    self.model, self.model
                ),
            }
        }
    }

    async fn create_session(
        &self,
        options: SessionOptions,
    ) -> Result<Box<dyn ModelSession>, BackendError> {
        debug!(
            model = %self.model,
            temperature = options.temperature,
            top_k = options.top_k,
            "Creating model session"
        );
        Ok(Box::new(OllamaSession {
            client: self.client.clone(),
            chat_url: format!("{}/api/chat", self.base_url),
            model: self.model.clone(),
            options,
            history: Vec::new(),
        }))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatRequestOptions,
}

#[derive(Debug, Serialize)]
struct ChatRequestOptions {
    temperature: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// One conversation with the runtime: the full message history is replayed on
/// every prompt, which is how the runtime keeps session state.
pub struct OllamaSession {
    client: Client,
    chat_url: String,
    model: String,
    options: SessionOptions,
    history: Vec<ChatMessage>,
}

#[async_trait]
impl ModelSession for OllamaSession {
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError> {
        self.history.push(ChatMessage {
            role: "user",
            content: text.to_string(),
        });

        let request = ChatRequest {
            model: &self.model,
            messages: &self.history,
            stream: false,
            options: ChatRequestOptions {
                temperature: self.options.temperature,
                top_k: self.options.top_k,
            },
        };

        let result = self.round_trip(&request).await;
        match result {
            Ok(reply) => {
                self.history.push(ChatMessage {
                    role: "assistant",
                    content: reply.clone(),
                });
                Ok(reply)
            }
            Err(e) => {
                // Keep history consistent with what the runtime actually saw.
                self.history.pop();
                Err(e)
            }
        }
    }

    async fn release(self: Box<Self>) {
        // The runtime holds no per-conversation server state; releasing just
        // drops the replayed history.
        debug!(turns = self.history.len(), "Model session released");
    }
}

impl OllamaSession {
    async fn round_trip(&self, request: &ChatRequest<'_>) -> Result<String, BackendError> {
        let response = self.client.post(&self.chat_url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        if parsed.message.content.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> TagsResponse {
        TagsResponse {
            models: names
                .iter()
                .map(|n| TagModel {
                    name: n.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_model_installed_matches_bare_name_against_tagged() {
        assert!(model_installed(&tags(&["llama3.2:latest"]), "llama3.2"));
        assert!(model_installed(&tags(&["llama3.2"]), "llama3.2"));
    }

    #[test]
    fn test_model_installed_rejects_other_models() {
        assert!(!model_installed(&tags(&["mistral:7b"]), "llama3.2"));
        // A shared prefix without the tag separator is a different model.
        assert!(!model_installed(&tags(&["llama3.2-vision:latest"]), "llama3.2"));
    }

    #[test]
    fn test_tags_response_tolerates_missing_models_field() {
        let parsed: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.models.is_empty());
    }

    #[test]
    fn test_chat_response_deserializes() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"yes"}}"#).unwrap();
        assert_eq!(parsed.message.content, "yes");
    }
}
