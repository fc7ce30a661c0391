//! [`ModelProvider`] backed by a local Ollama daemon.
//!
//! Speaks the Ollama HTTP API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | list models | `GET /api/tags` |
//! | pull model | `POST /api/pull` (non-streaming, waits for completion) |
//! | embed | `POST /api/embed` |
//! | chat | `POST /api/chat` (non-streaming) |
//!
//! No call is retried. Connection failures surface as
//! [`RagError::ProviderUnavailable`]; a chat request that outlives its
//! timeout surfaces as [`RagError::CompletionTimeout`].

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use jetrag_core::embedding::Embedding;
use jetrag_core::error::{RagError, Result};
use jetrag_core::prompt::Prompt;
use jetrag_core::provider::ModelProvider;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ModelsConfig;

pub struct OllamaClient {
    base_url: String,
    /// Client for short calls (tags, embed), bounded by the request timeout.
    client: reqwest::Client,
    /// Client without a global timeout; chat passes its own per request.
    long_client: reqwest::Client,
    pull_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(config: &ModelsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let long_client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            client,
            long_client,
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn unavailable(&self, e: &reqwest::Error) -> RagError {
        RagError::ProviderUnavailable {
            endpoint: self.base_url.clone(),
            reason: format!("is Ollama running? {}", e),
        }
    }
}

/// Read an error body, preferring Ollama's `{"error": "..."}` message.
async fn error_text(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    format!("Ollama API error {}: {}", status, message)
}

#[async_trait]
impl ModelProvider for OllamaClient {
    async fn list_models(&self) -> Result<BTreeSet<String>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| self.unavailable(&e))?;

        if !response.status().is_success() {
            return Err(RagError::ProviderUnavailable {
                endpoint: self.base_url.clone(),
                reason: error_text(response).await,
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| RagError::ProviderUnavailable {
            endpoint: self.base_url.clone(),
            reason: format!("invalid /api/tags response: {}", e),
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self, name: &str) -> Result<()> {
        info!(model = name, "pulling model");
        let body = serde_json::json!({ "model": name, "stream": false });
        let pull_err = |reason: String| RagError::ModelPull {
            model: name.to_string(),
            reason,
        };

        let response = self
            .long_client
            .post(self.url("/api/pull"))
            .timeout(self.pull_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    pull_err(format!("timed out after {}s", self.pull_timeout.as_secs()))
                } else if e.is_connect() {
                    self.unavailable(&e)
                } else {
                    pull_err(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(pull_err(error_text(response).await));
        }

        let parsed: PullResponse = response
            .json()
            .await
            .map_err(|e| pull_err(format!("invalid /api/pull response: {}", e)))?;
        if let Some(error) = parsed.error {
            return Err(pull_err(error));
        }
        match parsed.status.as_deref() {
            Some("success") => {
                info!(model = name, "model pulled");
                Ok(())
            }
            other => Err(pull_err(format!(
                "pull finished with status {:?}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Embedding> {
        let embed_err = |reason: String| RagError::Embedding {
            model: model.to_string(),
            reason,
        };
        let body = serde_json::json!({ "model": model, "input": text });

        let response = self
            .client
            .post(self.url("/api/embed"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    self.unavailable(&e)
                } else {
                    embed_err(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(embed_err(error_text(response).await));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| embed_err(format!("invalid /api/embed response: {}", e)))?;
        parse_embed_response(&json)
            .map_err(embed_err)?
            .into_iter()
            .next()
            .ok_or_else(|| embed_err("empty embeddings array".to_string()))
    }

    async fn complete(&self, model: &str, prompt: &Prompt, timeout: Duration) -> Result<String> {
        let completion_err = |reason: String| RagError::Completion {
            model: model.to_string(),
            reason,
        };
        let body = serde_json::json!({
            "model": model,
            "messages": prompt.messages(),
            "stream": false,
        });
        debug!(model, chars = prompt.char_len(), "sending chat request");

        let response = self
            .long_client
            .post(self.url("/api/chat"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::CompletionTimeout {
                        model: model.to_string(),
                        timeout,
                    }
                } else if e.is_connect() {
                    self.unavailable(&e)
                } else {
                    completion_err(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(completion_err(error_text(response).await));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RagError::CompletionTimeout {
                    model: model.to_string(),
                    timeout,
                }
            } else {
                completion_err(format!("invalid /api/chat response: {}", e))
            }
        })?;

        if let Some(error) = parsed.error {
            return Err(completion_err(error));
        }
        parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| completion_err("response has no message".to_string()))
    }
}

/// Extract the `embeddings` arrays from an `/api/embed` response.
fn parse_embed_response(json: &serde_json::Value) -> std::result::Result<Vec<Embedding>, String> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| "missing embeddings array".to_string())?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .ok_or_else(|| "embedding is not an array".to_string())?
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| "embedding contains a non-number".to_string())
                })
                .collect()
        })
        .collect()
}
