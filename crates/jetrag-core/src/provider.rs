//! Model provider abstraction.
//!
//! The [`ModelProvider`] trait is the contract with the local model daemon:
//! list and pull models, embed text, and produce chat completions. Concrete
//! implementations (the Ollama HTTP client) live in the `jetrag` app crate;
//! tests use in-process stubs.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::embedding::Embedding;
use crate::error::Result;
use crate::prompt::Prompt;

/// Tag assumed when a model name carries none.
pub const DEFAULT_TAG: &str = "latest";

/// Abstract model-serving backend.
///
/// All calls are issued without automatic retry: a failure surfaces to the
/// caller immediately.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Names of installed models, e.g. `"llama3:latest"`.
    ///
    /// Fails with [`RagError::ProviderUnavailable`](crate::error::RagError::ProviderUnavailable)
    /// when the daemon cannot be reached.
    async fn list_models(&self) -> Result<BTreeSet<String>>;

    /// Download `name`, blocking until the pull completes.
    async fn pull_model(&self, name: &str) -> Result<()>;

    /// Embed a single text with `model`.
    async fn embed(&self, model: &str, text: &str) -> Result<Embedding>;

    /// Produce a chat completion, failing with
    /// [`RagError::CompletionTimeout`](crate::error::RagError::CompletionTimeout)
    /// once `timeout` has elapsed.
    async fn complete(&self, model: &str, prompt: &Prompt, timeout: Duration) -> Result<String>;
}

/// Normalize a model name so `"llama3"` and `"llama3:latest"` compare equal.
pub fn canonical_model_name(name: &str) -> String {
    let name = name.trim();
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{}:{}", name, DEFAULT_TAG)
    }
}

/// True if `name` is among `installed`, comparing canonical names.
pub fn is_installed(installed: &BTreeSet<String>, name: &str) -> bool {
    let wanted = canonical_model_name(name);
    installed.iter().any(|m| canonical_model_name(m) == wanted)
}

/// Make sure `name` is installed, pulling it if it is missing.
///
/// Idempotent: returns `Ok(false)` without pulling when the model is already
/// present, `Ok(true)` after a successful pull.
pub async fn ensure_model(provider: &dyn ModelProvider, name: &str) -> Result<bool> {
    let installed = provider.list_models().await?;
    if is_installed(&installed, name) {
        return Ok(false);
    }
    provider.pull_model(name).await?;
    Ok(true)
}

/// Heuristic used to offer embedding models separately from chat models.
pub fn looks_like_embedding_model(name: &str) -> bool {
    name.contains("embed")
}
