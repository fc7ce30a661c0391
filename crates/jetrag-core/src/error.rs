//! Error taxonomy shared by the indexer, retriever, model provider and chat
//! session.
//!
//! Every failure that can abort a chat turn is one of these variants, so
//! callers can match on the kind (e.g. render a timeout differently from a
//! provider outage) without string inspection.

use std::time::Duration;
use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors produced by the retrieval-augmented chat pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// The model daemon could not be reached.
    #[error("model provider unavailable at {endpoint}: {reason}")]
    ProviderUnavailable { endpoint: String, reason: String },

    /// Downloading a model failed.
    #[error("failed to pull model '{model}': {reason}")]
    ModelPull { model: String, reason: String },

    /// The provider failed to embed a text.
    #[error("embedding with model '{model}' failed: {reason}")]
    Embedding { model: String, reason: String },

    /// The provider failed to produce a chat completion.
    #[error("completion with model '{model}' failed: {reason}")]
    Completion { model: String, reason: String },

    /// The completion did not arrive within the caller's timeout.
    #[error("completion with model '{model}' timed out after {}s", timeout.as_secs())]
    CompletionTimeout { model: String, timeout: Duration },

    /// The index could not be built; no partial index exists.
    #[error("index build failed: {0}")]
    IndexBuild(String),

    /// Retrieval against the index failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A configuration change was rejected before any state was mutated.
    #[error("invalid configuration for {field}: {message}")]
    ConfigValidation { field: String, message: String },
}

impl RagError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Short, stable name of the variant, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::ProviderUnavailable { .. } => "provider_unavailable",
            RagError::ModelPull { .. } => "model_pull",
            RagError::Embedding { .. } => "embedding",
            RagError::Completion { .. } => "completion",
            RagError::CompletionTimeout { .. } => "completion_timeout",
            RagError::IndexBuild(_) => "index_build",
            RagError::Retrieval(_) => "retrieval",
            RagError::ConfigValidation { .. } => "config_validation",
        }
    }
}
