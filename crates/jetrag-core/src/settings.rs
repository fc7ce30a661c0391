//! Validated session settings.
//!
//! [`ChunkParams`] can only be constructed through [`ChunkParams::new`], so
//! any value in circulation satisfies `0 <= overlap < size`.

use serde::Serialize;

use crate::error::{RagError, Result};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;
/// Default number of characters shared by adjacent chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Sliding-window chunking parameters, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkParams {
    size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(RagError::config("chunk_size", "must be > 0"));
        }
        if overlap >= size {
            return Err(RagError::config(
                "chunk_overlap",
                format!(
                    "must be smaller than chunk_size (got overlap {} >= size {})",
                    overlap, size
                ),
            ));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of two consecutive windows.
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// The knobs a chat session exposes to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    pub llm_model: String,
    pub embedding_model: String,
    pub chunk_params: ChunkParams,
}

impl SessionConfig {
    pub fn new(
        llm_model: impl Into<String>,
        embedding_model: impl Into<String>,
        chunk_params: ChunkParams,
    ) -> Result<Self> {
        let llm_model = validate_model_name("llm_model", llm_model.into())?;
        let embedding_model = validate_model_name("embedding_model", embedding_model.into())?;
        Ok(Self {
            llm_model,
            embedding_model,
            chunk_params,
        })
    }
}

/// Trim a model name and reject empty or whitespace-containing names.
pub fn validate_model_name(field: &str, name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RagError::config(field, "model name must not be empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(RagError::config(
            field,
            format!("model name '{}' must not contain whitespace", trimmed),
        ));
    }
    Ok(trimmed.to_string())
}
