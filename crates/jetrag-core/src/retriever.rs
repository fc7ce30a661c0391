//! Query-time retrieval against a [`VectorIndex`].

use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::ScoredChunk;
use crate::provider::ModelProvider;

/// Default number of context chunks per turn.
pub const DEFAULT_TOP_K: usize = 2;

/// Embed `query` with the index's embedding model and return the `k` most
/// similar chunks in non-increasing score order.
///
/// At most `min(k, index.len())` chunks are returned; equal scores keep
/// index insertion order.
///
/// # Errors
///
/// [`RagError::Retrieval`] if the index is empty, `k` is zero, the query
/// cannot be embedded, or the query vector does not match the index
/// dimensionality.
pub async fn retrieve(
    provider: &dyn ModelProvider,
    index: &VectorIndex,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    if index.is_empty() {
        return Err(RagError::Retrieval("index is empty".to_string()));
    }
    if k == 0 {
        return Err(RagError::Retrieval("k must be at least 1".to_string()));
    }

    let model = &index.key().embedding_model;
    let query_vec = provider
        .embed(model, query)
        .await
        .map_err(|e| RagError::Retrieval(format!("could not embed query: {}", e)))?;

    if query_vec.len() != index.dims() {
        return Err(RagError::Retrieval(format!(
            "query embedding has {} dimensions but the index has {}",
            query_vec.len(),
            index.dims()
        )));
    }

    Ok(index.search(&query_vec, k))
}
