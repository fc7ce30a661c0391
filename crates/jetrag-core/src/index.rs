//! In-memory vector index.
//!
//! A [`VectorIndex`] is an immutable list of (embedding, chunk) pairs built
//! once by the [`indexer`](crate::indexer). Search is brute-force cosine
//! similarity over every entry.

use serde::Serialize;

use crate::embedding::{cosine_similarity, Embedding};
use crate::models::{Chunk, ScoredChunk};
use crate::settings::ChunkParams;

/// Identity of an index: rebuild whenever any field differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexKey {
    /// Fingerprint of the document set (paths plus content).
    pub document_set: String,
    pub chunk_params: ChunkParams,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub embedding: Embedding,
    pub chunk: Chunk,
}

#[derive(Debug)]
pub struct VectorIndex {
    key: IndexKey,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Entries must already share one dimensionality; the indexer checks this.
    pub(crate) fn from_entries(key: IndexKey, dims: usize, entries: Vec<IndexEntry>) -> Self {
        Self { key, dims, entries }
    }

    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of distinct source documents represented in the index.
    pub fn document_count(&self) -> usize {
        let mut ids: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.chunk.document_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// The `k` most similar chunks, best first. Equal scores keep insertion
    /// order because the sort is stable.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }
}
