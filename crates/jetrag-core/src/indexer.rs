//! Index construction: chunk every document, embed every chunk, and collect
//! the pairs into a [`VectorIndex`].
//!
//! Embedding calls are independent, so they run concurrently (bounded by the
//! caller's `concurrency`). Results are collected first and then put back in
//! chunk order, which keeps the index layout deterministic regardless of
//! which call finishes first.
//!
//! The build is all-or-nothing: the first failing embedding call aborts the
//! build and drops the in-flight calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::chunk::chunk_documents;
use crate::embedding::Embedding;
use crate::error::{RagError, Result};
use crate::index::{IndexEntry, IndexKey, VectorIndex};
use crate::models::Document;
use crate::provider::ModelProvider;

/// Default number of embedding calls in flight during a build.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// A single progress event emitted during an index build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildProgressEvent {
    /// Documents have been split; embedding is about to start.
    Chunked { documents: usize, chunks: usize },
    /// `n` of `total` chunks have been embedded.
    Embedded { n: usize, total: usize },
    /// The index is complete.
    Finished { chunks: usize, dims: usize },
}

/// Receives build progress. Called from concurrent embedding futures.
pub trait BuildProgress: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Discards all progress events.
pub struct NoProgress;

impl BuildProgress for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

/// Build an index over `documents` using the chunking parameters and
/// embedding model named in `key`.
///
/// # Errors
///
/// [`RagError::IndexBuild`] if `documents` is empty, no document contains
/// text, any embedding call fails, or the provider returns empty or
/// inconsistently sized vectors.
pub async fn build_index(
    provider: &dyn ModelProvider,
    documents: &[Document],
    key: IndexKey,
    concurrency: usize,
    progress: &dyn BuildProgress,
) -> Result<VectorIndex> {
    if documents.is_empty() {
        return Err(RagError::IndexBuild("document set is empty".to_string()));
    }

    let chunks = chunk_documents(documents, &key.chunk_params);
    if chunks.is_empty() {
        return Err(RagError::IndexBuild(format!(
            "none of the {} documents contain any text",
            documents.len()
        )));
    }

    let total = chunks.len();
    progress.report(BuildProgressEvent::Chunked {
        documents: documents.len(),
        chunks: total,
    });

    let model = key.embedding_model.as_str();
    let done = AtomicUsize::new(0);

    let mut embedded: Vec<(usize, Embedding)> = stream::iter(chunks.iter().enumerate())
        .map(|(i, chunk)| {
            let done = &done;
            async move {
                let embedding = provider.embed(model, &chunk.text).await.map_err(|e| {
                    RagError::IndexBuild(format!(
                        "chunk {} of {}: {}",
                        chunk.chunk_index, chunk.source, e
                    ))
                })?;
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.report(BuildProgressEvent::Embedded { n, total });
                Ok::<_, RagError>((i, embedding))
            }
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    embedded.sort_by_key(|(i, _)| *i);

    let dims = embedded.first().map(|(_, e)| e.len()).unwrap_or(0);
    if dims == 0 {
        return Err(RagError::IndexBuild(format!(
            "model '{}' returned empty embeddings",
            model
        )));
    }
    if let Some((i, e)) = embedded.iter().find(|(_, e)| e.len() != dims) {
        return Err(RagError::IndexBuild(format!(
            "embedding for chunk {} has {} dimensions, expected {}",
            i,
            e.len(),
            dims
        )));
    }

    let entries: Vec<IndexEntry> = chunks
        .into_iter()
        .zip(embedded)
        .map(|(chunk, (_, embedding))| IndexEntry { embedding, chunk })
        .collect();

    progress.report(BuildProgressEvent::Finished {
        chunks: entries.len(),
        dims,
    });

    Ok(VectorIndex::from_entries(key, dims, entries))
}
