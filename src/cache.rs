//! Process-wide cache of built vector indexes.
//!
//! Keyed by [`IndexKey`] (document-set fingerprint, chunk parameters,
//! embedding model). Each key owns an async `OnceCell`: the first caller
//! builds, concurrent callers for the same key wait for that build, and
//! nobody ever observes a partially built index. A failed build leaves the
//! cell empty so the next caller tries again.
//!
//! Sessions release a key when they move off it; the entry is dropped once
//! no session holds its index any more.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use jetrag_core::error::{RagError, Result};
use jetrag_core::index::{IndexKey, VectorIndex};
use jetrag_core::indexer::{build_index, BuildProgress};
use jetrag_core::provider::ModelProvider;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::loader::DocumentSet;

type Slot = Arc<OnceCell<Arc<VectorIndex>>>;

#[derive(Default)]
pub struct IndexCache {
    slots: Mutex<HashMap<IndexKey, Slot>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index for `key`, building it from `documents` on a miss.
    pub async fn get_or_build(
        &self,
        provider: &dyn ModelProvider,
        documents: &DocumentSet,
        key: IndexKey,
        concurrency: usize,
        progress: &dyn BuildProgress,
    ) -> Result<Arc<VectorIndex>> {
        let slot = self.slot(&key);
        if let Some(index) = slot.get() {
            debug!(model = %key.embedding_model, "index cache hit");
            return Ok(Arc::clone(index));
        }

        let index = slot
            .get_or_try_init(|| async {
                info!(
                    documents = documents.len(),
                    chunk_size = key.chunk_params.size(),
                    chunk_overlap = key.chunk_params.overlap(),
                    model = %key.embedding_model,
                    "building index"
                );
                let started = Instant::now();
                let index = build_index(
                    provider,
                    documents.documents(),
                    key.clone(),
                    concurrency,
                    progress,
                )
                .await?;
                info!(
                    chunks = index.len(),
                    dims = index.dims(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "index built"
                );
                Ok::<_, RagError>(Arc::new(index))
            })
            .await?;
        Ok(Arc::clone(index))
    }

    /// The cached index for `key`, if one has been built.
    pub fn get(&self, key: &IndexKey) -> Option<Arc<VectorIndex>> {
        let slots = self.lock();
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Drop the entry for `key`. Sessions holding the old `Arc` keep it.
    pub fn invalidate(&self, key: &IndexKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop the entry for `key` if the cache holds the only reference to its
    /// index. Returns whether an entry was removed.
    pub fn release(&self, key: &IndexKey) -> bool {
        let mut slots = self.lock();
        let unused = match slots.get(key) {
            Some(slot) => slot.get().map_or(false, |index| Arc::strong_count(index) == 1),
            None => false,
        };
        if unused {
            slots.remove(key);
        }
        unused
    }

    /// Number of keys with a completed index.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &IndexKey) -> Slot {
        let mut slots = self.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<IndexKey, Slot>> {
        // The map is only touched in short non-panicking sections.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
