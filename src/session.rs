//! Chat session: one conversation over one document set.
//!
//! A turn moves the session through
//! `Idle → Retrieving → Composing → AwaitingCompletion → Idle`.
//! [`ChatSession::submit`] takes `&mut self`, so a session never has two
//! turns in flight. Whatever happens during a turn, the session ends it in
//! `Idle`: the user turn is always recorded, the assistant turn only on
//! success.
//!
//! Indexes are resolved through the shared [`IndexCache`]. Changing the
//! embedding model or chunk parameters marks the session's index stale; the
//! next turn fetches (or builds) the index for the new key before retrieving,
//! then releases the old key from the cache unless another session holds it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jetrag_core::error::{RagError, Result};
use jetrag_core::index::{IndexKey, VectorIndex};
use jetrag_core::indexer::{BuildProgress, NoProgress};
use jetrag_core::memory::MemoryBuffer;
use jetrag_core::models::Turn;
use jetrag_core::prompt::{render_context, Prompt, PromptTemplates};
use jetrag_core::provider::{ensure_model, ModelProvider};
use jetrag_core::retriever::retrieve;
use jetrag_core::settings::{validate_model_name, ChunkParams, SessionConfig};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::IndexCache;
use crate::config::{Config, QueryMode};
use crate::loader::DocumentSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Retrieving,
    Composing,
    AwaitingCompletion,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Retrieving => "retrieving",
            SessionState::Composing => "composing",
            SessionState::AwaitingCompletion => "awaiting_completion",
        };
        f.write_str(s)
    }
}

/// Per-session tuning that is not part of the index key.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub top_k: usize,
    pub query_mode: QueryMode,
    pub completion_timeout: Duration,
    pub pull_timeout: Duration,
    pub embed_concurrency: usize,
    pub memory: MemoryBuffer,
    pub templates: PromptTemplates,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        let templates = match &config.chat.system_prompt {
            Some(template) => PromptTemplates::with_context_template(template.clone()),
            None => PromptTemplates::for_topic(&config.chat.topic),
        };
        Self {
            top_k: config.retrieval.top_k,
            query_mode: config.retrieval.query_mode,
            completion_timeout: Duration::from_secs(config.chat.timeout_secs),
            pull_timeout: Duration::from_secs(config.models.pull_timeout_secs),
            embed_concurrency: config.retrieval.embed_concurrency,
            memory: MemoryBuffer::new(config.chat.memory_token_limit),
            templates,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct ChatSession {
    id: Uuid,
    provider: Arc<dyn ModelProvider>,
    cache: Arc<IndexCache>,
    documents: Arc<DocumentSet>,
    config: SessionConfig,
    options: SessionOptions,
    progress: Box<dyn BuildProgress>,
    turns: Vec<Turn>,
    index: Option<Arc<VectorIndex>>,
    index_stale: bool,
    models_ready: bool,
    state: SessionState,
}

impl ChatSession {
    /// Start a session. Models are checked and the index resolved lazily, on
    /// the first turn (or an explicit [`warm_up`](Self::warm_up)).
    pub fn create(
        provider: Arc<dyn ModelProvider>,
        cache: Arc<IndexCache>,
        documents: Arc<DocumentSet>,
        config: SessionConfig,
        options: SessionOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        info!(
            session = %id,
            llm = %config.llm_model,
            embedding = %config.embedding_model,
            documents = documents.len(),
            "session created"
        );
        Self {
            id,
            provider,
            cache,
            documents,
            config,
            options,
            progress: Box::new(NoProgress),
            turns: Vec::new(),
            index: None,
            index_stale: true,
            models_ready: false,
            state: SessionState::Idle,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn BuildProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The transcript, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The index used by the last turn, if any.
    pub fn index(&self) -> Option<&Arc<VectorIndex>> {
        self.index.as_ref()
    }

    pub fn is_index_stale(&self) -> bool {
        self.index_stale
    }

    /// The cache key the next turn will use.
    pub fn index_key(&self) -> IndexKey {
        IndexKey {
            document_set: self.documents.fingerprint().to_string(),
            chunk_params: self.config.chunk_params,
            embedding_model: self.config.embedding_model.clone(),
        }
    }

    pub fn set_llm_model(&mut self, name: &str) -> Result<()> {
        let name = validate_model_name("llm_model", name.to_string())?;
        if name == self.config.llm_model {
            return Ok(());
        }
        info!(session = %self.id, from = %self.config.llm_model, to = %name, "llm model changed");
        self.config.llm_model = name;
        self.models_ready = false;
        self.index_stale = true;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, name: &str) -> Result<()> {
        let name = validate_model_name("embedding_model", name.to_string())?;
        if name == self.config.embedding_model {
            return Ok(());
        }
        info!(
            session = %self.id,
            from = %self.config.embedding_model,
            to = %name,
            "embedding model changed"
        );
        self.config.embedding_model = name;
        self.models_ready = false;
        self.index_stale = true;
        Ok(())
    }

    pub fn set_chunk_params(&mut self, size: usize, overlap: usize) -> Result<()> {
        let params = ChunkParams::new(size, overlap)?;
        if params == self.config.chunk_params {
            return Ok(());
        }
        info!(session = %self.id, size, overlap, "chunk parameters changed");
        self.config.chunk_params = params;
        self.index_stale = true;
        Ok(())
    }

    /// Make sure both models are installed and the index is ready, without
    /// recording a turn.
    pub async fn warm_up(&mut self) -> Result<Arc<VectorIndex>> {
        let result = async {
            self.transition(SessionState::Retrieving);
            self.ensure_models().await?;
            self.resolve_index().await
        }
        .await;
        self.transition(SessionState::Idle);
        result
    }

    /// Run one turn and return the assistant's reply.
    ///
    /// On error the user turn stays in the transcript, no assistant turn is
    /// added and the session is back in `Idle`, ready for the next turn.
    pub async fn submit(&mut self, text: &str) -> Result<String> {
        self.turns.push(Turn::user(text));
        let result = self.run_turn(text).await;
        self.transition(SessionState::Idle);

        match result {
            Ok(answer) => {
                self.turns.push(Turn::assistant(answer.clone()));
                Ok(answer)
            }
            Err(e) => {
                warn!(session = %self.id, kind = e.kind(), error = %e, "turn failed");
                Err(e)
            }
        }
    }

    /// End the session, returning its transcript.
    pub fn teardown(self) -> Vec<Turn> {
        info!(session = %self.id, turns = self.turns.len(), "session closed");
        self.turns
    }

    async fn run_turn(&mut self, text: &str) -> Result<String> {
        self.transition(SessionState::Retrieving);
        self.ensure_models().await?;
        let index = self.resolve_index().await?;

        // Everything before the user turn just pushed.
        let prior = &self.turns[..self.turns.len().saturating_sub(1)];
        let memory = self.options.memory.window(prior).to_vec();

        let query = self.retrieval_query(&memory, text).await?;
        let hits = retrieve(self.provider.as_ref(), &index, &query, self.options.top_k).await?;
        debug!(session = %self.id, hits = hits.len(), "retrieved context");

        self.transition(SessionState::Composing);
        let context = render_context(&hits);
        let prompt = self.options.templates.compose(&context, &memory, text);

        self.transition(SessionState::AwaitingCompletion);
        let answer = self.complete(&prompt).await?;
        info!(session = %self.id, chars = answer.len(), "turn complete");
        Ok(answer)
    }

    async fn ensure_models(&mut self) -> Result<()> {
        if self.models_ready {
            return Ok(());
        }
        let limit = self.options.pull_timeout;
        for model in [&self.config.llm_model, &self.config.embedding_model] {
            let pulled = tokio::time::timeout(limit, ensure_model(self.provider.as_ref(), model))
                .await
                .map_err(|_| RagError::ModelPull {
                    model: model.clone(),
                    reason: format!("timed out after {}s", limit.as_secs()),
                })??;
            if pulled {
                info!(session = %self.id, model = %model, "pulled missing model");
            }
        }
        self.models_ready = true;
        Ok(())
    }

    async fn resolve_index(&mut self) -> Result<Arc<VectorIndex>> {
        if !self.index_stale {
            if let Some(index) = &self.index {
                return Ok(Arc::clone(index));
            }
        }

        let key = self.index_key();
        let previous = self.index.take().map(|index| index.key().clone());
        let built = self
            .cache
            .get_or_build(
                self.provider.as_ref(),
                &self.documents,
                key.clone(),
                self.options.embed_concurrency,
                self.progress.as_ref(),
            )
            .await;
        if let Some(previous) = previous.filter(|previous| *previous != key) {
            if self.cache.release(&previous) {
                debug!(session = %self.id, model = %previous.embedding_model, "released superseded index");
            }
        }
        let index = built?;
        self.index = Some(Arc::clone(&index));
        self.index_stale = false;
        Ok(index)
    }

    /// The text embedded for retrieval. In condense mode a follow-up is
    /// rewritten into a standalone question first.
    async fn retrieval_query(&self, memory: &[Turn], text: &str) -> Result<String> {
        if self.options.query_mode == QueryMode::LastMessage || memory.is_empty() {
            return Ok(text.to_string());
        }

        let prompt = self.options.templates.condense(memory, text);
        let condensed = self.complete(&prompt).await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            return Ok(text.to_string());
        }
        debug!(session = %self.id, query = %condensed, "condensed retrieval query");
        Ok(condensed.to_string())
    }

    /// Ask the LLM, bounded by the completion timeout even if the provider
    /// ignores it.
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let model = &self.config.llm_model;
        let timeout = self.options.completion_timeout;
        debug!(session = %self.id, model = %model, chars = prompt.char_len(), "requesting completion");

        match tokio::time::timeout(timeout, self.provider.complete(model, prompt, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::CompletionTimeout {
                model: model.clone(),
                timeout,
            }),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(session = %self.id, from = %self.state, to = %next, "state");
            self.state = next;
        }
    }
}
