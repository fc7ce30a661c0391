//! Chat session behavior against an in-process model provider.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jetrag::cache::IndexCache;
use jetrag::config::QueryMode;
use jetrag::loader::{load_documents, DocumentSet};
use jetrag::session::{ChatSession, SessionOptions, SessionState};
use jetrag_core::embedding::Embedding;
use jetrag_core::error::{RagError, Result};
use jetrag_core::models::{Document, Role};
use jetrag_core::prompt::Prompt;
use jetrag_core::provider::ModelProvider;
use jetrag_core::settings::{ChunkParams, SessionConfig};

#[derive(Clone, Copy, PartialEq)]
enum Reply {
    Ok,
    Hang,
}

struct StubProvider {
    installed: Mutex<BTreeSet<String>>,
    pulls: Mutex<Vec<String>>,
    embeds: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
    reply: Mutex<Reply>,
    down: AtomicBool,
    stall_pulls: AtomicBool,
}

impl StubProvider {
    fn with_models(models: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            installed: Mutex::new(models.iter().map(|m| m.to_string()).collect()),
            pulls: Mutex::new(Vec::new()),
            embeds: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            reply: Mutex::new(Reply::Ok),
            down: AtomicBool::new(false),
            stall_pulls: AtomicBool::new(false),
        })
    }

    fn ready() -> Arc<Self> {
        Self::with_models(&["llama3:latest", "mxbai-embed-large:latest"])
    }

    fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    fn pulls(&self) -> Vec<String> {
        self.pulls.lock().unwrap().clone()
    }

    fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    fn embeds(&self) -> usize {
        self.embeds.load(Ordering::SeqCst)
    }
}

/// Letter-frequency vector; texts sharing words land close together.
fn letter_vector(text: &str) -> Embedding {
    let mut v = vec![0.0f32; 27];
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    v[26] = 1.0;
    v
}

#[async_trait]
impl ModelProvider for StubProvider {
    async fn list_models(&self) -> Result<BTreeSet<String>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RagError::ProviderUnavailable {
                endpoint: "stub".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.installed.lock().unwrap().clone())
    }

    async fn pull_model(&self, name: &str) -> Result<()> {
        if self.stall_pulls.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        self.pulls.lock().unwrap().push(name.to_string());
        self.installed.lock().unwrap().insert(format!("{}:latest", name));
        Ok(())
    }

    async fn embed(&self, _model: &str, text: &str) -> Result<Embedding> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        Ok(letter_vector(text))
    }

    async fn complete(&self, _model: &str, prompt: &Prompt, _timeout: Duration) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let reply = *self.reply.lock().unwrap();
        match reply {
            Reply::Ok => Ok("OK".to_string()),
            Reply::Hang => std::future::pending().await,
        }
    }
}

fn doc(source: &str, body: &str) -> Document {
    Document {
        id: source.to_string(),
        source: source.to_string(),
        title: None,
        content_type: "text/plain".to_string(),
        body: body.to_string(),
        modified_at: Utc::now(),
    }
}

fn corpus() -> Arc<DocumentSet> {
    Arc::new(DocumentSet::new(
        "/corpus",
        vec![
            doc("flashing.md", &"Use the SDK Manager to flash JetPack onto the Orin. ".repeat(6)),
            doc("power.md", &"The power modes are set with nvpmodel and jetson_clocks. ".repeat(6)),
        ],
    ))
}

fn session_config(size: usize, overlap: usize) -> SessionConfig {
    SessionConfig::new("llama3", "mxbai-embed-large", ChunkParams::new(size, overlap).unwrap())
        .unwrap()
}

fn session_with(
    provider: Arc<StubProvider>,
    cache: Arc<IndexCache>,
    documents: Arc<DocumentSet>,
    options: SessionOptions,
) -> ChatSession {
    ChatSession::create(provider, cache, documents, session_config(100, 10), options)
}

fn session(provider: Arc<StubProvider>) -> ChatSession {
    session_with(provider, Arc::new(IndexCache::new()), corpus(), SessionOptions::default())
}

#[tokio::test]
async fn successful_turn_records_both_turns() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());

    let answer = session.submit("hello").await.unwrap();
    assert_eq!(answer, "OK");

    let turns = session.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!((turns[0].role, turns[0].text.as_str()), (Role::User, "hello"));
    assert_eq!((turns[1].role, turns[1].text.as_str()), (Role::Assistant, "OK"));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_index_stale());
}

#[tokio::test]
async fn prompt_carries_retrieved_context() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());

    session.submit("how do I flash jetpack").await.unwrap();

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    let system = prompts[0].system.clone().unwrap();
    assert!(system.contains("source: "), "{}", system);
    assert!(prompts[0].history.is_empty());
    assert_eq!(prompts[0].user, "how do I flash jetpack");
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_user_turn_and_session_usable() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());
    provider.set_reply(Reply::Hang);

    let err = session.submit("hello").await.unwrap_err();
    assert!(matches!(err, RagError::CompletionTimeout { .. }), "{:?}", err);
    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.turns()[0].text, "hello");
    assert_eq!(session.state(), SessionState::Idle);

    provider.set_reply(Reply::Ok);
    assert_eq!(session.submit("again").await.unwrap(), "OK");
    let texts: Vec<&str> = session.turns().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["hello", "again", "OK"]);
}

#[tokio::test(start_paused = true)]
async fn stalled_pull_fails_turn_and_session_stays_usable() {
    let provider = StubProvider::with_models(&["llama3:latest"]);
    provider.stall_pulls.store(true, Ordering::SeqCst);
    let mut session = session(provider.clone());

    let err = session.submit("hello").await.unwrap_err();
    match &err {
        RagError::ModelPull { model, reason } => {
            assert_eq!(model, "mxbai-embed-large");
            assert!(reason.contains("timed out"), "{}", reason);
        }
        other => panic!("expected ModelPull, got {:?}", other),
    }
    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.state(), SessionState::Idle);

    provider.stall_pulls.store(false, Ordering::SeqCst);
    assert_eq!(session.submit("again").await.unwrap(), "OK");
    assert_eq!(provider.pulls(), vec!["mxbai-embed-large".to_string()]);
}

#[tokio::test]
async fn chunk_change_rebuilds_with_new_params() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());

    session.submit("hello").await.unwrap();
    let before = session.index().cloned().unwrap();
    let embeds_before = provider.embeds();

    session.set_chunk_params(40, 5).unwrap();
    assert!(session.is_index_stale());

    session.submit("power modes").await.unwrap();
    let after = session.index().cloned().unwrap();
    assert_eq!(after.key().chunk_params, ChunkParams::new(40, 5).unwrap());
    assert!(after.len() > before.len());
    // every new chunk embedded, plus the query
    assert_eq!(provider.embeds(), embeds_before + after.len() + 1);
    assert!(!session.is_index_stale());
}

#[tokio::test]
async fn invalid_chunk_params_change_nothing() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());
    session.submit("hello").await.unwrap();
    let index = session.index().cloned().unwrap();

    let err = session.set_chunk_params(50, 50).unwrap_err();
    assert!(matches!(err, RagError::ConfigValidation { .. }));
    assert!(session.set_chunk_params(0, 0).is_err());

    assert_eq!(session.config().chunk_params, ChunkParams::new(100, 10).unwrap());
    assert!(!session.is_index_stale());
    assert!(Arc::ptr_eq(session.index().unwrap(), &index));
}

#[tokio::test]
async fn invalid_model_name_is_rejected() {
    let mut session = session(StubProvider::ready());
    assert!(session.set_llm_model("   ").is_err());
    assert!(session.set_embedding_model("two words").is_err());
    assert_eq!(session.config().llm_model, "llama3");
    assert_eq!(session.config().embedding_model, "mxbai-embed-large");
}

#[tokio::test]
async fn missing_models_are_pulled_once() {
    let provider = StubProvider::with_models(&["llama3:latest"]);
    let mut session = session(provider.clone());

    session.submit("one").await.unwrap();
    session.submit("two").await.unwrap();
    assert_eq!(provider.pulls(), vec!["mxbai-embed-large".to_string()]);
}

#[tokio::test]
async fn embedding_model_change_pulls_and_rebuilds() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());
    session.submit("one").await.unwrap();

    session.set_embedding_model("nomic-embed-text").unwrap();
    assert!(session.is_index_stale());
    session.submit("two").await.unwrap();

    assert_eq!(provider.pulls(), vec!["nomic-embed-text".to_string()]);
    assert_eq!(session.index().unwrap().key().embedding_model, "nomic-embed-text");
}

#[tokio::test]
async fn llm_change_reuses_cached_index() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());
    session.submit("one").await.unwrap();
    let index = session.index().cloned().unwrap();
    let embeds = provider.embeds();

    session.set_llm_model("mistral").unwrap();
    session.submit("two").await.unwrap();

    assert!(Arc::ptr_eq(session.index().unwrap(), &index));
    // only the query embedding
    assert_eq!(provider.embeds(), embeds + 1);
    assert_eq!(provider.pulls(), vec!["mistral".to_string()]);
}

#[tokio::test]
async fn follow_up_is_condensed_before_retrieval() {
    let provider = StubProvider::ready();
    let mut session = session(provider.clone());

    session.submit("how do I flash jetpack").await.unwrap();
    session.submit("and on the nano?").await.unwrap();

    let prompts = provider.prompts();
    // first turn: answer; second turn: condense, then answer
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].system.is_none());
    assert!(prompts[1].user.contains("and on the nano?"));
    assert!(prompts[1].user.contains("how do I flash jetpack"));

    let answer = &prompts[2];
    assert_eq!(answer.user, "and on the nano?");
    let history: Vec<&str> = answer.history.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(history, vec!["how do I flash jetpack", "OK"]);
}

#[tokio::test]
async fn last_message_mode_skips_condense() {
    let provider = StubProvider::ready();
    let options = SessionOptions {
        query_mode: QueryMode::LastMessage,
        ..SessionOptions::default()
    };
    let mut session = session_with(provider.clone(), Arc::new(IndexCache::new()), corpus(), options);

    session.submit("first").await.unwrap();
    session.submit("second").await.unwrap();
    assert_eq!(provider.prompts().len(), 2);
}

#[tokio::test]
async fn sessions_share_the_cache() {
    let provider = StubProvider::ready();
    let cache = Arc::new(IndexCache::new());
    let documents = corpus();

    let mut a = session_with(provider.clone(), cache.clone(), documents.clone(), SessionOptions::default());
    a.submit("one").await.unwrap();
    let embeds = provider.embeds();

    let mut b = session_with(provider.clone(), cache.clone(), documents, SessionOptions::default());
    b.submit("two").await.unwrap();

    assert_eq!(provider.embeds(), embeds + 1);
    assert!(Arc::ptr_eq(a.index().unwrap(), b.index().unwrap()));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn reconfiguring_releases_superseded_indexes() {
    let provider = StubProvider::ready();
    let cache = Arc::new(IndexCache::new());
    let mut session = session_with(provider, cache.clone(), corpus(), SessionOptions::default());

    session.submit("hello").await.unwrap();
    for size in [90, 80, 70, 60] {
        session.set_chunk_params(size, 5).unwrap();
        session.submit("power modes").await.unwrap();
        assert_eq!(cache.len(), 1);
    }
    assert!(cache.get(&session.index_key()).is_some());
}

#[tokio::test]
async fn index_held_by_another_session_survives_release() {
    let provider = StubProvider::ready();
    let cache = Arc::new(IndexCache::new());
    let documents = corpus();

    let mut a = session_with(provider.clone(), cache.clone(), documents.clone(), SessionOptions::default());
    let mut b = session_with(provider, cache.clone(), documents, SessionOptions::default());
    a.submit("one").await.unwrap();
    b.submit("two").await.unwrap();
    let shared_key = b.index_key();

    a.set_chunk_params(40, 5).unwrap();
    a.submit("three").await.unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&shared_key).is_some());

    b.set_chunk_params(40, 5).unwrap();
    b.submit("four").await.unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.get(&shared_key).is_none());
}

#[tokio::test]
async fn empty_corpus_fails_turn_with_index_error() {
    let provider = StubProvider::ready();
    let empty = Arc::new(DocumentSet::new("/empty", Vec::new()));
    let mut session = session_with(provider, Arc::new(IndexCache::new()), empty, SessionOptions::default());

    let err = session.submit("anything").await.unwrap_err();
    assert!(matches!(err, RagError::IndexBuild(_)), "{:?}", err);
    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.index().is_none());
}

#[tokio::test]
async fn unreachable_provider_surfaces_typed_error() {
    let provider = StubProvider::ready();
    provider.down.store(true, Ordering::SeqCst);
    let mut session = session(provider.clone());

    let err = session.submit("hello").await.unwrap_err();
    assert_eq!(err.kind(), "provider_unavailable");

    provider.down.store(false, Ordering::SeqCst);
    assert_eq!(session.submit("hello").await.unwrap(), "OK");
}

#[tokio::test]
async fn warm_up_builds_without_recording_turns() {
    let provider = StubProvider::ready();
    let mut session = session(provider);
    let index = session.warm_up().await.unwrap();
    assert_eq!(index.document_count(), 2);
    assert!(session.turns().is_empty());
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn teardown_returns_transcript() {
    let mut session = session(StubProvider::ready());
    session.submit("hello").await.unwrap();
    let turns = session.teardown();
    assert_eq!(turns.len(), 2);
}

#[tokio::test]
async fn loaded_directory_answers_end_to_end() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join("a.md"), "Jetson Orin boots from NVMe.").unwrap();
    std::fs::write(tmp.path().join("b.txt"), "The fan curve is set in the device tree.").unwrap();

    let config = jetrag::config::DocumentsConfig {
        root: tmp.path().to_path_buf(),
        ..Default::default()
    };
    let documents = Arc::new(load_documents(&config).unwrap());
    let provider = StubProvider::ready();
    let options = SessionOptions {
        top_k: 1,
        ..SessionOptions::default()
    };
    let mut session = session_with(provider.clone(), Arc::new(IndexCache::new()), documents, options);

    session.submit("what does the fan curve do").await.unwrap();
    let system = provider.prompts()[0].system.clone().unwrap();
    assert!(system.contains("source: b.txt"), "{}", system);
    assert!(!system.contains("source: a.md"));
}
