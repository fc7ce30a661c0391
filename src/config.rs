use anyhow::{Context, Result};
use jetrag_core::indexer::DEFAULT_EMBED_CONCURRENCY;
use jetrag_core::memory::DEFAULT_TOKEN_LIMIT;
use jetrag_core::retriever::DEFAULT_TOP_K;
use jetrag_core::settings::{ChunkParams, SessionConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/data/documents/jetson")
}

fn default_include_globs() -> Vec<String> {
    [
        "**/*.md", "**/*.txt", "**/*.rst", "**/*.pdf", "**/*.docx", "**/*.pptx",
    ]
    .iter()
    .map(|g| g.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_llm")]
    pub llm: String,
    #[serde(default = "default_embedding_model")]
    pub embedding: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            llm: default_llm(),
            embedding: default_embedding_model(),
            request_timeout_secs: default_request_timeout_secs(),
            pull_timeout_secs: default_pull_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm() -> String {
    "llama3".to_string()
}
fn default_embedding_model() -> String {
    "mxbai-embed-large".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_pull_timeout_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

/// How the retrieval query is derived from the conversation.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Ask the LLM to fold the history and the new message into one
    /// standalone question.
    #[default]
    Condense,
    /// Retrieve with the new user message alone.
    LastMessage,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub query_mode: QueryMode,
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            query_mode: QueryMode::default(),
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_embed_concurrency() -> usize {
    DEFAULT_EMBED_CONCURRENCY
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_memory_token_limit")]
    pub memory_token_limit: usize,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            memory_token_limit: default_memory_token_limit(),
            topic: default_topic(),
            system_prompt: None,
            greeting: default_greeting(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}
fn default_memory_token_limit() -> usize {
    DEFAULT_TOKEN_LIMIT
}
fn default_topic() -> String {
    "NVIDIA Jetson embedded AI computer".to_string()
}
fn default_greeting() -> String {
    "Ask me a question about NVIDIA Jetson embedded AI computer!".to_string()
}

impl Config {
    /// The session-level knobs, validated.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let params = ChunkParams::new(self.chunking.chunk_size, self.chunking.chunk_overlap)?;
        Ok(SessionConfig::new(
            self.models.llm.clone(),
            self.models.embedding.clone(),
            params,
        )?)
    }

    pub fn validate(&self) -> Result<()> {
        self.session_config()?;

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.embed_concurrency == 0 {
            anyhow::bail!("retrieval.embed_concurrency must be >= 1");
        }
        if self.chat.timeout_secs == 0 {
            anyhow::bail!("chat.timeout_secs must be > 0");
        }
        if self.models.request_timeout_secs == 0 {
            anyhow::bail!("models.request_timeout_secs must be > 0");
        }
        if self.models.pull_timeout_secs == 0 {
            anyhow::bail!("models.pull_timeout_secs must be > 0");
        }
        if self.chat.memory_token_limit == 0 {
            anyhow::bail!("chat.memory_token_limit must be > 0");
        }
        if !self.models.ollama_url.starts_with("http://")
            && !self.models.ollama_url.starts_with("https://")
        {
            anyhow::bail!(
                "models.ollama_url must start with http:// or https:// (got '{}')",
                self.models.ollama_url
            );
        }
        if self.documents.include_globs.is_empty() {
            anyhow::bail!("documents.include_globs must not be empty");
        }
        Ok(())
    }
}

/// Values given on the command line, applied over the file before validation.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub llm: Option<String>,
    pub embedding_model: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

impl CliOverrides {
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(llm) = &self.llm {
            config.models.llm = llm.clone();
        }
        if let Some(embedding) = &self.embedding_model {
            config.models.embedding = embedding.clone();
        }
        if let Some(size) = self.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunking.chunk_overlap = overlap;
        }
        config.validate().context("Invalid command-line override")
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
