//! # JetRAG
//!
//! Local retrieval-augmented chat over a document corpus, backed by an
//! Ollama daemon.
//!
//! JetRAG loads a directory of documents, splits them into overlapping
//! chunks, embeds every chunk with a local embedding model, and answers
//! questions by retrieving the most similar chunks and handing them to a
//! local LLM together with the recent conversation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Loader  │──▶│   Indexer   │──▶│ IndexCache  │
//! │ FS+globs │   │ Chunk+Embed │   │ per-key Arc │
//! └──────────┘   └─────────────┘   └──────┬──────┘
//!                                         │
//!                 ┌───────────────────────┤
//!                 ▼                       ▼
//!          ┌─────────────┐         ┌────────────┐
//!          │ ChatSession │◀───────▶│   Ollama   │
//!          │  retrieve+  │         │ tags/pull/ │
//!          │   compose   │         │ embed/chat │
//!          └─────────────┘         └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jetrag models                     # what the daemon has installed
//! jetrag index                      # build the index, print counts
//! jetrag ask "How do I flash JetPack?"
//! jetrag chat                       # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction for PDF, Word and PowerPoint files |
//! | [`loader`] | Corpus loading and fingerprinting |
//! | [`ollama`] | Ollama HTTP model provider |
//! | [`cache`] | Shared index cache |
//! | [`session`] | Chat session state machine |
//! | [`progress`] | Index build progress on stderr |
//! | [`commands`] | CLI command implementations |
//!
//! Chunking, the vector index, retrieval, memory and prompts live in
//! `jetrag-core`.

pub mod cache;
pub mod commands;
pub mod config;
pub mod extract;
pub mod loader;
pub mod ollama;
pub mod progress;
pub mod session;
