//! # JetRAG Core
//!
//! Runtime-agnostic logic for JetRAG: data models, sliding-window chunking,
//! the in-memory vector index and its builder, the retriever, conversation
//! memory, prompt templates, the error taxonomy, and the [`ModelProvider`]
//! trait that abstracts the model daemon.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. The
//! application crate supplies a concrete provider and drives the chat
//! session.
//!
//! [`ModelProvider`]: provider::ModelProvider

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod memory;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod retriever;
pub mod settings;

pub use error::{RagError, Result};
