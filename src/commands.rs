//! CLI command implementations.
//!
//! Each `run_*` function backs one `jetrag` subcommand. Answers and listings
//! go to stdout; progress, logs and inline errors go to stderr.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use jetrag_core::models::Role;
use jetrag_core::provider::{
    canonical_model_name, ensure_model, is_installed, looks_like_embedding_model, ModelProvider,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cache::IndexCache;
use crate::config::Config;
use crate::loader::load_documents;
use crate::ollama::OllamaClient;
use crate::progress::ProgressMode;
use crate::session::{ChatSession, SessionOptions};

/// `jetrag models`: list installed models, marking configured and embedding ones.
pub async fn run_models(config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.models)?;
    let installed = client.list_models().await?;

    println!("{:<40} {:<10} CONFIGURED", "MODEL", "KIND");
    for name in &installed {
        let kind = if looks_like_embedding_model(name) { "embedding" } else { "llm" };
        let configured = [&config.models.llm, &config.models.embedding]
            .iter()
            .any(|m| canonical_model_name(m) == canonical_model_name(name));
        println!("{:<40} {:<10} {}", name, kind, if configured { "*" } else { "" });
    }
    for wanted in [&config.models.llm, &config.models.embedding] {
        if !is_installed(&installed, wanted) {
            println!("{:<40} {:<10} * (not installed)", wanted, "-");
        }
    }
    Ok(())
}

/// `jetrag pull <name>`: install a model unless it is already present.
pub async fn run_pull(config: &Config, name: &str) -> Result<()> {
    let client = OllamaClient::new(&config.models)?;
    if ensure_model(&client, name).await? {
        println!("Pulled {}.", name);
    } else {
        println!("{} is already installed.", name);
    }
    Ok(())
}

/// `jetrag index`: load the corpus and build (or verify) its index.
pub async fn run_index(config: &Config, progress: ProgressMode) -> Result<()> {
    let mut session = open_session(config, progress)?;
    let index = session.warm_up().await?;
    println!(
        "Indexed {} documents into {} chunks ({} dimensions, model {}).",
        index.document_count(),
        index.len(),
        index.dims(),
        index.key().embedding_model
    );
    Ok(())
}

/// `jetrag ask "<question>"`: one turn on a fresh session.
pub async fn run_ask(config: &Config, question: &str, progress: ProgressMode) -> Result<()> {
    let mut session = open_session(config, progress)?;
    let answer = session.submit(question).await?;
    println!("{}", answer);
    Ok(())
}

/// `jetrag chat`: interactive loop until `/quit` or end of input.
pub async fn run_chat(config: &Config, progress: ProgressMode) -> Result<()> {
    let mut session = open_session(config, progress)?;
    println!("{}", config.chat.greeting);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_repl_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::History => {
                for turn in session.turns() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    println!("[{}] {}: {}", turn.at.format("%H:%M:%S"), who, turn.text);
                }
            }
            ReplCommand::Llm(name) => match session.set_llm_model(&name) {
                Ok(()) => println!("LLM set to {}.", session.config().llm_model),
                Err(e) => eprintln!("error: {}", e),
            },
            ReplCommand::Embedding(name) => match session.set_embedding_model(&name) {
                Ok(()) => println!(
                    "Embedding model set to {}; the index is rebuilt on the next question.",
                    session.config().embedding_model
                ),
                Err(e) => eprintln!("error: {}", e),
            },
            ReplCommand::Chunks(size, overlap) => match session.set_chunk_params(size, overlap) {
                Ok(()) => println!(
                    "Chunks set to {} chars with {} overlap; the index is rebuilt on the next question.",
                    size, overlap
                ),
                Err(e) => eprintln!("error: {}", e),
            },
            ReplCommand::Invalid(message) => eprintln!("{}", message),
            ReplCommand::Ask(text) => match session.submit(&text).await {
                Ok(answer) => println!("{}", answer),
                Err(e) => eprintln!("error [{}]: {}", e.kind(), e),
            },
        }
    }

    session.teardown();
    Ok(())
}

fn open_session(config: &Config, progress: ProgressMode) -> Result<ChatSession> {
    let documents = load_documents(&config.documents).with_context(|| {
        format!(
            "Failed to load documents from {}",
            config.documents.root.display()
        )
    })?;
    let provider: Arc<dyn ModelProvider> = Arc::new(OllamaClient::new(&config.models)?);
    let session = ChatSession::create(
        provider,
        Arc::new(IndexCache::new()),
        Arc::new(documents),
        config.session_config()?,
        SessionOptions::from_config(config),
    )
    .with_progress(progress.reporter());
    Ok(session)
}

fn print_help() {
    println!("/llm <name>               switch the chat model");
    println!("/embedding <name>         switch the embedding model (rebuilds the index)");
    println!("/chunks <size> <overlap>  change chunking (rebuilds the index)");
    println!("/history                  show the conversation");
    println!("/quit                     leave");
}

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Llm(String),
    Embedding(String),
    Chunks(usize, usize),
    History,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse_repl_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Ask(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("quit" | "exit", []) => ReplCommand::Quit,
        ("help", []) => ReplCommand::Help,
        ("history", []) => ReplCommand::History,
        ("llm", [model]) => ReplCommand::Llm(model.to_string()),
        ("embedding", [model]) => ReplCommand::Embedding(model.to_string()),
        ("chunks", [size, overlap]) => match (size.parse(), overlap.parse()) {
            (Ok(size), Ok(overlap)) => ReplCommand::Chunks(size, overlap),
            _ => ReplCommand::Invalid("usage: /chunks <size> <overlap> (whole numbers)".to_string()),
        },
        ("llm" | "embedding", _) => ReplCommand::Invalid(format!("usage: /{} <model>", name)),
        ("chunks", _) => ReplCommand::Invalid("usage: /chunks <size> <overlap>".to_string()),
        _ => ReplCommand::Invalid(format!("unknown command '/{}', try /help", name)),
    }
}
