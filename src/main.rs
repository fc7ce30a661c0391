//! # JetRAG CLI (`jetrag`)
//!
//! ## Usage
//!
//! ```bash
//! jetrag --config ./config/jetrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jetrag models` | List installed models |
//! | `jetrag pull <name>` | Install a model if missing |
//! | `jetrag index` | Load documents and build the index |
//! | `jetrag ask "<question>"` | Answer one question |
//! | `jetrag chat` | Interactive chat session |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `jetrag=info`).

use clap::{Parser, Subcommand};
use jetrag::commands;
use jetrag::config::{self, CliOverrides};
use jetrag::progress::ProgressMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// JetRAG: chat with a local document corpus through Ollama.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/jetrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "jetrag",
    about = "Retrieval-augmented chat over a local document corpus, backed by Ollama",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/jetrag.toml")]
    config: PathBuf,

    /// Chat model, overriding `[models].llm`.
    #[arg(long, global = true)]
    llm: Option<String>,

    /// Embedding model, overriding `[models].embedding`.
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Chunk size in characters, overriding `[chunking].chunk_size`.
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Chunk overlap in characters, overriding `[chunking].chunk_overlap`.
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Index build progress on stderr. Defaults to `human` on a terminal,
    /// `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models installed in the Ollama daemon.
    ///
    /// Embedding models are marked, as are the two models the config uses.
    Models,

    /// Pull a model unless it is already installed.
    Pull {
        /// Model name, e.g. `llama3` or `mxbai-embed-large:latest`.
        name: String,
    },

    /// Load the corpus and build its index.
    ///
    /// Makes sure both models are installed first. Prints document and
    /// chunk counts and the embedding dimensionality.
    Index,

    /// Answer a single question and exit.
    Ask {
        /// The question.
        question: String,
    },

    /// Start an interactive chat session.
    ///
    /// Type a question per line. `/llm <name>`, `/embedding <name>` and
    /// `/chunks <size> <overlap>` reconfigure the session; `/history` shows
    /// the transcript; `/quit` exits.
    Chat,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jetrag=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut cfg = config::load_config(&cli.config)?;
    CliOverrides {
        llm: cli.llm,
        embedding_model: cli.embedding_model,
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
    }
    .apply(&mut cfg)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Models => {
            commands::run_models(&cfg).await?;
        }
        Commands::Pull { name } => {
            commands::run_pull(&cfg, &name).await?;
        }
        Commands::Index => {
            commands::run_index(&cfg, progress).await?;
        }
        Commands::Ask { question } => {
            commands::run_ask(&cfg, &question, progress).await?;
        }
        Commands::Chat => {
            commands::run_chat(&cfg, progress).await?;
        }
    }

    Ok(())
}
