//! Index build progress reporting.
//!
//! Reports what the indexer is doing while a corpus is chunked and embedded,
//! so a first build over a large corpus does not look like a hang. Progress
//! is emitted on **stderr** so stdout remains the answer stream.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use jetrag_core::indexer::{BuildProgress, BuildProgressEvent, NoProgress};

/// Embedded-chunk events are printed at most once per this many chunks.
const HUMAN_REPORT_EVERY: usize = 25;

/// Human-friendly progress on stderr: "index  embedding  1,234 / 5,000 chunks".
#[derive(Default)]
pub struct StderrProgress {
    last_reported: AtomicUsize,
}

impl BuildProgress for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Chunked { documents, chunks } => {
                // A new build starts counting from zero.
                self.last_reported.store(0, Ordering::Relaxed);
                format!(
                    "index  chunked {} documents into {} chunks\n",
                    format_number(*documents as u64),
                    format_number(*chunks as u64)
                )
            }
            BuildProgressEvent::Embedded { n, total } => {
                let last = self.last_reported.load(Ordering::Relaxed);
                if *n != *total && n.saturating_sub(last) < HUMAN_REPORT_EVERY {
                    return;
                }
                self.last_reported.store(*n, Ordering::Relaxed);
                format!(
                    "index  embedding  {} / {} chunks\n",
                    format_number(*n as u64),
                    format_number(*total as u64)
                )
            }
            BuildProgressEvent::Finished { chunks, dims } => format!(
                "index  ready  {} chunks, {} dimensions\n",
                format_number(*chunks as u64),
                dims
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgress for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        let obj = match &event {
            BuildProgressEvent::Chunked { documents, chunks } => serde_json::json!({
                "event": "progress",
                "phase": "chunked",
                "documents": documents,
                "chunks": chunks
            }),
            BuildProgressEvent::Embedded { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            BuildProgressEvent::Finished { chunks, dims } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "chunks": chunks,
                "dims": dims
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a terminal, otherwise off.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress::default()),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
