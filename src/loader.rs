//! Document loader: walks the corpus directory and produces [`Document`]s.
//!
//! Files are selected with include/exclude globs relative to the corpus root,
//! turned into text by [`extract`](crate::extract), and returned sorted by
//! path. Unreadable, oversized, or unextractable files are skipped with a
//! warning instead of failing the whole load.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use jetrag_core::models::Document;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::extract::{extract_text, TextFormat};

/// Directories never descended into.
const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A loaded corpus plus a fingerprint identifying its exact contents.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    root: PathBuf,
    documents: Vec<Document>,
    fingerprint: String,
}

impl DocumentSet {
    pub fn new(root: impl Into<PathBuf>, mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| a.source.cmp(&b.source));
        let fingerprint = fingerprint(&documents);
        Self {
            root: root.into(),
            documents,
            fingerprint,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Hex SHA-256 over every document's path and body. Two sets with the
    /// same files and contents share a fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn fingerprint(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.body.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Recursively load every matching file under `config.root`.
pub fn load_documents(config: &DocumentsConfig) -> Result<DocumentSet> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("Document root does not exist or is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match load_file(path, &rel_str, config.max_file_bytes) {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => skipped += 1,
            Err(e) => {
                warn!(file = %rel_str, error = %e, "skipping unreadable document");
                skipped += 1;
            }
        }
    }

    info!(
        root = %root.display(),
        documents = documents.len(),
        skipped,
        "loaded documents"
    );

    Ok(DocumentSet::new(root.clone(), documents))
}

/// Load one file. `Ok(None)` means the file was deliberately skipped.
fn load_file(path: &Path, relative_path: &str, max_bytes: u64) -> Result<Option<Document>> {
    let Some(format) = TextFormat::from_path(path) else {
        debug!(file = %relative_path, "skipping file with unsupported extension");
        return Ok(None);
    };

    let metadata = std::fs::metadata(path)?;
    if metadata.len() > max_bytes {
        warn!(
            file = %relative_path,
            bytes = metadata.len(),
            limit = max_bytes,
            "skipping oversized document"
        );
        return Ok(None);
    }

    let bytes = std::fs::read(path)?;
    let body = match extract_text(&bytes, format) {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %relative_path, error = %e, "skipping document that could not be extracted");
            return Ok(None);
        }
    };

    if body.trim().is_empty() {
        debug!(file = %relative_path, "skipping document without text");
        return Ok(None);
    }

    let modified_at: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    Ok(Some(Document {
        id: document_id(relative_path),
        source: relative_path.to_string(),
        title,
        content_type: format.content_type().to_string(),
        body,
        modified_at,
    }))
}

/// Stable id derived from the document's relative path.
fn document_id(relative_path: &str) -> String {
    let digest = Sha256::digest(relative_path.as_bytes());
    hex::encode(&digest[..8])
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
