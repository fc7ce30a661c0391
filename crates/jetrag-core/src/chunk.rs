//! Sliding-window text chunker.
//!
//! Splits document body text into [`Chunk`]s of at most `size` characters,
//! where each window starts `size - overlap` characters after the previous
//! one. Sizes are counted in `char`s, so multi-byte UTF-8 text is never cut
//! inside a code point.
//!
//! Each chunk receives a fresh UUID plus a SHA-256 hash of its text, and
//! remembers its character offset in the source document.
//!
//! # Guarantees
//!
//! - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
//! - Adjacent chunks share exactly `overlap` characters.
//! - The last chunk may be shorter than `size`.
//! - Whitespace-only documents produce no chunks.
//!
//! # Example
//!
//! ```rust
//! use jetrag_core::chunk::chunk_text;
//! use jetrag_core::settings::ChunkParams;
//!
//! let params = ChunkParams::new(4, 1).unwrap();
//! let chunks = chunk_text("doc-1", "notes.md", "abcdefghij", &params);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};
use crate::settings::ChunkParams;

/// Split `text` into overlapping windows described by `params`.
pub fn chunk_text(document_id: &str, source: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every char, plus the end of the string, so windows can
    // be sliced without re-walking the text.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = boundaries.len();
    boundaries.push(text.len());

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let end = (start + params.size()).min(char_len);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(document_id, source, chunk_index, start, piece));
        chunk_index += 1;

        if end == char_len {
            break;
        }
        start += params.step();
    }

    chunks
}

/// Chunk every document in order, concatenating the results.
pub fn chunk_documents(documents: &[Document], params: &ChunkParams) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_text(&doc.id, &doc.source, &doc.body, params))
        .collect()
}

fn make_chunk(document_id: &str, source: &str, index: i64, start: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        source: source.to_string(),
        chunk_index: index,
        start,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    /// Rebuild the original text by dropping each chunk's leading overlap.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("doc1", "a.md", "Hello, world!", &params(800, 50));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert!(chunk_text("doc1", "a.md", "", &params(10, 2)).is_empty());
        assert!(chunk_text("doc1", "a.md", "  \n\n\t", &params(10, 2)).is_empty());
    }

    #[test]
    fn test_exact_fit_has_no_trailing_chunk() {
        let chunks = chunk_text("doc1", "a.md", "abcdefgh", &params(8, 3));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_windows_and_offsets() {
        let chunks = chunk_text("doc1", "a.md", "abcdefghijk", &params(5, 2));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "defgh", "ghijk"]);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);
    }

    #[test]
    fn test_adjacent_chunks_overlap_exactly() {
        let text: String = (0..40).map(|i| format!("word{} ", i)).collect();
        for (size, overlap) in [(7, 0), (7, 3), (20, 19), (64, 10), (1000, 5)] {
            let chunks = chunk_text("doc1", "a.md", &text, &params(size, overlap));
            for pair in chunks.windows(2) {
                let prev: Vec<char> = pair[0].text.chars().collect();
                let next: Vec<char> = pair[1].text.chars().collect();
                assert_eq!(prev.len(), size, "only the last chunk may be short");
                let tail: String = prev[prev.len() - overlap..].iter().collect();
                let head: String = next[..overlap].iter().collect();
                assert_eq!(tail, head, "size={} overlap={}", size, overlap);
            }
            assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = "x".repeat(1000);
        let chunks = chunk_text("doc1", "a.md", &text, &params(30, 7));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_text("doc1", "a.md", text, &params(6, 2));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 6);
        }
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_deterministic_text_and_hash() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = chunk_text("doc1", "a.md", text, &params(5, 1));
        let c2 = chunk_text("doc1", "a.md", text, &params(5, 1));
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.chunk_index, b.chunk_index);
        }
    }

    #[test]
    fn test_chunk_documents_keeps_document_order() {
        let now = chrono::Utc::now();
        let docs: Vec<Document> = ["first doc", "", "second doc"]
            .iter()
            .enumerate()
            .map(|(i, body)| Document {
                id: format!("d{}", i),
                source: format!("{}.txt", i),
                title: None,
                content_type: "text/plain".to_string(),
                body: body.to_string(),
                modified_at: now,
            })
            .collect();
        let chunks = chunk_documents(&docs, &params(100, 10));
        let ids: Vec<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
        assert_eq!(ids, vec!["d0", "d2"]);
        assert_eq!(chunks[1].source, "2.txt");
    }
}
