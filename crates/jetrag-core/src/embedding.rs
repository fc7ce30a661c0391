//! Vector utilities for embeddings.
//!
//! Embeddings are plain `Vec<f32>` values produced by a
//! [`ModelProvider`](crate::provider::ModelProvider); this module holds the
//! pure math the index and retriever need.

/// An embedding vector for one chunk or one query string.
pub type Embedding = Vec<f32>;

/// Cosine of the angle between `a` and `b`, in `[-1, 1]`.
///
/// Mismatched lengths, empty inputs and zero vectors score `0.0` (never NaN).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, sq_a, sq_b), (x, y)| {
            (dot + x * y, sq_a + x * x, sq_b + y * y)
        });

    let magnitude = (sq_a * sq_b).sqrt();
    if magnitude <= f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}
