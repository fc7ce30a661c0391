//! Token-bounded rolling window over the conversation transcript.
//!
//! The buffer never owns turns; it selects the longest suffix of the
//! transcript whose estimated token count fits the budget, dropping the
//! oldest turns first.

use crate::models::Turn;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Default token budget for conversation memory.
pub const DEFAULT_TOKEN_LIMIT: usize = 3900;

#[derive(Debug, Clone, Copy)]
pub struct MemoryBuffer {
    token_limit: usize,
}

impl MemoryBuffer {
    pub fn new(token_limit: usize) -> Self {
        Self { token_limit }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Newest turns of `turns` that fit within the budget, oldest first.
    pub fn window<'a>(&self, turns: &'a [Turn]) -> &'a [Turn] {
        let mut used = 0usize;
        let mut first = turns.len();
        for (i, turn) in turns.iter().enumerate().rev() {
            let cost = estimate_tokens(&turn.text);
            if used + cost > self.token_limit {
                break;
            }
            used += cost;
            first = i;
        }
        &turns[first..]
    }
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LIMIT)
    }
}

/// Rough token estimate: one token per four characters, rounded up, and at
/// least one token for any turn.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN).max(1)
}
