//! Static range sharding of the event-token space.
//!
//! The token space `[0, tokens)` is cut into `n` contiguous ranges of
//! `ceil(tokens / n)` tokens. Node `i` (its position in the sorted service
//! directory) owns range `i`; the last non-empty range absorbs the remainder.
//! Every membership change reshuffles all ranges.

use serde::{Deserialize, Serialize};

/// Size of the event-token space.
pub const MAX_EVENT_TOKENS: usize = 100;

/// Inclusive token range. Empty when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

impl TokenRange {
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn contains(&self, token: usize) -> bool {
        !self.is_empty() && token >= self.start && token <= self.end
    }
}

/// Range owned by node `i` of `n` over a space of `tokens` tokens.
pub fn calc_tokens(n: usize, tokens: usize, i: usize) -> TokenRange {
    if tokens == 0 {
        return TokenRange { start: 1, end: 0 };
    }
    let per_node = tokens.div_ceil(n.max(1));
    let start = per_node.saturating_mul(i);
    if start >= tokens {
        return TokenRange { start, end: start - 1 };
    }
    let end = (start + per_node - 1).min(tokens - 1);
    TokenRange { start, end }
}

/// Index of the node owning `token`. Inverse of [`calc_tokens`].
///
/// Uses the same `ceil(tokens / n)` bucket width, so the start of every range
/// maps back to its owner. Tokens past the space map to the last node.
pub fn calc_index(token: usize, tokens: usize, n: usize) -> usize {
    if n <= 1 || tokens == 0 {
        return 0;
    }
    let per_node = tokens.div_ceil(n);
    (token / per_node).min(n - 1)
}
