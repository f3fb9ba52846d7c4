//! Identities used to discard stale asynchronous results.

use std::fmt;

/// Identity minted each time the workflow starts an asynchronous operation.
///
/// A completion is honored only while the token it carries is still the
/// active one for its operation kind. Tokens are never reused within a
/// controller, so a token held by an abandoned operation can never match
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallToken(u64);

impl CallToken {
    /// Raw generation number, for logs and diagnostics.
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`CallToken`]s.
#[derive(Debug, Default)]
pub(crate) struct TokenMint {
    last: u64,
}

impl TokenMint {
    pub(crate) fn mint(&mut self) -> CallToken {
        self.last += 1;
        CallToken(self.last)
    }
}
