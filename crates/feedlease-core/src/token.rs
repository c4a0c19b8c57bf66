//! Continuation Tokens
//!
//! A continuation token marks how far a partition of the change feed has been
//! read. Tokens are issued by the feed source, carried through delivery, and
//! persisted into the lease record when a batch is checkpointed.
//!
//! ## Normalization
//!
//! Stores hand tokens back in several textual shapes: bare (`42`), quoted
//! (`"42"`), escaped (`\"42\"`), or padded with whitespace. All of them mean
//! the same position, so every token is normalized before its epoch is read
//! or before it is used to derive an identifier.
//!
//! ## Ordering
//!
//! The normalized form parses as a `u64` **epoch**. Epochs are monotonically
//! non-decreasing per partition: a checkpoint never moves a partition's
//! stored epoch backwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Strip whitespace, escape sequences, and surrounding quotes from a raw
/// token issued by a feed source or lease store.
///
/// Returns an error if nothing remains after normalization.
pub fn normalize_token(raw: &str) -> Result<&str> {
    let mut s = raw.trim();
    loop {
        if s.len() >= 4 && s.starts_with("\\\"") && s.ends_with("\\\"") {
            s = &s[2..s.len() - 2];
        } else if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            s = &s[1..s.len() - 1];
        } else {
            break;
        }
        s = s.trim();
    }
    if s.is_empty() {
        return Err(Error::EmptyToken(raw.to_string()));
    }
    Ok(s)
}

/// An opaque-but-ordered marker indicating how far a partition has been read.
///
/// The raw form is kept verbatim; [`ContinuationToken::epoch`] exposes the
/// ordered integer position behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The verbatim token as issued by the source.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ordered position behind this token.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidContinuation` if the normalized form is not an
    /// unsigned integer.
    pub fn epoch(&self) -> Result<u64> {
        let normalized = normalize_token(&self.0)?;
        normalized
            .parse::<u64>()
            .map_err(|_| Error::InvalidContinuation(self.0.clone()))
    }
}

impl From<u64> for ContinuationToken {
    fn from(epoch: u64) -> Self {
        Self(epoch.to_string())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
