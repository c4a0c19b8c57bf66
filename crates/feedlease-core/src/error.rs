//! Error types for the Feedlease data model
//!
//! ## Error Categories
//!
//! ### Identifier Errors
//! - `InvalidPartitionToken`: Lease token does not normalize to a partition id
//! - `EmptyToken`: Token normalized to the empty string
//!
//! ### Progress Errors
//! - `InvalidContinuation`: Continuation token does not carry an ordered epoch
//!
//! All functions in this crate return `Result<T>`, aliased to
//! `Result<T, Error>`, so callers can propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid partition token: {0:?}")]
    InvalidPartitionToken(String),

    #[error("Token is empty after normalization: {0:?}")]
    EmptyToken(String),

    #[error("Continuation token carries no epoch: {0:?}")]
    InvalidContinuation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
