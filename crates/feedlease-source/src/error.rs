//! Error types for feed source operations

use feedlease_core::PartitionId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown partition: {0}")]
    UnknownPartition(PartitionId),

    #[error("Invalid continuation token: {0}")]
    InvalidToken(#[from] feedlease_core::Error),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}
