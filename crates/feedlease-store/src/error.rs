//! Error types for lease store operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid lease record: {0}")]
    InvalidRecord(#[from] feedlease_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
