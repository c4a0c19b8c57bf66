//! Error types for the Feedlease processor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessorError>;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Processor already started")]
    AlreadyStarted,

    #[error("Observer failed: {0}")]
    Observer(anyhow::Error),

    #[error("Lease store error: {0}")]
    Store(#[from] feedlease_store::Error),

    #[error("Feed source error: {0}")]
    Source(#[from] feedlease_source::Error),

    #[error("Invalid continuation from source: {0}")]
    Continuation(#[from] feedlease_core::Error),

    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<anyhow::Error> for ProcessorError {
    fn from(error: anyhow::Error) -> Self {
        Self::Observer(error)
    }
}
