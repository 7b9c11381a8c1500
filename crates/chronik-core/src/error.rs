use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChronikError {
    /// Expected-version precondition failed, optimistic retries were
    /// exhausted, or the backend reported a deadlock / lock-wait timeout.
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Failure while holding or releasing a checkpoint lock. The lock has
    /// already been released by the time this is returned.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Connectivity or backend-internal failure unrelated to concurrency.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Programmer misuse: nested transactions, reentrant locking,
    /// unsupported backends, invalid identifiers.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stored data could not be decoded. Reads halt on this error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ChronikError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, ChronikError::Concurrency(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ChronikError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, ChronikError>;
