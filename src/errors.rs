//! Error types for file-queue

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileQueueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Lock contention: gave up after {0} attempts")]
    LockExhausted(u32),

    #[error("Path error: {0}")]
    Path(String),
}

pub type Result<T> = std::result::Result<T, FileQueueError>;
