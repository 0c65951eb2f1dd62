//! Error types for the ledger.

use thiserror::Error;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger operations.
#[derive(Error, Debug)]
pub enum Error {
    // Chain errors
    #[error("Chain has no blocks")]
    EmptyChain,

    #[error("Invalid difficulty {0}: a digest has at most 256 leading zero bits")]
    InvalidDifficulty(u32),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Mining of block {index} aborted after {attempts} attempts")]
    MiningAborted { index: u64, attempts: u64 },

    // Snapshot errors
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
