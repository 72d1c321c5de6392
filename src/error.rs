//! Error types for the collection store.
//!
//! Local errors ([`StoreError`]) propagate to callers: on-device durability is
//! the one hard guarantee. Remote errors ([`RemoteError`]) are reported to the
//! observer and then dropped by the persistence service.

use thiserror::Error;

/// Main error type for local store and service write operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Record in {collection} is missing primary key field {field}")]
    MissingKey { collection: String, field: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for local store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure of a call against the remote backend.
///
/// Always non-fatal; the service degrades to local-only behavior.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("remote transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote response could not be decoded: {0}")]
    Decode(String),

    #[error("no remote backend configured")]
    Offline,
}

/// Result type for remote adapter calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
