//! Error types for the deduplicating chunk store.

use thiserror::Error;

/// Result type alias using the chunk store's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type shared by the chunker, node, and client.
///
/// `VerificationMismatch` (a weak-fp candidate whose SHA-1 didn't match) is
/// deliberately not represented here: it is expected dedup
/// behavior, not an error, and is handled as data (the chunk moves to the
/// upload set) rather than as a `Result::Err`.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket, file, or directory I/O failure. Aborts the current round/connection only.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Impossibly sized length field, truncated message, fingerprint format violation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Allocation failure for a required buffer.
    #[error("resource error: {0}")]
    Resource(String),

    /// The input file exceeds the in-memory processing cap.
    #[error("file too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}
