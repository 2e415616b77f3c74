//! Error types for blobcask

use thiserror::Error;

use crate::envelope::DecodeError;

/// Result type alias for blobcask operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blobcask operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("blob not found: {id}")]
    NotFound { id: String },

    #[error("blob already exists: {id}")]
    AlreadyExists { id: String },

    #[error("corrupt envelope for {id}: {source}")]
    CorruptEnvelope {
        id: String,
        #[source]
        source: DecodeError,
    },

    #[error(
        "corrupt data for {id}: expected {expected_len} bytes with hash {expected_hash:#018x}, \
         got {actual_len} bytes with hash {actual_hash:#018x}"
    )]
    CorruptData {
        id: String,
        expected_len: u64,
        actual_len: u64,
        expected_hash: u64,
        actual_hash: u64,
    },

    #[error("handle is closed")]
    ClosedHandle,

    #[error("driver {scheme:?} cannot finalize a non-seekable blob")]
    UnsupportedFinalization { scheme: String },

    #[error("I/O error during {op} of {id}: {source}")]
    Io {
        id: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata serialization error: {0}")]
    Metadata(#[from] bincode::Error),
}

impl Error {
    /// Wrap a driver-level I/O error, promoting the well-known kinds to
    /// their typed variants.
    pub(crate) fn from_io(id: &str, op: &'static str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound { id: id.to_string() },
            std::io::ErrorKind::AlreadyExists => Error::AlreadyExists { id: id.to_string() },
            _ => Error::Io {
                id: id.to_string(),
                op,
                source: err,
            },
        }
    }
}
