//! Error types for StripeIO
//!
//! This module defines the common error taxonomy used throughout the engine.

use thiserror::Error;

/// Common result type for StripeIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for StripeIO
#[derive(Debug, Error)]
pub enum Error {
    // Argument / lookup errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("object not found: {bucket}/{object}")]
    ObjectNotFound { bucket: String, object: String },

    // Integrity errors
    #[error("content md5 mismatch: expected {expected}, computed {computed}")]
    BadDigest { expected: String, computed: String },

    #[error("{algorithm} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    #[error("signature does not match")]
    SignatureDoesNotMatch,

    // Erasure coding errors
    #[error("parity shard count {parity} exceeds the limit of 127")]
    ParityOverflow { parity: usize },

    #[error("insufficient shards for reconstruction: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("erasure coding error: {0}")]
    ErasureCoding(String),

    // Storage errors
    #[error("disk I/O error: {0}")]
    DiskIo(#[from] std::io::Error),

    #[error("metadata decode error: {0}")]
    MetadataDecode(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an erasure coding error
    pub fn erasure(msg: impl Into<String>) -> Self {
        Self::ErasureCoding(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound(_) | Self::ObjectNotFound { .. })
    }

    /// Check if this is an integrity failure (content disagrees with a
    /// stored or caller-supplied digest)
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::BadDigest { .. } | Self::ChecksumMismatch { .. } | Self::SignatureDoesNotMatch
        )
    }
}
