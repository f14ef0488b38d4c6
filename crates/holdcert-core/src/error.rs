//! # Error Types
//!
//! Errors shared by every crate in the workspace. All use `thiserror`.
//! Domain crates (crypto, storage, state) define their own enums on top of
//! these and convert at their boundaries.

use thiserror::Error;

/// Input failed a structural check at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier was empty or too long.
    #[error("invalid {kind} identifier {value:?}: {reason}")]
    InvalidIdentifier {
        /// Which identifier namespace (e.g. "client", "investment").
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A decimal amount string was malformed.
    #[error("invalid decimal amount {0:?}")]
    InvalidAmount(String),

    /// A certificate number did not match `PREFIX-YYYYMM-SEQUENCE`.
    #[error("invalid certificate number {0:?}")]
    InvalidCertificateNumber(String),

    /// A timestamp or date could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A hex-encoded digest was malformed.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// A field held a value outside its permitted set or range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name as it appears in requests.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Month arithmetic overflowed the supported calendar range.
    #[error("date {date} + {months} months is out of range")]
    DateOutOfRange {
        /// The base date.
        date: String,
        /// The months that were added.
        months: u32,
    },
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
