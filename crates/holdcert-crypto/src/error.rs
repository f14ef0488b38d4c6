//! # Cryptographic Error Types

use thiserror::Error;

use holdcert_core::CanonicalizationError;

/// Errors from signing and verification.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// The signing envelope could not be canonicalized.
    #[error("signing envelope: {0}")]
    Envelope(#[from] CanonicalizationError),

    /// The configured signing backend cannot sign right now.
    #[error("signing provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Errors from loading key material.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// The key store could not be read.
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    /// Key material was present but malformed.
    #[error("malformed key {key_id}: {reason}")]
    Malformed {
        /// Key identifier.
        key_id: String,
        /// What was wrong.
        reason: String,
    },

    /// I/O failure reading a key file.
    #[error("key store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
