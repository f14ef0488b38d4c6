//! # holdcert-crypto: Integrity and Signing
//!
//! - **Ed25519** key pairs, signatures and hex codecs ([`ed25519`]).
//! - **Key stores** that supply the signing seed ([`keystore`]).
//! - **Signing strategies**: key-backed Ed25519 and a tagged fallback
//!   ([`signing`]).
//! - **[`IntegrityProvider`]**: the mode-agnostic facade used by the
//!   generation pipeline and by certificate verification.
//!
//! ## Crate Policy
//!
//! - Depends only on `holdcert-core` internally.
//! - Tests use real SHA-256 and real Ed25519; nothing cryptographic is mocked.

pub mod ed25519;
pub mod error;
pub mod integrity;
pub mod keystore;
pub mod signing;

pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::{CryptoError, KeyStoreError};
pub use integrity::{IntegrityProvider, SignatureOutcome};
pub use keystore::{EnvKeyStore, FileKeyStore, KeyStore, SecretSeed, StaticKeyStore};
pub use signing::{
    ArtifactSignature, Ed25519Signer, FallbackSigner, SignatureMode, SigningEnvelope,
    SigningProvider, ED25519_PREFIX, FALLBACK_PREFIX,
};
