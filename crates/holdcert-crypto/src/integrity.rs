//! # Integrity & Signing Provider
//!
//! The single entry point the generation pipeline and the verify endpoint
//! use for hashing and signing.
//!
//! - **Selection happens once.** [`IntegrityProvider::from_key_store`] picks
//!   the Ed25519 strategy when the key store yields a seed, and the fallback
//!   strategy when it yields nothing or cannot be read. Call sites never
//!   branch on mode.
//! - **Runtime unavailability degrades, it does not abort.** If the primary
//!   strategy fails to sign, the artifact is signed by the fallback strategy
//!   and a warning is logged.
//! - **Hashing is mode-independent.** The same SHA-256 is used at generation
//!   and at integrity re-verification.

use std::sync::Arc;

use holdcert_core::{sha256_bytes, ContentDigest, Timestamp};

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey};
use crate::keystore::KeyStore;
use crate::signing::{
    ArtifactSignature, Ed25519Signer, FallbackSigner, SignatureMode, SigningEnvelope,
    SigningProvider,
};

/// The outcome of signing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureOutcome {
    /// The stored signature string.
    pub signature: ArtifactSignature,
    /// Which strategy actually produced it.
    pub mode: SignatureMode,
}

/// Hashing, signing and verification for certificate artifacts.
#[derive(Clone)]
pub struct IntegrityProvider {
    primary: Arc<dyn SigningProvider>,
    fallback: FallbackSigner,
}

impl std::fmt::Debug for IntegrityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityProvider")
            .field("mode", &self.primary.mode())
            .finish()
    }
}

impl IntegrityProvider {
    /// Use an explicit primary strategy.
    pub fn new(primary: Arc<dyn SigningProvider>) -> Self {
        Self {
            primary,
            fallback: FallbackSigner,
        }
    }

    /// Fallback-only provider (no key material configured).
    pub fn fallback_only() -> Self {
        Self::new(Arc::new(FallbackSigner))
    }

    /// Ed25519 provider over an in-memory key pair.
    pub fn with_key_pair(key_id: impl Into<String>, key: Ed25519KeyPair) -> Self {
        Self::new(Arc::new(Ed25519Signer::new(key_id, key)))
    }

    /// Select the strategy from a key store.
    pub fn from_key_store(store: &dyn KeyStore, key_id: &str) -> Self {
        match store.load_seed(key_id) {
            Ok(Some(seed)) => {
                let key = Ed25519KeyPair::from_seed(seed.expose());
                tracing::info!(key_id, public_key = %key.public_key(), "Ed25519 signing configured");
                Self::with_key_pair(key_id, key)
            }
            Ok(None) => {
                tracing::warn!(
                    key_id,
                    "no signing key configured; certificates will carry fallback signatures"
                );
                Self::fallback_only()
            }
            Err(e) => {
                tracing::warn!(
                    key_id,
                    error = %e,
                    "signing key store unavailable; using fallback signatures"
                );
                Self::fallback_only()
            }
        }
    }

    /// The configured (primary) mode.
    pub fn mode(&self) -> SignatureMode {
        self.primary.mode()
    }

    /// Verification key of the primary strategy.
    pub fn public_key(&self) -> Option<Ed25519PublicKey> {
        self.primary.public_key()
    }

    /// Content digest of artifact bytes.
    pub fn hash(&self, bytes: &[u8]) -> ContentDigest {
        sha256_bytes(bytes)
    }

    /// Sign `(bytes, certificate_number, signed_at)`.
    ///
    /// If the primary strategy errors, the fallback strategy signs instead and
    /// the outcome reports which one did. The only remaining error is an
    /// envelope that cannot be canonicalized.
    pub fn sign(
        &self,
        bytes: &[u8],
        certificate_number: &str,
        signed_at: Timestamp,
    ) -> Result<SignatureOutcome, crate::CryptoError> {
        let envelope = SigningEnvelope::new(bytes, certificate_number, signed_at);
        match self.primary.sign(&envelope) {
            Ok(signature) => Ok(SignatureOutcome {
                signature,
                mode: self.primary.mode(),
            }),
            Err(e) => {
                tracing::warn!(
                    certificate_number,
                    error = %e,
                    "primary signing provider failed; signing with fallback"
                );
                Ok(SignatureOutcome {
                    signature: self.fallback.sign(&envelope)?,
                    mode: SignatureMode::Fallback,
                })
            }
        }
    }

    /// Verify a stored signature against downloaded bytes.
    ///
    /// Only signatures in the provider's own mode are checked. A configured
    /// Ed25519 provider rejects fallback tags outright; the structural
    /// fallback check applies only when the provider itself is in fallback
    /// mode. Unknown formats fail.
    pub fn verify(
        &self,
        bytes: &[u8],
        certificate_number: &str,
        signed_at: Timestamp,
        signature: &ArtifactSignature,
    ) -> bool {
        if signature.mode() != Some(self.primary.mode()) {
            return false;
        }
        let envelope = SigningEnvelope::new(bytes, certificate_number, signed_at);
        self.primary.verify(&envelope, signature)
    }

    /// Whether `signature` verifies and carries cryptographic weight.
    pub fn verify_cryptographic(
        &self,
        bytes: &[u8],
        certificate_number: &str,
        signed_at: Timestamp,
        signature: &ArtifactSignature,
    ) -> bool {
        self.primary.mode().is_cryptographic()
            && self.verify(bytes, certificate_number, signed_at, signature)
    }

    /// Recompute the digest of `bytes` and compare with the stored hex value.
    pub fn verify_integrity(&self, bytes: &[u8], expected_hash_hex: &str) -> bool {
        match ContentDigest::from_hex(expected_hash_hex) {
            Ok(expected) => self.hash(bytes) == expected,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;
    use crate::keystore::{SecretSeed, StaticKeyStore};

    struct Offline;

    impl SigningProvider for Offline {
        fn mode(&self) -> SignatureMode {
            SignatureMode::Ed25519
        }
        fn sign(&self, _: &SigningEnvelope) -> Result<ArtifactSignature, CryptoError> {
            Err(CryptoError::ProviderUnavailable("hsm offline".into()))
        }
        fn verify(&self, _: &SigningEnvelope, _: &ArtifactSignature) -> bool {
            false
        }
        fn public_key(&self) -> Option<Ed25519PublicKey> {
            None
        }
    }

    fn ts() -> Timestamp {
        Timestamp::parse("2026-05-01T10:00:00Z").unwrap()
    }

    #[test]
    fn key_store_with_seed_selects_ed25519() {
        let store = StaticKeyStore::empty().with_key("issuer", SecretSeed::new([5u8; 32]));
        let provider = IntegrityProvider::from_key_store(&store, "issuer");
        assert_eq!(provider.mode(), SignatureMode::Ed25519);
        assert!(provider.public_key().is_some());
    }

    #[test]
    fn empty_key_store_selects_fallback() {
        let provider = IntegrityProvider::from_key_store(&StaticKeyStore::empty(), "issuer");
        assert_eq!(provider.mode(), SignatureMode::Fallback);
        assert!(provider.public_key().is_none());
    }

    #[test]
    fn sign_then_verify_in_both_modes() {
        for provider in [
            IntegrityProvider::with_key_pair("k", Ed25519KeyPair::generate()),
            IntegrityProvider::fallback_only(),
        ] {
            let out = provider.sign(b"artifact", "BND-202605-0003", ts()).unwrap();
            assert_eq!(out.mode, provider.mode());
            assert!(provider.verify(b"artifact", "BND-202605-0003", ts(), &out.signature));
            // Length changes, so both strategies reject it.
            assert!(!provider.verify(b"artifact!", "BND-202605-0003", ts(), &out.signature));
        }
    }

    #[test]
    fn ed25519_detects_tampered_bytes() {
        let provider = IntegrityProvider::with_key_pair("k", Ed25519KeyPair::generate());
        let out = provider.sign(b"artifact", "UNT-202605-0001", ts()).unwrap();
        assert!(!provider.verify(b"tampered", "UNT-202605-0001", ts(), &out.signature));
    }

    #[test]
    fn unavailable_primary_degrades_to_fallback() {
        let provider = IntegrityProvider::new(Arc::new(Offline));
        let out = provider.sign(b"bytes", "EQT-202605-0009", ts()).unwrap();
        assert_eq!(out.mode, SignatureMode::Fallback);
        // The degraded tag is well formed but never counts as a real signature.
        assert!(!provider.verify(b"bytes", "EQT-202605-0009", ts(), &out.signature));
        assert!(IntegrityProvider::fallback_only().verify(
            b"bytes",
            "EQT-202605-0009",
            ts(),
            &out.signature
        ));
    }

    #[test]
    fn configured_provider_rejects_fallback_tags() {
        let provider = IntegrityProvider::with_key_pair("k", Ed25519KeyPair::generate());
        let env = SigningEnvelope::new(b"forged bytes", "SHR-202605-0001", ts());
        let tag = FallbackSigner.sign(&env).unwrap();
        assert!(!provider.verify(b"forged bytes", "SHR-202605-0001", ts(), &tag));
        assert!(!provider.verify_cryptographic(b"forged bytes", "SHR-202605-0001", ts(), &tag));
    }

    #[test]
    fn fallback_provider_is_never_cryptographic() {
        let provider = IntegrityProvider::fallback_only();
        let out = provider.sign(b"artifact", "SHR-202605-0002", ts()).unwrap();
        assert!(provider.verify(b"artifact", "SHR-202605-0002", ts(), &out.signature));
        assert!(!provider.verify_cryptographic(b"artifact", "SHR-202605-0002", ts(), &out.signature));
    }

    #[test]
    fn unknown_signature_format_fails() {
        let provider = IntegrityProvider::fallback_only();
        let junk = ArtifactSignature::from_stored("rsa:abcdef");
        assert!(!provider.verify(b"x", "SHR-202605-0001", ts(), &junk));
    }

    #[test]
    fn integrity_check_compares_digest() {
        let provider = IntegrityProvider::fallback_only();
        let hash = provider.hash(b"pdf bytes").to_hex();
        assert!(provider.verify_integrity(b"pdf bytes", &hash));
        assert!(!provider.verify_integrity(b"pdf bytez", &hash));
        assert!(!provider.verify_integrity(b"pdf bytes", "not-a-digest"));
    }
}
