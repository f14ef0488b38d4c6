//! # Signing Strategies
//!
//! A certificate artifact is signed over its [`SigningEnvelope`]: the
//! certificate number, the SHA-256 digest and length of the artifact bytes,
//! and the signing timestamp. The envelope is canonicalized before signing,
//! so verification only needs the stored fields and the downloaded bytes.
//!
//! Two [`SigningProvider`] implementations exist, and which one is active is
//! decided once, when the [`IntegrityProvider`](crate::IntegrityProvider) is
//! built:
//!
//! | Mode | Output | `verify` accepts |
//! |---|---|---|
//! | [`Ed25519Signer`] | `ed25519:<128 hex>` | only a valid Ed25519 signature over the envelope |
//! | [`FallbackSigner`] | `FALLBACK-SIG:<64 hex>` | only the exact tag this signer would produce |
//!
//! The two prefixes are disjoint, and each signer rejects the other's format,
//! so a fallback signature is never accepted as cryptographic.

use serde::{Deserialize, Serialize};

use holdcert_core::{sha256_bytes, sha256_hex, CanonicalBytes, Timestamp};

use crate::ed25519::{
    bytes_to_hex, hex_to_array, verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey,
    Ed25519Signature,
};
use crate::error::CryptoError;

/// Prefix of cryptographic signatures.
pub const ED25519_PREFIX: &str = "ed25519:";
/// Prefix of fallback pseudo-signatures.
pub const FALLBACK_PREFIX: &str = "FALLBACK-SIG:";

/// Which signing strategy produced (or would verify) a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMode {
    /// Key-backed Ed25519.
    Ed25519,
    /// Non-cryptographic tagged placeholder.
    Fallback,
}

impl SignatureMode {
    /// Whether signatures in this mode carry cryptographic weight.
    pub fn is_cryptographic(&self) -> bool {
        matches!(self, Self::Ed25519)
    }
}

impl std::fmt::Display for SignatureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ed25519 => "ed25519",
            Self::Fallback => "fallback",
        })
    }
}

/// A prefixed signature string as stored on the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSignature(String);

impl ArtifactSignature {
    /// Wrap a stored signature string without validating it.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The signature string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The mode indicated by the prefix, if any.
    pub fn mode(&self) -> Option<SignatureMode> {
        if self.0.starts_with(ED25519_PREFIX) {
            Some(SignatureMode::Ed25519)
        } else if self.0.starts_with(FALLBACK_PREFIX) {
            Some(SignatureMode::Fallback)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ArtifactSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The material a certificate signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningEnvelope {
    /// Certificate number the artifact belongs to.
    pub certificate_number: String,
    /// Hex SHA-256 of the artifact bytes.
    pub content_digest: String,
    /// Artifact length in bytes.
    pub length: u64,
    /// Signing time, `YYYY-MM-DDTHH:MM:SSZ`.
    pub signed_at: String,
}

impl SigningEnvelope {
    /// Build the envelope for `bytes` issued under `certificate_number` at `signed_at`.
    pub fn new(bytes: &[u8], certificate_number: &str, signed_at: Timestamp) -> Self {
        Self {
            certificate_number: certificate_number.to_string(),
            content_digest: sha256_bytes(bytes).to_hex(),
            length: bytes.len() as u64,
            signed_at: signed_at.to_iso8601(),
        }
    }

    /// Canonical bytes of the full envelope.
    pub fn canonical(&self) -> Result<CanonicalBytes, CryptoError> {
        Ok(CanonicalBytes::new(self)?)
    }
}

/// A signing strategy.
pub trait SigningProvider: Send + Sync {
    /// The strategy's mode.
    fn mode(&self) -> SignatureMode;

    /// Sign an envelope.
    fn sign(&self, envelope: &SigningEnvelope) -> Result<ArtifactSignature, CryptoError>;

    /// Whether `signature` is one this strategy accepts for `envelope`.
    fn verify(&self, envelope: &SigningEnvelope, signature: &ArtifactSignature) -> bool;

    /// Verification key, for strategies that have one.
    fn public_key(&self) -> Option<Ed25519PublicKey>;
}

// ---------------------------------------------------------------------------
// Ed25519Signer
// ---------------------------------------------------------------------------

/// Key-backed Ed25519 strategy.
#[derive(Debug)]
pub struct Ed25519Signer {
    key_id: String,
    key: Ed25519KeyPair,
}

impl Ed25519Signer {
    /// Wrap a key pair under a key identifier.
    pub fn new(key_id: impl Into<String>, key: Ed25519KeyPair) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    /// The key identifier.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl SigningProvider for Ed25519Signer {
    fn mode(&self) -> SignatureMode {
        SignatureMode::Ed25519
    }

    fn sign(&self, envelope: &SigningEnvelope) -> Result<ArtifactSignature, CryptoError> {
        let canonical = envelope.canonical()?;
        let sig = self.key.sign(&canonical);
        Ok(ArtifactSignature(format!("{ED25519_PREFIX}{}", sig.to_hex())))
    }

    fn verify(&self, envelope: &SigningEnvelope, signature: &ArtifactSignature) -> bool {
        let Some(hex) = signature.as_str().strip_prefix(ED25519_PREFIX) else {
            return false;
        };
        let Ok(sig) = Ed25519Signature::from_hex(hex) else {
            return false;
        };
        let Ok(canonical) = envelope.canonical() else {
            return false;
        };
        verify_with_public_key(&canonical, &sig, &self.key.public_key()).is_ok()
    }

    fn public_key(&self) -> Option<Ed25519PublicKey> {
        Some(self.key.public_key())
    }
}

// ---------------------------------------------------------------------------
// FallbackSigner
// ---------------------------------------------------------------------------

/// Deterministic, tagged, non-cryptographic strategy.
///
/// The tag is `FALLBACK-SIG:` followed by SHA-256 over the canonical
/// `(certificate_number, signed_at, length)` triple. It proves nothing about
/// authorship; it only lets a later check confirm the stored value is the one
/// this signer emitted for those fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackSigner;

#[derive(Serialize)]
struct FallbackMaterial<'a> {
    certificate_number: &'a str,
    signed_at: &'a str,
    length: u64,
}

impl FallbackSigner {
    fn tag(envelope: &SigningEnvelope) -> Result<String, CryptoError> {
        let material = FallbackMaterial {
            certificate_number: &envelope.certificate_number,
            signed_at: &envelope.signed_at,
            length: envelope.length,
        };
        let canonical = CanonicalBytes::new(&material)?;
        Ok(format!("{FALLBACK_PREFIX}{}", sha256_hex(&canonical)))
    }

    /// Whether `value` has the fallback shape: prefix plus 64 lowercase hex.
    pub fn is_well_formed(value: &str) -> bool {
        value
            .strip_prefix(FALLBACK_PREFIX)
            .and_then(|hex| hex_to_array::<32>(hex).ok().map(|b| bytes_to_hex(&b) == hex))
            .unwrap_or(false)
    }
}

impl SigningProvider for FallbackSigner {
    fn mode(&self) -> SignatureMode {
        SignatureMode::Fallback
    }

    fn sign(&self, envelope: &SigningEnvelope) -> Result<ArtifactSignature, CryptoError> {
        Ok(ArtifactSignature(Self::tag(envelope)?))
    }

    fn verify(&self, envelope: &SigningEnvelope, signature: &ArtifactSignature) -> bool {
        if !Self::is_well_formed(signature.as_str()) {
            return false;
        }
        match Self::tag(envelope) {
            Ok(expected) => expected == signature.as_str(),
            Err(_) => false,
        }
    }

    fn public_key(&self) -> Option<Ed25519PublicKey> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> SigningEnvelope {
        let ts = Timestamp::parse("2026-03-01T09:00:00Z").unwrap();
        SigningEnvelope::new(b"%PDF-1.4 test", "SHR-202603-0001", ts)
    }

    #[test]
    fn envelope_binds_digest_and_length() {
        let env = envelope();
        assert_eq!(env.length, 13);
        assert_eq!(env.content_digest.len(), 64);
        assert_eq!(env.signed_at, "2026-03-01T09:00:00Z");
    }

    #[test]
    fn ed25519_signature_is_prefixed_and_verifies() {
        let signer = Ed25519Signer::new("issuer", Ed25519KeyPair::from_seed(&[3u8; 32]));
        let sig = signer.sign(&envelope()).unwrap();
        assert!(sig.as_str().starts_with(ED25519_PREFIX));
        assert_eq!(sig.mode(), Some(SignatureMode::Ed25519));
        assert!(signer.verify(&envelope(), &sig));
    }

    #[test]
    fn ed25519_rejects_changed_envelope() {
        let signer = Ed25519Signer::new("issuer", Ed25519KeyPair::generate());
        let sig = signer.sign(&envelope()).unwrap();
        let mut other = envelope();
        other.certificate_number = "SHR-202603-0002".to_string();
        assert!(!signer.verify(&other, &sig));
    }

    #[test]
    fn ed25519_rejects_fallback_signature() {
        let signer = Ed25519Signer::new("issuer", Ed25519KeyPair::generate());
        let fallback = FallbackSigner.sign(&envelope()).unwrap();
        assert!(!signer.verify(&envelope(), &fallback));
    }

    #[test]
    fn fallback_is_deterministic_and_tagged() {
        let a = FallbackSigner.sign(&envelope()).unwrap();
        let b = FallbackSigner.sign(&envelope()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.mode(), Some(SignatureMode::Fallback));
        assert_eq!(a.as_str().len(), FALLBACK_PREFIX.len() + 64);
        assert!(FallbackSigner.verify(&envelope(), &a));
    }

    #[test]
    fn fallback_rejects_arbitrary_and_ed25519_strings() {
        let env = envelope();
        for junk in ["", "FALLBACK-SIG:", "FALLBACK-SIG:xyz", "hello", "ed25519:00"] {
            assert!(!FallbackSigner.verify(&env, &ArtifactSignature::from_stored(junk)));
        }
        let real = Ed25519Signer::new("k", Ed25519KeyPair::generate())
            .sign(&env)
            .unwrap();
        assert!(!FallbackSigner.verify(&env, &real));
    }

    #[test]
    fn fallback_uppercase_hex_is_not_well_formed() {
        let sig = FallbackSigner.sign(&envelope()).unwrap();
        let upper = format!(
            "{FALLBACK_PREFIX}{}",
            sig.as_str()[FALLBACK_PREFIX.len()..].to_uppercase()
        );
        assert!(!FallbackSigner::is_well_formed(&upper));
    }

    #[test]
    fn fallback_has_no_public_key() {
        assert!(FallbackSigner.public_key().is_none());
        assert!(!SignatureMode::Fallback.is_cryptographic());
    }
}
