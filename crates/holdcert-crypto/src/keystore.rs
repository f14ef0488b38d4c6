//! # Key Store Abstraction
//!
//! The configured signing strategy retrieves its Ed25519 seed from a
//! [`KeyStore`]. `Ok(None)` means "no key material configured", which selects
//! the fallback signer. `Err(_)` means the store itself could not be read;
//! the provider selection logs it and also falls back.
//!
//! Seeds are 32 bytes, hex-encoded (64 chars) wherever they are stored.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::ed25519::hex_to_array;
use crate::error::KeyStoreError;

/// A 32-byte Ed25519 seed. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretSeed([u8; 32]);

impl SecretSeed {
    /// Wrap raw seed bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-char hex seed.
    pub fn from_hex(key_id: &str, hex: &str) -> Result<Self, KeyStoreError> {
        hex_to_array::<32>(hex.trim())
            .map(Self)
            .map_err(|reason| KeyStoreError::Malformed {
                key_id: key_id.to_string(),
                reason,
            })
    }

    /// Access the seed bytes.
    pub fn expose(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed([REDACTED])")
    }
}

/// Source of signing key material.
pub trait KeyStore: Send + Sync {
    /// Load the seed for `key_id`, or `None` when no key is configured.
    fn load_seed(&self, key_id: &str) -> Result<Option<SecretSeed>, KeyStoreError>;
}

/// Reads a hex seed from a single environment variable. `key_id` is ignored.
#[derive(Debug, Clone)]
pub struct EnvKeyStore {
    var: String,
}

impl EnvKeyStore {
    /// Read from the named environment variable.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyStore for EnvKeyStore {
    fn load_seed(&self, _key_id: &str) -> Result<Option<SecretSeed>, KeyStoreError> {
        match std::env::var(&self.var) {
            Ok(hex) if hex.trim().is_empty() => Ok(None),
            Ok(hex) => SecretSeed::from_hex(&self.var, &hex).map(Some),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(KeyStoreError::Unavailable(format!("{}: {e}", self.var))),
        }
    }
}

/// Reads `{dir}/{key_id}.key`, each file holding one hex seed.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Key files live directly under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl KeyStore for FileKeyStore {
    fn load_seed(&self, key_id: &str) -> Result<Option<SecretSeed>, KeyStoreError> {
        if key_id.contains('/') || key_id.contains('\\') || key_id.contains("..") {
            return Err(KeyStoreError::Malformed {
                key_id: key_id.to_string(),
                reason: "key id must be a plain file stem".to_string(),
            });
        }
        let path = self.dir.join(format!("{key_id}.key"));
        match std::fs::read_to_string(&path) {
            Ok(hex) => SecretSeed::from_hex(key_id, &hex).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeyStoreError::Io(e)),
        }
    }
}

/// In-memory key store, for tests and embedded deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyStore {
    keys: HashMap<String, SecretSeed>,
}

impl StaticKeyStore {
    /// An empty store: every lookup returns `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder: register a seed under `key_id`.
    pub fn with_key(mut self, key_id: impl Into<String>, seed: SecretSeed) -> Self {
        self.keys.insert(key_id.into(), seed);
        self
    }
}

impl KeyStore for StaticKeyStore {
    fn load_seed(&self, key_id: &str) -> Result<Option<SecretSeed>, KeyStoreError> {
        Ok(self.keys.get(key_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_debug_is_redacted() {
        let seed = SecretSeed::new([9u8; 32]);
        assert_eq!(format!("{seed:?}"), "SecretSeed([REDACTED])");
    }

    #[test]
    fn malformed_hex_is_reported_with_key_id() {
        let err = SecretSeed::from_hex("issuer", "abcd").unwrap_err();
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn env_store_absent_var_is_none() {
        let store = EnvKeyStore::new("HOLDCERT_TEST_KEY_THAT_IS_NEVER_SET");
        assert!(store.load_seed("any").unwrap().is_none());
    }

    #[test]
    fn file_store_reads_seed_and_handles_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("issuer.key"), "11".repeat(32)).unwrap();
        let store = FileKeyStore::new(dir.path());
        assert_eq!(
            store.load_seed("issuer").unwrap(),
            Some(SecretSeed::new([0x11; 32]))
        );
        assert!(store.load_seed("other").unwrap().is_none());
    }

    #[test]
    fn file_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        assert!(store.load_seed("../etc/passwd").is_err());
    }

    #[test]
    fn static_store_lookup() {
        let store = StaticKeyStore::empty().with_key("issuer", SecretSeed::new([1u8; 32]));
        assert!(store.load_seed("issuer").unwrap().is_some());
        assert!(store.load_seed("missing").unwrap().is_none());
    }
}
