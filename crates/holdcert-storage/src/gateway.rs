//! # Storage Gateway Contract
//!
//! Both backends implement [`StorageGateway`] and are interchangeable from the
//! caller's side. The backend is chosen once, from [`StorageSettings`], and
//! callers never branch on [`StorageMode`]; it exists for diagnostics only.
//!
//! Object keys are relative, `/`-separated paths whose segments use only
//! ASCII letters, digits, `.`, `_` and `-`. Any other key is rejected with
//! [`StorageError::InvalidKey`] by every backend.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::filesystem::FilesystemStorage;
use crate::simulated::SimulatedStorage;

/// Which backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Durable backend.
    Remote,
    /// In-memory stand-in used when no durable backend is configured.
    Simulated,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Simulated => "simulated",
        })
    }
}

/// Descriptive metadata attached to an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Certificate number the artifact belongs to.
    pub certificate_number: String,
    /// Owning client.
    pub client_id: String,
    /// Certificate type (`SHARE`, `BOND`, ...).
    pub certificate_type: String,
    /// Hex SHA-256 of the bytes.
    pub hash: String,
    /// Stored signature string.
    pub signature: String,
}

/// What an upload returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Key the object was stored under.
    pub key: String,
    /// Resolvable location of the object.
    pub location: String,
    /// Size in bytes.
    pub size: u64,
}

/// Durable artifact storage.
pub trait StorageGateway: Send + Sync {
    /// The active backend.
    fn mode(&self) -> StorageMode;

    /// Store `bytes` under `key`, replacing any existing object.
    fn upload(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject, StorageError>;

    /// Fetch the bytes stored under `key`.
    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the object under `key`.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether an object is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// The location string a client would use to fetch `key`.
    fn resolve_url(&self, key: &str) -> String;
}

/// Backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageSettings {
    /// Durable storage rooted at a directory.
    Remote {
        /// Root directory.
        root: PathBuf,
        /// Public URL prefix; `file://` locations are used when absent.
        base_url: Option<String>,
    },
    /// In-memory storage.
    #[default]
    Simulated,
}

impl StorageSettings {
    /// Build the configured backend.
    pub fn build(&self) -> Result<Arc<dyn StorageGateway>, StorageError> {
        match self {
            Self::Remote { root, base_url } => {
                let store = FilesystemStorage::open(root.clone(), base_url.clone())?;
                tracing::info!(root = %root.display(), "artifact storage: remote");
                Ok(Arc::new(store))
            }
            Self::Simulated => {
                tracing::warn!("artifact storage: simulated (in-memory, not durable)");
                Ok(Arc::new(SimulatedStorage::new()))
            }
        }
    }
}

/// Reject keys that are not safe relative paths.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = |reason| {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };
    if key.is_empty() {
        return invalid("empty");
    }
    if key.len() > 512 {
        return invalid("longer than 512 characters");
    }
    for segment in key.split('/') {
        if segment.is_empty() {
            return invalid("empty path segment");
        }
        if segment == "." || segment == ".." {
            return invalid("relative path segment");
        }
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return invalid("unsupported character");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_descriptive_keys() {
        for key in [
            "certificates/C-100/SHR-202601-0001_v1.pdf",
            "a",
            "x/y/z.bin",
        ] {
            assert!(validate_key(key).is_ok(), "{key}");
        }
    }

    #[test]
    fn rejects_unsafe_keys() {
        for key in ["", "/abs", "a//b", "../up", "a/./b", "sp ace", "a\\b", "trailing/"] {
            assert!(validate_key(key).is_err(), "{key}");
        }
    }

    #[test]
    fn default_settings_are_simulated() {
        let gateway = StorageSettings::default().build().unwrap();
        assert_eq!(gateway.mode(), StorageMode::Simulated);
    }
}
