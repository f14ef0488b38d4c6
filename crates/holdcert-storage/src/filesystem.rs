//! # Filesystem-Backed Storage
//!
//! The durable backend. An object stored under key `k` lives at `{root}/k`,
//! with a JSON sidecar at `{root}/k.meta.json` recording content type, size,
//! upload time and the [`ObjectMetadata`].
//!
//! Writes go to a temporary sibling and are renamed into place, so a reader
//! never observes a partially written artifact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use holdcert_core::Timestamp;

use crate::error::StorageError;
use crate::gateway::{validate_key, ObjectMetadata, StorageGateway, StorageMode, StoredObject};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Sidecar record written next to each object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// MIME type given at upload.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload time.
    pub uploaded_at: Timestamp,
    /// Caller-supplied metadata.
    pub metadata: ObjectMetadata,
}

/// Durable storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
    base_url: Option<String>,
}

impl FilesystemStorage {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, base_url: Option<String>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            key: root.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            root,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of the object stored under `key`.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}{SIDECAR_SUFFIX}"))
    }

    /// Read the sidecar record for `key`.
    pub fn record(&self, key: &str) -> Result<ObjectRecord, StorageError> {
        validate_key(key)?;
        let raw = std::fs::read(self.sidecar_path(key)).map_err(|e| StorageError::io(key, e))?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::Metadata {
            key: key.to_string(),
            source: e,
        })
    }
}

fn write_atomically(path: &Path, bytes: &[u8], key: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(key, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".partial");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(|e| StorageError::io(key, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::io(key, e))
}

impl StorageGateway for FilesystemStorage {
    fn mode(&self) -> StorageMode {
        StorageMode::Remote
    }

    fn upload(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        if key.ends_with(SIDECAR_SUFFIX) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "reserved suffix",
            });
        }
        let record = ObjectRecord {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Timestamp::now(),
            metadata: metadata.clone(),
        };
        let sidecar = serde_json::to_vec_pretty(&record).map_err(|e| StorageError::Metadata {
            key: key.to_string(),
            source: e,
        })?;

        write_atomically(&self.object_path(key), bytes, key)?;
        write_atomically(&self.sidecar_path(key), &sidecar, key)?;

        tracing::debug!(key, size = record.size, "stored object");
        Ok(StoredObject {
            key: key.to_string(),
            location: self.resolve_url(key),
            size: record.size,
        })
    }

    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        std::fs::read(self.object_path(key)).map_err(|e| StorageError::io(key, e))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        std::fs::remove_file(self.object_path(key)).map_err(|e| StorageError::io(key, e))?;
        match std::fs::remove_file(self.sidecar_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        self.object_path(key)
            .try_exists()
            .map_err(|e| StorageError::io(key, e))
    }

    fn resolve_url(&self, key: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("file://{}", self.object_path(key).display()),
        }
    }
}
