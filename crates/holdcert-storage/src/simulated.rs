//! # Simulated Storage
//!
//! In-memory backend used when no durable storage is configured. Objects
//! survive only as long as the process. Locations use the `simulated://`
//! scheme so they are never mistaken for fetchable URLs.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::StorageError;
use crate::gateway::{validate_key, ObjectMetadata, StorageGateway, StorageMode, StoredObject};

const SCHEME: &str = "simulated://";

#[derive(Debug, Clone)]
struct SimulatedObject {
    bytes: Vec<u8>,
    content_type: String,
    metadata: ObjectMetadata,
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct SimulatedStorage {
    objects: RwLock<HashMap<String, SimulatedObject>>,
}

impl SimulatedStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Content type recorded for `key`.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).map(|o| o.content_type.clone())
    }

    /// Metadata recorded for `key`.
    pub fn metadata(&self, key: &str) -> Option<ObjectMetadata> {
        self.objects.read().get(key).map(|o| o.metadata.clone())
    }
}

impl StorageGateway for SimulatedStorage {
    fn mode(&self) -> StorageMode {
        StorageMode::Simulated
    }

    fn upload(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        self.objects.write().insert(
            key.to_string(),
            SimulatedObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        tracing::debug!(key, size = bytes.len(), "stored object (simulated)");
        Ok(StoredObject {
            key: key.to_string(),
            location: self.resolve_url(key),
            size: bytes.len() as u64,
        })
    }

    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.objects
            .read()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.objects.read().contains_key(key))
    }

    fn resolve_url(&self, key: &str) -> String {
        format!("{SCHEME}{key}")
    }
}
