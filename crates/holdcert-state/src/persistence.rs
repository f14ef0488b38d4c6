//! # Certificate Persistence
//!
//! The registry keeps every certificate in memory for fast synchronous reads
//! and writes each committed record through to a [`CertificateStore`]. At
//! startup the registry is rebuilt from [`CertificateStore::load_all`], which
//! also resumes the number allocator above every number already issued.
//!
//! [`JsonFileStore`] keeps one `{id}.json` document per certificate in a
//! directory. Writes go to a `.partial` sibling and are renamed into place,
//! so a crash never leaves a truncated record behind.

use std::path::{Path, PathBuf};

use thiserror::Error;

use holdcert_core::CertificateId;

use crate::certificate::Certificate;

const RECORD_EXTENSION: &str = "json";

/// Persistence failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem access failed.
    #[error("certificate store I/O at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded.
    #[error("certificate record {path} is not valid: {source}")]
    Encoding {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Durable backing for the certificate registry.
pub trait CertificateStore: Send + Sync + std::fmt::Debug {
    /// Insert or replace one certificate.
    fn save(&self, certificate: &Certificate) -> Result<(), PersistenceError>;

    /// Every stored certificate, in no particular order.
    fn load_all(&self) -> Result<Vec<Certificate>, PersistenceError>;
}

/// One JSON document per certificate.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: CertificateId) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }
}

impl CertificateStore for JsonFileStore {
    fn save(&self, certificate: &Certificate) -> Result<(), PersistenceError> {
        let path = self.record_path(certificate.id);
        let bytes =
            serde_json::to_vec_pretty(certificate).map_err(|source| PersistenceError::Encoding {
                path: path.clone(),
                source,
            })?;
        let tmp = path.with_extension("json.partial");
        std::fs::write(&tmp, bytes).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })
    }

    fn load_all(&self) -> Result<Vec<Certificate>, PersistenceError> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PersistenceError::Io { path, source }
        };
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io(&self.dir))? {
            let path = entry.map_err(io(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(io(&path))?;
            let certificate =
                serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Encoding {
                    path: path.clone(),
                    source,
                })?;
            out.push(certificate);
        }
        Ok(out)
    }
}
