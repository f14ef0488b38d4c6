//! # Service Configuration
//!
//! [`AppConfig`] is read from the YAML file named by `HOLDCERT_CONFIG` (all
//! sections optional) and then overlaid with environment variables:
//!
//! | Variable | Effect |
//! |---|---|
//! | `HOLDCERT_PORT` | listen port |
//! | `HOLDCERT_STORAGE_DIR` | durable storage root; unset means simulated storage |
//! | `HOLDCERT_STORAGE_BASE_URL` | public URL prefix for stored artifacts |
//! | `HOLDCERT_REGISTRY_DIR` | certificate records; defaults to `{storage dir}/registry` |
//! | `HOLDCERT_SIGNING_KEY_DIR` | directory of `{key_id}.key` seed files |
//! | `HOLDCERT_SIGNING_KEY_ID` | key id to load |
//! | `HOLDCERT_SIGNING_KEY_HEX` | Ed25519 seed, read when neither a YAML key nor a key dir is set |
//! | `HOLDCERT_MONITOR_RUN_AT` | daily run time, `HH:MM` UTC |
//! | `HOLDCERT_MONITOR_AUTO_EXPIRE` | `true` / `false` |
//! | `HOLDCERT_ADMIN_RECIPIENTS` | comma-separated report recipients |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use holdcert_crypto::{EnvKeyStore, FileKeyStore, IntegrityProvider, SecretSeed, StaticKeyStore};
use holdcert_storage::StorageSettings;

use crate::collaborators::DirectorySeed;
use crate::monitor::MonitorSettings;
use crate::scheduler::DailySchedule;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_PATH_VAR: &str = "HOLDCERT_CONFIG";

/// Environment variable holding the hex signing seed.
pub const SIGNING_KEY_VAR: &str = "HOLDCERT_SIGNING_KEY_HEX";

/// Configuration failed to load.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`AppConfig`].
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A configured value is unusable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// An environment override has an unusable value.
    #[error("invalid value for {var}: {reason}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// Artifact storage location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Durable storage root. `None` selects simulated storage.
    pub dir: Option<PathBuf>,
    /// Public URL prefix for stored objects.
    pub base_url: Option<String>,
    /// Certificate record directory. Defaults to `registry/` under `dir`.
    pub registry_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// The backend this configuration selects.
    pub fn settings(&self) -> StorageSettings {
        match &self.dir {
            Some(root) => StorageSettings::Remote {
                root: root.clone(),
                base_url: self.base_url.clone(),
            },
            None => StorageSettings::Simulated,
        }
    }

    /// Where certificate records persist. `None` keeps them in memory, which
    /// is only the case when artifacts are simulated as well.
    pub fn registry_dir(&self) -> Option<PathBuf> {
        self.registry_dir
            .clone()
            .or_else(|| self.dir.as_ref().map(|root| root.join("registry")))
    }
}

fn default_key_id() -> String {
    "holdcert-issuer".to_string()
}

/// Signing key source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Hex Ed25519 seed given inline.
    pub key_hex: Option<String>,
    /// Directory holding `{key_id}.key`.
    pub key_dir: Option<PathBuf>,
    /// Key to load.
    #[serde(default = "default_key_id")]
    pub key_id: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_hex: None,
            key_dir: None,
            key_id: default_key_id(),
        }
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "[REDACTED]"))
            .field("key_dir", &self.key_dir)
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl SigningConfig {
    /// Build the integrity provider. Missing or unusable key material
    /// selects fallback signing.
    pub fn integrity_provider(&self) -> IntegrityProvider {
        if let Some(hex) = &self.key_hex {
            return match SecretSeed::from_hex(&self.key_id, hex) {
                Ok(seed) => IntegrityProvider::from_key_store(
                    &StaticKeyStore::empty().with_key(self.key_id.clone(), seed),
                    &self.key_id,
                ),
                Err(e) => {
                    tracing::warn!(key_id = %self.key_id, error = %e, "configured signing key rejected; using fallback signatures");
                    IntegrityProvider::fallback_only()
                }
            };
        }
        match &self.key_dir {
            Some(dir) => IntegrityProvider::from_key_store(&FileKeyStore::new(dir), &self.key_id),
            None => IntegrityProvider::from_key_store(&EnvKeyStore::new(SIGNING_KEY_VAR), &self.key_id),
        }
    }
}

fn default_run_at() -> String {
    "08:00".to_string()
}

/// Expiry monitor and schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Monitor behaviour.
    #[serde(flatten)]
    pub settings: MonitorSettings,
    /// Daily run time, `HH:MM` UTC.
    #[serde(default = "default_run_at")]
    pub run_at: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settings: MonitorSettings::default(),
            run_at: default_run_at(),
        }
    }
}

impl MonitorConfig {
    /// The daily schedule.
    pub fn schedule(&self) -> Result<DailySchedule, ConfigError> {
        DailySchedule::parse(&self.run_at).map_err(|e| ConfigError::Invalid {
            field: "monitor.run_at",
            reason: e.to_string(),
        })
    }
}

fn default_port() -> u16 {
    8080
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Artifact storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Signing key source.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Expiry monitor.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Seed records for the in-memory client, investment and template
    /// directories.
    #[serde(default)]
    pub directory: DirectorySeed,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            storage: StorageConfig::default(),
            signing: SigningConfig::default(),
            monitor: MonitorConfig::default(),
            directory: DirectorySeed::default(),
        }
    }
}

impl AppConfig {
    /// Load from `HOLDCERT_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse a YAML file.
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Parse YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Overlay environment values. `get` looks a variable up.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |var: &str| get(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = get("HOLDCERT_PORT") {
            self.port = port.parse().map_err(|e| ConfigError::Env {
                var: "HOLDCERT_PORT",
                reason: format!("{e}"),
            })?;
        }
        if let Some(dir) = get("HOLDCERT_STORAGE_DIR") {
            self.storage.dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = get("HOLDCERT_STORAGE_BASE_URL") {
            self.storage.base_url = Some(url);
        }
        if let Some(dir) = get("HOLDCERT_REGISTRY_DIR") {
            self.storage.registry_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get("HOLDCERT_SIGNING_KEY_DIR") {
            self.signing.key_dir = Some(PathBuf::from(dir));
        }
        if let Some(id) = get("HOLDCERT_SIGNING_KEY_ID") {
            self.signing.key_id = id;
        }
        if let Some(at) = get("HOLDCERT_MONITOR_RUN_AT") {
            DailySchedule::parse(&at).map_err(|e| ConfigError::Env {
                var: "HOLDCERT_MONITOR_RUN_AT",
                reason: e.to_string(),
            })?;
            self.monitor.run_at = at;
        }
        if let Some(flag) = get("HOLDCERT_MONITOR_AUTO_EXPIRE") {
            self.monitor.settings.auto_expire = flag.parse().map_err(|_| ConfigError::Env {
                var: "HOLDCERT_MONITOR_AUTO_EXPIRE",
                reason: format!("expected true or false, got {flag:?}"),
            })?;
        }
        if let Some(list) = get("HOLDCERT_ADMIN_RECIPIENTS") {
            self.monitor.settings.admin_recipients = list
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }
}
