//! # Application State
//!
//! Shared state for the Axum application, passed to every handler through
//! the `State` extractor. The registry is the only mutable resource, and
//! the service and the monitor share it. With durable storage the registry
//! is opened over a [`JsonFileStore`] and hydrated before serving.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use holdcert_crypto::IntegrityProvider;
use holdcert_state::{CertificateRegistry, JsonFileStore, PersistenceError, RegistryError};
use holdcert_storage::{StorageError, StorageGateway};

use crate::collaborators::{Collaborators, InMemoryDirectory};
use crate::config::AppConfig;
use crate::monitor::{ExpiryMonitor, MonitorSettings};
use crate::notify::{LogNotifier, NotificationGateway};
use crate::orchestration::GenerationOrchestrator;
use crate::render::{ArtifactRenderer, PdfRenderer};
use crate::service::CertificateService;

/// Startup failed before the service could be assembled.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The artifact backend could not be opened.
    #[error("artifact storage: {0}")]
    Storage(#[from] StorageError),

    /// The certificate record directory could not be opened.
    #[error("certificate store: {0}")]
    Store(#[from] PersistenceError),

    /// Stored certificate records are inconsistent.
    #[error("registry hydration: {0}")]
    Hydration(#[from] RegistryError),
}

/// Source of "today" for expiry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    /// The current UTC date.
    #[default]
    System,
    /// A fixed date.
    Fixed(NaiveDate),
}

impl Clock {
    /// Today's date under this clock.
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::System => Utc::now().date_naive(),
            Self::Fixed(date) => *date,
        }
    }
}

/// The collaborators and backends a service instance is built from.
pub struct AppComponents {
    /// Certificate store.
    pub registry: CertificateRegistry,
    /// Client, investment and template lookups.
    pub collaborators: Collaborators,
    /// Artifact renderer.
    pub renderer: Arc<dyn ArtifactRenderer>,
    /// Hashing and signing.
    pub integrity: IntegrityProvider,
    /// Artifact storage.
    pub storage: Arc<dyn StorageGateway>,
    /// Outbound notifications.
    pub notifier: Arc<dyn NotificationGateway>,
    /// Expiry monitor behaviour.
    pub monitor: MonitorSettings,
}

/// Handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Certificate operations.
    pub service: Arc<CertificateService>,
    /// Expiry monitor.
    pub monitor: Arc<ExpiryMonitor>,
    /// Date source for expiry endpoints.
    pub clock: Clock,
}

impl AppState {
    /// Wire the service and monitor over shared components.
    pub fn new(components: AppComponents) -> Self {
        let AppComponents {
            registry,
            collaborators,
            renderer,
            integrity,
            storage,
            notifier,
            monitor,
        } = components;

        let orchestrator = Arc::new(GenerationOrchestrator::new(
            registry.clone(),
            collaborators.clone(),
            renderer,
            integrity.clone(),
            storage.clone(),
            notifier.clone(),
        ));
        let monitor = Arc::new(ExpiryMonitor::new(
            registry.clone(),
            collaborators.clone(),
            orchestrator.clone(),
            notifier.clone(),
            monitor,
        ));
        let service = Arc::new(CertificateService::new(
            registry,
            collaborators,
            orchestrator,
            integrity,
            storage,
            notifier,
        ));
        Self {
            service,
            monitor,
            clock: Clock::System,
        }
    }

    /// Build from configuration with the PDF renderer and log notifier.
    pub fn from_config(config: &AppConfig) -> Result<Self, BootstrapError> {
        let storage = config.storage.settings().build()?;
        tracing::info!(storage_mode = %storage.mode(), "artifact storage ready");
        let registry = match config.storage.registry_dir() {
            Some(dir) => {
                let registry = CertificateRegistry::open(Arc::new(JsonFileStore::open(&dir)?))?;
                tracing::info!(
                    dir = %dir.display(),
                    certificates = registry.len(),
                    "certificate registry hydrated"
                );
                registry
            }
            None => {
                tracing::warn!("no durable registry configured; certificates are kept in memory");
                CertificateRegistry::new()
            }
        };
        let directory = Arc::new(InMemoryDirectory::seeded(config.directory.clone()));
        Ok(Self::new(AppComponents {
            registry,
            collaborators: Collaborators::from_directory(directory),
            renderer: Arc::new(PdfRenderer),
            integrity: config.signing.integrity_provider(),
            storage,
            notifier: Arc::new(LogNotifier),
            monitor: config.monitor.settings.clone(),
        }))
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}
