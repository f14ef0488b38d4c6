//! # holdcert-storage: Artifact Storage Gateway
//!
//! One [`StorageGateway`] trait, two backends:
//!
//! - [`FilesystemStorage`]: durable, rooted at a directory, with a JSON
//!   metadata sidecar per object.
//! - [`SimulatedStorage`]: in-memory, returns `simulated://` locations.
//!
//! The backend is selected once by [`StorageSettings::build`]. The generation
//! pipeline holds an `Arc<dyn StorageGateway>` and never asks which one it got.

pub mod error;
pub mod filesystem;
pub mod gateway;
pub mod simulated;

pub use error::StorageError;
pub use filesystem::{FilesystemStorage, ObjectRecord};
pub use gateway::{
    validate_key, ObjectMetadata, StorageGateway, StorageMode, StorageSettings, StoredObject,
};
pub use simulated::SimulatedStorage;
