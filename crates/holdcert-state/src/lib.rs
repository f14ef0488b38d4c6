//! # holdcert-state: Certificate Lifecycle and Registry
//!
//! - **Certificate** (`certificate.rs`): the record, its closed
//!   [`CertificateStatus`] type and the explicit [`TRANSITION_TABLE`]. Every
//!   lifecycle method checks the table before mutating and appends a
//!   [`TransitionRecord`].
//!
//! - **Numbers** (`number.rs`): `PREFIX-YYYYMM-NNNN` formatting and parsing,
//!   and the monotonic per-`(type, year-month)` [`NumberAllocator`].
//!
//! - **Registry** (`registry.rs`): the shared store. Each operation is one
//!   atomic read-validate-apply under a write lock, which is where the
//!   one-ACTIVE-per-investment and unique-number invariants hold.
//!
//! - **Persistence** (`persistence.rs`): the [`CertificateStore`] the
//!   registry writes through to, and the JSON-document [`JsonFileStore`].

pub mod certificate;
pub mod number;
pub mod persistence;
pub mod registry;

pub use certificate::{
    is_permitted, ArtifactRecord, Certificate, CertificateStatus, CertificateType,
    NewCertificate, TransitionError, TransitionEvidence, TransitionKind, TransitionRecord,
    TRANSITION_TABLE,
};
pub use number::{CertificateNumber, NumberAllocator, SequenceExhausted, MAX_SEQUENCE};
pub use persistence::{CertificateStore, JsonFileStore, PersistenceError};
pub use registry::{CertificateFilter, CertificateRegistry, RegistryError};
