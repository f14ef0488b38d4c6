//! # holdcert-core: Foundational Types for Holding Certificates
//!
//! The leaf of the workspace DAG. Every other `holdcert-*` crate depends on
//! this one; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `CertificateId`, `ClientId`, `InvestmentId`,
//!    `TemplateId` are distinct types. You cannot hand a client id to an
//!    investment lookup.
//!
//! 2. **`CanonicalBytes` for structured payloads.** Anything that is signed
//!    (the signing envelope over an artifact) is serialized through
//!    `CanonicalBytes::new()` so every signer and verifier sees the same bytes.
//!
//! 3. **Artifact digests over raw bytes.** A rendered certificate is opaque
//!    content; its digest is `sha256_bytes()` over exactly the stored bytes.
//!
//! 4. **UTC-only timestamps, calendar dates for expiry.** `Timestamp` carries
//!    instants; certificate issue/expiry use `chrono::NaiveDate` with the
//!    month arithmetic in [`temporal::add_months`].
//!
//! 5. **No floats for money.** `DecimalAmount` is a validated decimal string.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use amount::DecimalAmount;
pub use canonical::CanonicalBytes;
pub use digest::{sha256_bytes, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{CertificateId, ClientId, InvestmentId, TemplateId};
pub use temporal::{add_months, Timestamp, YearMonth};
