//! # Certificate Registry
//!
//! The only shared mutable resource. Every mutation runs as one closure under
//! the registry write lock: read, validate, apply. A failed check leaves the
//! record untouched, and readers never observe a half-applied transition.
//!
//! Cross-record invariants enforced here:
//!
//! - At most one ACTIVE certificate per investment. Checked on `create` and on
//!   every move into ACTIVE (generation commit, renewal, reactivation).
//! - Certificate numbers are unique. They come from a monotonic
//!   [`NumberAllocator`] advanced under the same lock, and any collision with
//!   a stored number is reported as a conflict rather than retried.
//!
//! A registry opened over a [`CertificateStore`] writes each committed record
//! through before the in-memory copy changes, so a failed write leaves both
//! untouched. Opening loads every stored record and resumes the allocator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use thiserror::Error;

use holdcert_core::{CertificateId, ClientId, InvestmentId, ValidationError, YearMonth};

use crate::certificate::{
    ArtifactRecord, Certificate, CertificateStatus, NewCertificate, TransitionError,
    TransitionEvidence,
};
use crate::number::{CertificateNumber, NumberAllocator};
use crate::persistence::{CertificateStore, PersistenceError};

/// Errors from registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No certificate with this id.
    #[error("certificate {0} not found")]
    NotFound(CertificateId),

    /// A uniqueness invariant would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The lifecycle operation is not permitted.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The durable store rejected the write.
    #[error("persistence: {0}")]
    Persistence(String),
}

impl From<PersistenceError> for RegistryError {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e.to_string())
    }
}

/// Listing filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateFilter {
    /// Only this status.
    pub status: Option<CertificateStatus>,
    /// Only this holder.
    pub client_id: Option<ClientId>,
    /// Only this investment.
    pub investment_id: Option<InvestmentId>,
}

impl CertificateFilter {
    fn matches(&self, c: &Certificate) -> bool {
        self.status.map_or(true, |s| c.status == s)
            && self.client_id.as_ref().map_or(true, |id| &c.client_id == id)
            && self
                .investment_id
                .as_ref()
                .map_or(true, |id| &c.investment_id == id)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    certificates: HashMap<CertificateId, Certificate>,
    numbers: HashSet<CertificateNumber>,
    allocator: NumberAllocator,
}

impl RegistryInner {
    fn active_for_investment(
        &self,
        investment_id: &InvestmentId,
        except: Option<CertificateId>,
    ) -> Option<&Certificate> {
        self.certificates.values().find(|c| {
            c.is_active() && &c.investment_id == investment_id && Some(c.id) != except
        })
    }

    fn ensure_no_other_active(
        &self,
        investment_id: &InvestmentId,
        except: Option<CertificateId>,
    ) -> Result<(), RegistryError> {
        match self.active_for_investment(investment_id, except) {
            Some(existing) => Err(RegistryError::Conflict(format!(
                "investment {investment_id} already has active certificate {}",
                existing.certificate_number
            ))),
            None => Ok(()),
        }
    }
}

/// Certificate store with atomic per-operation transactions.
#[derive(Debug, Clone, Default)]
pub struct CertificateRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    store: Option<Arc<dyn CertificateStore>>,
}

impl CertificateRegistry {
    /// An empty, memory-only registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry backed by `store`, hydrated from everything it holds.
    pub fn open(store: Arc<dyn CertificateStore>) -> Result<Self, RegistryError> {
        let existing = store.load_all()?;
        let registry = Self {
            inner: Arc::default(),
            store: Some(store),
        };
        registry.hydrate(existing)?;
        Ok(registry)
    }

    /// Whether committed records survive a restart.
    pub fn is_durable(&self) -> bool {
        self.store.is_some()
    }

    fn persist(&self, certificate: &Certificate) -> Result<(), RegistryError> {
        if let Some(store) = &self.store {
            store.save(certificate).map_err(|e| {
                tracing::error!(
                    certificate_id = %certificate.id,
                    error = %e,
                    "certificate write-through failed"
                );
                RegistryError::from(e)
            })?;
        }
        Ok(())
    }

    /// Create a PENDING certificate, allocating its number in the year-month
    /// of `evidence.at`.
    pub fn create(
        &self,
        draft: NewCertificate,
        evidence: &TransitionEvidence,
    ) -> Result<Certificate, RegistryError> {
        draft.validate()?;
        let mut inner = self.inner.write();
        inner.ensure_no_other_active(&draft.investment_id, None)?;

        let period = YearMonth::of(evidence.at.date());
        let number = inner
            .allocator
            .allocate(draft.certificate_type, period)
            .map_err(|e| RegistryError::Conflict(e.to_string()))?;
        if inner.numbers.contains(&number) {
            return Err(RegistryError::Conflict(format!(
                "certificate number {number} already exists"
            )));
        }

        let certificate = Certificate::issue(CertificateId::new(), number, draft, evidence);
        self.persist(&certificate)?;
        inner.numbers.insert(number);
        inner
            .certificates
            .insert(certificate.id, certificate.clone());
        tracing::info!(
            certificate_id = %certificate.id,
            certificate_number = %number,
            investment_id = %certificate.investment_id,
            "certificate created"
        );
        Ok(certificate)
    }

    /// Fetch by id.
    pub fn get(&self, id: CertificateId) -> Result<Certificate, RegistryError> {
        self.inner
            .read()
            .certificates
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Fetch by number.
    pub fn find_by_number(&self, number: &CertificateNumber) -> Option<Certificate> {
        self.inner
            .read()
            .certificates
            .values()
            .find(|c| &c.certificate_number == number)
            .cloned()
    }

    /// All certificates matching `filter`, ordered by number.
    pub fn list(&self, filter: &CertificateFilter) -> Vec<Certificate> {
        self.select(|c| filter.matches(c))
    }

    /// All certificates satisfying `pred`, ordered by number.
    pub fn select(&self, pred: impl Fn(&Certificate) -> bool) -> Vec<Certificate> {
        let mut out: Vec<Certificate> = self
            .inner
            .read()
            .certificates
            .values()
            .filter(|c| pred(c))
            .cloned()
            .collect();
        out.sort_by_key(|c| c.certificate_number);
        out
    }

    /// ACTIVE certificates expiring exactly on `date`.
    pub fn active_expiring_on(&self, date: NaiveDate) -> Vec<Certificate> {
        self.select(|c| c.is_active() && c.expiry_date == date)
    }

    /// ACTIVE certificates whose expiry is before `today`.
    pub fn active_overdue(&self, today: NaiveDate) -> Vec<Certificate> {
        self.select(|c| c.is_active() && c.expiry_date < today)
    }

    /// ACTIVE certificates expiring in `today..=today + days`.
    pub fn active_expiring_within(&self, today: NaiveDate, days: u32) -> Vec<Certificate> {
        let horizon = today + chrono::Duration::days(i64::from(days));
        self.select(|c| c.is_active() && c.expiry_date >= today && c.expiry_date <= horizon)
    }

    /// Number of stored certificates.
    pub fn len(&self) -> usize {
        self.inner.read().certificates.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a generated artifact and activate.
    pub fn commit_artifact(
        &self,
        id: CertificateId,
        artifact: ArtifactRecord,
        evidence: &TransitionEvidence,
    ) -> Result<Certificate, RegistryError> {
        self.transact(id, |inner, c| {
            inner.ensure_no_other_active(&c.investment_id, Some(c.id))?;
            c.commit_artifact(artifact, evidence)?;
            Ok(())
        })
    }

    /// Extend expiry by `months` and (re)activate.
    pub fn renew(
        &self,
        id: CertificateId,
        months: u32,
        evidence: &TransitionEvidence,
    ) -> Result<Certificate, RegistryError> {
        self.transact(id, |inner, c| {
            inner.ensure_no_other_active(&c.investment_id, Some(c.id))?;
            c.renew(months, evidence)?;
            Ok(())
        })
    }

    /// Revoke permanently.
    pub fn revoke(
        &self,
        id: CertificateId,
        evidence: &TransitionEvidence,
    ) -> Result<Certificate, RegistryError> {
        self.transact(id, |_, c| Ok(c.revoke(evidence)?))
    }

    /// Mark a lapsed ACTIVE certificate expired.
    pub fn mark_expired(
        &self,
        id: CertificateId,
        today: NaiveDate,
        evidence: &TransitionEvidence,
    ) -> Result<Certificate, RegistryError> {
        self.transact(id, |_, c| Ok(c.mark_expired(today, evidence)?))
    }

    /// Administrative status change.
    pub fn set_status(
        &self,
        id: CertificateId,
        status: CertificateStatus,
        evidence: &TransitionEvidence,
    ) -> Result<Certificate, RegistryError> {
        self.transact(id, |inner, c| {
            if status == CertificateStatus::Active {
                inner.ensure_no_other_active(&c.investment_id, Some(c.id))?;
            }
            c.set_status(status, evidence)?;
            Ok(())
        })
    }

    /// Load existing certificates into memory. Rejects the whole batch if
    /// any record duplicates an id or number, or would break the one-ACTIVE
    /// rule. Records are not written back to the store.
    pub fn hydrate(
        &self,
        certificates: impl IntoIterator<Item = Certificate>,
    ) -> Result<usize, RegistryError> {
        let mut inner = self.inner.write();
        let mut staged_ids = HashSet::new();
        let mut staged_numbers = HashSet::new();
        let mut staged_active = HashSet::new();
        let batch: Vec<Certificate> = certificates.into_iter().collect();

        for c in &batch {
            if inner.certificates.contains_key(&c.id) || !staged_ids.insert(c.id) {
                return Err(RegistryError::Conflict(format!("duplicate certificate id {}", c.id)));
            }
            if inner.numbers.contains(&c.certificate_number)
                || !staged_numbers.insert(c.certificate_number)
            {
                return Err(RegistryError::Conflict(format!(
                    "duplicate certificate number {}",
                    c.certificate_number
                )));
            }
            if c.is_active() {
                inner.ensure_no_other_active(&c.investment_id, None)?;
                if !staged_active.insert(c.investment_id.clone()) {
                    return Err(RegistryError::Conflict(format!(
                        "investment {} has more than one active certificate",
                        c.investment_id
                    )));
                }
            }
        }

        let count = batch.len();
        for c in batch {
            inner.allocator.observe(&c.certificate_number);
            inner.numbers.insert(c.certificate_number);
            inner.certificates.insert(c.id, c);
        }
        tracing::info!(count, "registry hydrated");
        Ok(count)
    }

    /// Run `f` on one record under the write lock. The record is replaced
    /// only if `f` succeeds and the write-through does too.
    fn transact(
        &self,
        id: CertificateId,
        f: impl FnOnce(&RegistryInner, &mut Certificate) -> Result<(), RegistryError>,
    ) -> Result<Certificate, RegistryError> {
        let mut inner = self.inner.write();
        let mut working = inner
            .certificates
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))?;
        let before = working.status;
        f(&inner, &mut working)?;
        self.persist(&working)?;
        tracing::info!(
            certificate_id = %id,
            certificate_number = %working.certificate_number,
            from = %before,
            to = %working.status,
            "certificate transition committed"
        );
        inner.certificates.insert(id, working.clone());
        Ok(working)
    }
}
