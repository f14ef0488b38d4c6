//! # Certificate Lifecycle
//!
//! ## States
//!
//! ```text
//!            generate            expire (monitor, expiry < today)
//! PENDING ────────────▶ ACTIVE ─────────────▶ EXPIRED
//!    │                  ▲  │ ▲                  │
//!    │   re-issue/renew └──┘ └──── renew ───────┘
//!    │                     │
//!    │   administrative    ▼
//!    └──────────────▶ INACTIVE ◀──── (EXPIRED, administrative)
//!
//! any non-terminal ──── revoke ────▶ REVOKED (terminal)
//! ```
//!
//! Every permitted move is one row of [`TRANSITION_TABLE`], keyed by the
//! operation that performs it. A move not in the table is rejected with
//! [`TransitionError::InvalidTransition`]; nothing is applied silently.
//!
//! Artifact metadata is a single `Option<ArtifactRecord>`: a certificate
//! either has all of location, size, hash and signature or none of them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use holdcert_core::{
    add_months, CertificateId, ClientId, DecimalAmount, InvestmentId, TemplateId, Timestamp,
    ValidationError,
};
use holdcert_crypto::{ArtifactSignature, SignatureMode};

use crate::number::CertificateNumber;

// ─── Classification ──────────────────────────────────────────────────

/// What kind of holding a certificate attests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateType {
    /// Share holding.
    Share,
    /// Generic investment holding.
    Investment,
    /// Fund units.
    Unit,
    /// Bond holding.
    Bond,
    /// Equity stake.
    Equity,
}

impl CertificateType {
    /// Every certificate type.
    pub const ALL: [Self; 5] = [
        Self::Share,
        Self::Investment,
        Self::Unit,
        Self::Bond,
        Self::Equity,
    ];

    /// Three-letter number prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Share => "SHR",
            Self::Investment => "INV",
            Self::Unit => "UNT",
            Self::Bond => "BND",
            Self::Equity => "EQT",
        }
    }

    /// Inverse of [`prefix`](Self::prefix).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }

    /// Wire name (`SHARE`, `BOND`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Share => "SHARE",
            Self::Investment => "INVESTMENT",
            Self::Unit => "UNIT",
            Self::Bond => "BOND",
            Self::Equity => "EQUITY",
        }
    }
}

impl std::fmt::Display for CertificateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertificateType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidField {
                field: "certificate_type",
                reason: format!("unknown certificate type {s:?}"),
            })
    }
}

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    /// Created, artifact not yet generated.
    Pending,
    /// Generated and in force.
    Active,
    /// Past its expiry date.
    Expired,
    /// Withdrawn by administrative action (terminal).
    Revoked,
    /// Administratively deactivated.
    Inactive,
}

impl CertificateStatus {
    /// Every status.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Active,
        Self::Expired,
        Self::Revoked,
        Self::Inactive,
    ];

    /// Whether no transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertificateStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidField {
                field: "status",
                reason: format!("unknown status {s:?}"),
            })
    }
}

// ─── Transition table ────────────────────────────────────────────────

/// The operation performing a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Artifact generation committed (first issue or re-issue).
    Generate,
    /// Expiry extended.
    Renew,
    /// Administrative revocation.
    Revoke,
    /// Expiry monitor marking a lapsed certificate.
    Expire,
    /// Administrative status correction.
    Administrative,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Generate => "generate",
            Self::Renew => "renew",
            Self::Revoke => "revoke",
            Self::Expire => "expire",
            Self::Administrative => "set_status",
        })
    }
}

use CertificateStatus::{Active, Expired, Inactive, Pending, Revoked};

/// Every permitted `(operation, from, to)` move.
pub const TRANSITION_TABLE: &[(TransitionKind, CertificateStatus, CertificateStatus)] = &[
    (TransitionKind::Generate, Pending, Active),
    (TransitionKind::Generate, Active, Active),
    (TransitionKind::Renew, Active, Active),
    (TransitionKind::Renew, Expired, Active),
    (TransitionKind::Revoke, Pending, Revoked),
    (TransitionKind::Revoke, Active, Revoked),
    (TransitionKind::Revoke, Expired, Revoked),
    (TransitionKind::Revoke, Inactive, Revoked),
    (TransitionKind::Expire, Active, Expired),
    (TransitionKind::Administrative, Active, Inactive),
    (TransitionKind::Administrative, Inactive, Active),
    (TransitionKind::Administrative, Pending, Inactive),
    (TransitionKind::Administrative, Expired, Inactive),
    (TransitionKind::Administrative, Active, Expired),
];

/// Whether `kind` may move a certificate from `from` to `to`.
pub fn is_permitted(kind: TransitionKind, from: CertificateStatus, to: CertificateStatus) -> bool {
    TRANSITION_TABLE
        .iter()
        .any(|&(k, f, t)| k == kind && f == from && t == to)
}

// ─── Errors ──────────────────────────────────────────────────────────

/// A lifecycle operation was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The move is not in the transition table.
    #[error("{operation} cannot move a certificate from {from} to {to}")]
    InvalidTransition {
        /// Operation attempted.
        operation: TransitionKind,
        /// Current status.
        from: CertificateStatus,
        /// Requested status.
        to: CertificateStatus,
    },

    /// The certificate is revoked.
    #[error("certificate is in terminal state {0}")]
    TerminalState(CertificateStatus),

    /// Expiry was requested before the expiry date passed.
    #[error("certificate expires on {expiry_date}; not overdue on {today}")]
    NotYetDue {
        /// Stored expiry date.
        expiry_date: NaiveDate,
        /// Evaluation date.
        today: NaiveDate,
    },

    /// Activation requested for a certificate that has never been generated.
    #[error("certificate has no generated artifact")]
    MissingArtifact,

    /// An argument was out of range.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ─── Audit ───────────────────────────────────────────────────────────

/// Who performed a transition, when, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvidence {
    /// Acting user or process.
    pub actor: String,
    /// When the transition is applied.
    pub at: Timestamp,
    /// Free-text reason.
    pub reason: Option<String>,
}

impl TransitionEvidence {
    /// Evidence for `actor` at the current time.
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            at: Timestamp::now(),
            reason: None,
        }
    }

    /// Attach a reason.
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = at;
        self
    }
}

/// One entry of a certificate's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Status before.
    pub from: CertificateStatus,
    /// Status after.
    pub to: CertificateStatus,
    /// Operation that performed it.
    pub kind: TransitionKind,
    /// When.
    pub at: Timestamp,
    /// Who.
    pub actor: String,
    /// Why, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ─── Records ─────────────────────────────────────────────────────────

/// Metadata of the last successfully generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Storage gateway key.
    pub storage_key: String,
    /// Resolved location returned by the gateway.
    pub location: String,
    /// Artifact size.
    pub size_bytes: u64,
    /// Hex SHA-256 of the artifact.
    pub content_hash: String,
    /// Stored signature string.
    pub signature: ArtifactSignature,
    /// Strategy that produced the signature.
    pub signature_mode: SignatureMode,
    /// Signing timestamp (part of the signed material).
    pub signed_at: Timestamp,
}

/// Input for a new certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    /// Certificate type.
    pub certificate_type: CertificateType,
    /// Linked investment.
    pub investment_id: InvestmentId,
    /// Holder.
    pub client_id: ClientId,
    /// Explicit template, if any.
    pub template_id: Option<TemplateId>,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Expiry date; must be after the issue date.
    pub expiry_date: NaiveDate,
    /// Invested amount snapshot.
    pub investment_amount: Option<DecimalAmount>,
    /// Number of shares or units held.
    pub number_of_shares: u64,
    /// Price per share at issuance.
    pub share_price: DecimalAmount,
}

impl NewCertificate {
    /// Field checks that do not need the registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.expiry_date <= self.issue_date {
            return Err(ValidationError::InvalidField {
                field: "expiry_date",
                reason: format!(
                    "expiry date {} must be after issue date {}",
                    self.expiry_date, self.issue_date
                ),
            });
        }
        if self.number_of_shares == 0 {
            return Err(ValidationError::InvalidField {
                field: "number_of_shares",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// A holding certificate with its lifecycle state and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Internal identifier.
    pub id: CertificateId,
    /// Globally unique number.
    pub certificate_number: CertificateNumber,
    /// Certificate type.
    pub certificate_type: CertificateType,
    /// Lifecycle status.
    pub status: CertificateStatus,
    /// Artifact version; increments on re-issuance.
    pub version: u32,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Expiry date.
    pub expiry_date: NaiveDate,
    /// Linked investment.
    pub investment_id: InvestmentId,
    /// Holder.
    pub client_id: ClientId,
    /// Template used for rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    /// Invested amount snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_amount: Option<DecimalAmount>,
    /// Shares or units held.
    pub number_of_shares: u64,
    /// Price per share at issuance.
    pub share_price: DecimalAmount,
    /// Last generated artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRecord>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Creator.
    pub created_by: String,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Last mutator.
    pub updated_by: String,
    /// Ordered status history.
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
}

impl Certificate {
    /// A new PENDING certificate.
    pub fn issue(
        id: CertificateId,
        certificate_number: CertificateNumber,
        draft: NewCertificate,
        evidence: &TransitionEvidence,
    ) -> Self {
        Self {
            id,
            certificate_number,
            certificate_type: draft.certificate_type,
            status: CertificateStatus::Pending,
            version: 1,
            issue_date: draft.issue_date,
            expiry_date: draft.expiry_date,
            investment_id: draft.investment_id,
            client_id: draft.client_id,
            template_id: draft.template_id,
            investment_amount: draft.investment_amount,
            number_of_shares: draft.number_of_shares,
            share_price: draft.share_price,
            artifact: None,
            created_at: evidence.at,
            created_by: evidence.actor.clone(),
            updated_at: evidence.at,
            updated_by: evidence.actor.clone(),
            transitions: Vec::new(),
        }
    }

    /// Version the next generated artifact will carry.
    pub fn next_artifact_version(&self) -> u32 {
        if self.artifact.is_some() {
            self.version + 1
        } else {
            self.version
        }
    }

    /// Record a generated artifact and activate (PENDING/ACTIVE → ACTIVE).
    pub fn commit_artifact(
        &mut self,
        artifact: ArtifactRecord,
        evidence: &TransitionEvidence,
    ) -> Result<(), TransitionError> {
        self.require(TransitionKind::Generate, Active)?;
        self.version = self.next_artifact_version();
        self.artifact = Some(artifact);
        self.do_transition(TransitionKind::Generate, Active, evidence);
        Ok(())
    }

    /// Extend expiry by `months` (ACTIVE/EXPIRED → ACTIVE).
    pub fn renew(
        &mut self,
        months: u32,
        evidence: &TransitionEvidence,
    ) -> Result<(), TransitionError> {
        if months == 0 {
            return Err(ValidationError::InvalidField {
                field: "extension_months",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        self.require(TransitionKind::Renew, Active)?;
        self.expiry_date = add_months(self.expiry_date, months)?;
        self.do_transition(TransitionKind::Renew, Active, evidence);
        Ok(())
    }

    /// Revoke permanently (any non-terminal → REVOKED).
    pub fn revoke(&mut self, evidence: &TransitionEvidence) -> Result<(), TransitionError> {
        self.require(TransitionKind::Revoke, Revoked)?;
        self.do_transition(TransitionKind::Revoke, Revoked, evidence);
        Ok(())
    }

    /// Mark a lapsed certificate expired (ACTIVE → EXPIRED, `expiry < today`).
    pub fn mark_expired(
        &mut self,
        today: NaiveDate,
        evidence: &TransitionEvidence,
    ) -> Result<(), TransitionError> {
        self.require(TransitionKind::Expire, Expired)?;
        if self.expiry_date >= today {
            return Err(TransitionError::NotYetDue {
                expiry_date: self.expiry_date,
                today,
            });
        }
        self.do_transition(TransitionKind::Expire, Expired, evidence);
        Ok(())
    }

    /// Administrative status correction.
    pub fn set_status(
        &mut self,
        to: CertificateStatus,
        evidence: &TransitionEvidence,
    ) -> Result<(), TransitionError> {
        self.require(TransitionKind::Administrative, to)?;
        if to == Active && self.artifact.is_none() {
            return Err(TransitionError::MissingArtifact);
        }
        self.do_transition(TransitionKind::Administrative, to, evidence);
        Ok(())
    }

    /// Whether the certificate is ACTIVE.
    pub fn is_active(&self) -> bool {
        self.status == Active
    }

    /// Days from `today` until expiry; negative once overdue.
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    fn require(
        &self,
        kind: TransitionKind,
        to: CertificateStatus,
    ) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::TerminalState(self.status));
        }
        if !is_permitted(kind, self.status, to) {
            return Err(TransitionError::InvalidTransition {
                operation: kind,
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn do_transition(
        &mut self,
        kind: TransitionKind,
        to: CertificateStatus,
        evidence: &TransitionEvidence,
    ) {
        self.transitions.push(TransitionRecord {
            from: self.status,
            to,
            kind,
            at: evidence.at,
            actor: evidence.actor.clone(),
            reason: evidence.reason.clone(),
        });
        self.status = to;
        self.updated_at = evidence.at;
        self.updated_by = evidence.actor.clone();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use holdcert_core::YearMonth;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn evidence() -> TransitionEvidence {
        TransitionEvidence::by("tester").at(Timestamp::parse("2026-01-10T12:00:00Z").unwrap())
    }

    fn draft() -> NewCertificate {
        NewCertificate {
            certificate_type: CertificateType::Share,
            investment_id: InvestmentId::new("I-1").unwrap(),
            client_id: ClientId::new("C-1").unwrap(),
            template_id: None,
            issue_date: date("2026-01-10"),
            expiry_date: date("2027-01-10"),
            investment_amount: Some(DecimalAmount::new("10000.00").unwrap()),
            number_of_shares: 100,
            share_price: DecimalAmount::new("100.00").unwrap(),
        }
    }

    fn pending() -> Certificate {
        let number = CertificateNumber::new(
            CertificateType::Share,
            YearMonth::parse("202601").unwrap(),
            1,
        )
        .unwrap();
        Certificate::issue(CertificateId::new(), number, draft(), &evidence())
    }

    fn artifact() -> ArtifactRecord {
        ArtifactRecord {
            storage_key: "certificates/C-1/SHR-202601-0001_v1.pdf".into(),
            location: "simulated://certificates/C-1/SHR-202601-0001_v1.pdf".into(),
            size_bytes: 1024,
            content_hash: "ab".repeat(32),
            signature: ArtifactSignature::from_stored("FALLBACK-SIG:00"),
            signature_mode: SignatureMode::Fallback,
            signed_at: evidence().at,
        }
    }

    fn active() -> Certificate {
        let mut c = pending();
        c.commit_artifact(artifact(), &evidence()).unwrap();
        c
    }

    #[test]
    fn type_prefixes_round_trip() {
        for t in CertificateType::ALL {
            assert_eq!(CertificateType::from_prefix(t.prefix()), Some(t));
            assert_eq!(t.as_str().parse::<CertificateType>().unwrap(), t);
        }
        assert!("WARRANT".parse::<CertificateType>().is_err());
    }

    #[test]
    fn new_certificate_is_pending_without_artifact() {
        let c = pending();
        assert_eq!(c.status, CertificateStatus::Pending);
        assert_eq!(c.version, 1);
        assert!(c.artifact.is_none());
        assert!(c.transitions.is_empty());
    }

    #[test]
    fn generation_activates_and_reissue_bumps_version() {
        let mut c = active();
        assert_eq!(c.status, CertificateStatus::Active);
        assert_eq!(c.version, 1);
        assert_eq!(c.next_artifact_version(), 2);
        c.commit_artifact(artifact(), &evidence()).unwrap();
        assert_eq!(c.version, 2);
        assert_eq!(c.transitions.len(), 2);
    }

    #[test]
    fn renew_from_expired_extends_by_months() {
        let mut c = active();
        c.mark_expired(date("2027-01-11"), &evidence()).unwrap();
        c.renew(12, &evidence()).unwrap();
        assert_eq!(c.status, CertificateStatus::Active);
        assert_eq!(c.expiry_date, date("2028-01-10"));
    }

    #[test]
    fn renew_rejects_pending_and_zero_months() {
        let mut c = pending();
        assert!(matches!(
            c.renew(6, &evidence()),
            Err(TransitionError::InvalidTransition { .. })
        ));
        let mut c = active();
        assert!(matches!(
            c.renew(0, &evidence()),
            Err(TransitionError::Validation(_))
        ));
    }

    #[test]
    fn revoke_is_terminal() {
        let mut c = active();
        c.revoke(&evidence().because("fraud")).unwrap();
        assert_eq!(c.status, CertificateStatus::Revoked);
        assert_eq!(c.transitions.last().unwrap().reason.as_deref(), Some("fraud"));
        assert_eq!(
            c.renew(12, &evidence()),
            Err(TransitionError::TerminalState(CertificateStatus::Revoked))
        );
        assert!(c.revoke(&evidence()).is_err());
        assert!(c.set_status(CertificateStatus::Active, &evidence()).is_err());
    }

    #[test]
    fn pending_can_be_revoked() {
        let mut c = pending();
        c.revoke(&evidence().because("entered in error")).unwrap();
        assert_eq!(c.status, CertificateStatus::Revoked);
    }

    #[test]
    fn mark_expired_requires_lapsed_expiry() {
        let mut c = active();
        assert!(matches!(
            c.mark_expired(date("2027-01-10"), &evidence()),
            Err(TransitionError::NotYetDue { .. })
        ));
        c.mark_expired(date("2027-01-11"), &evidence()).unwrap();
        assert_eq!(c.status, CertificateStatus::Expired);
        assert!(c.mark_expired(date("2027-01-12"), &evidence()).is_err());
    }

    #[test]
    fn set_status_follows_administrative_rows_only() {
        let mut c = active();
        c.set_status(CertificateStatus::Inactive, &evidence()).unwrap();
        c.set_status(CertificateStatus::Active, &evidence()).unwrap();
        assert!(c.set_status(CertificateStatus::Revoked, &evidence()).is_err());
        assert!(c.set_status(CertificateStatus::Pending, &evidence()).is_err());

        let mut p = pending();
        p.set_status(CertificateStatus::Inactive, &evidence()).unwrap();
        assert_eq!(
            p.set_status(CertificateStatus::Active, &evidence()),
            Err(TransitionError::MissingArtifact)
        );
    }

    #[test]
    fn table_has_no_exit_from_revoked() {
        assert!(TRANSITION_TABLE.iter().all(|&(_, from, _)| from != Revoked));
        assert!(TRANSITION_TABLE
            .iter()
            .all(|&(k, _, to)| to != Revoked || k == TransitionKind::Revoke));
    }

    #[test]
    fn draft_validation() {
        let mut d = draft();
        d.expiry_date = d.issue_date;
        assert!(d.validate().is_err());
        let mut d = draft();
        d.number_of_shares = 0;
        assert!(d.validate().is_err());
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn serializes_wire_names() {
        let json = serde_json::to_value(active()).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["certificate_type"], "SHARE");
        assert_eq!(json["certificate_number"], "SHR-202601-0001");
        assert_eq!(json["artifact"]["signature_mode"], "fallback");
        assert_eq!(json["transitions"][0]["kind"], "generate");
    }
}
