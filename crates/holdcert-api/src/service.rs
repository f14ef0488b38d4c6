//! # Certificate Service
//!
//! The operations behind `/v1/certificates`: create, lookup, generation
//! (single and batch), revoke, renew, administrative status changes,
//! verification and artifact download.
//!
//! Every mutation goes through one [`CertificateRegistry`] transaction.
//! Notifications are sent only after the transaction commits, through
//! [`notify_best_effort`], so their outcome never reaches the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use holdcert_core::{
    CertificateId, ClientId, DecimalAmount, InvestmentId, TemplateId, Timestamp, ValidationError,
};
use holdcert_crypto::{IntegrityProvider, SignatureMode};
use holdcert_state::{
    Certificate, CertificateFilter, CertificateRegistry, CertificateStatus, CertificateType,
    NewCertificate, TransitionEvidence,
};
use holdcert_storage::StorageGateway;

use crate::collaborators::Collaborators;
use crate::error::ServiceError;
use crate::notify::{notify_best_effort, NotificationGateway, NotificationKind};
use crate::orchestration::{GenerationOrchestrator, GenerationResult};

fn default_true() -> bool {
    true
}

/// Input for [`CertificateService::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCertificateRequest {
    /// Holding the certificate attests to.
    pub investment_id: InvestmentId,
    /// Holder; must own the investment.
    pub client_id: ClientId,
    /// Certificate type.
    pub certificate_type: CertificateType,
    /// Explicit template; otherwise the type default applies at render time.
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    /// Defaults to today.
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    /// Must be after the issue date.
    pub expiry_date: NaiveDate,
    /// Defaults to the investment's recorded amount.
    #[serde(default)]
    pub investment_amount: Option<DecimalAmount>,
    /// Shares or units held.
    pub number_of_shares: u64,
    /// Price per share.
    pub share_price: DecimalAmount,
    /// Run the generation pipeline right after creation.
    #[serde(default)]
    pub generate_immediately: bool,
    /// Send the "generated" notification when generating immediately.
    #[serde(default = "default_true")]
    pub send_notification: bool,
}

/// A created certificate and, when requested, its generation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCertificate {
    /// The certificate as stored after creation (and generation, if run).
    pub certificate: Certificate,
    /// Pipeline outcome, when `generate_immediately` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationResult>,
}

/// Result of re-checking a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Certificate checked.
    pub certificate_id: CertificateId,
    /// Its number.
    pub certificate_number: String,
    /// ACTIVE, and the stored artifact matches its hash and signature.
    pub is_valid: bool,
    /// Current status.
    pub status: CertificateStatus,
    /// When the check ran.
    pub verified_at: Timestamp,
    /// The re-downloaded bytes hash to the recorded digest.
    pub integrity_ok: bool,
    /// The recorded signature verifies over the re-downloaded bytes in the
    /// provider's own mode.
    pub signature_valid: bool,
    /// The signature is a verified Ed25519 signature, not a fallback tag.
    pub cryptographically_valid: bool,
    /// Strategy that produced the recorded signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_mode: Option<SignatureMode>,
}

/// Downloaded artifact bytes plus response metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDownload {
    /// Artifact bytes.
    pub bytes: Vec<u8>,
    /// MIME type.
    pub content_type: &'static str,
    /// Suggested file name, derived from the certificate number.
    pub filename: String,
}

/// Verification key and active signing mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// Mode new signatures are produced in.
    pub mode: SignatureMode,
    /// Hex Ed25519 verification key; absent in fallback mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
}

/// Certificate lifecycle operations.
pub struct CertificateService {
    registry: CertificateRegistry,
    collaborators: Collaborators,
    orchestrator: Arc<GenerationOrchestrator>,
    integrity: IntegrityProvider,
    storage: Arc<dyn StorageGateway>,
    notifier: Arc<dyn NotificationGateway>,
}

impl std::fmt::Debug for CertificateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateService")
            .field("certificates", &self.registry.len())
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl CertificateService {
    /// Wire the service. `orchestrator` must share `registry` and `storage`.
    pub fn new(
        registry: CertificateRegistry,
        collaborators: Collaborators,
        orchestrator: Arc<GenerationOrchestrator>,
        integrity: IntegrityProvider,
        storage: Arc<dyn StorageGateway>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            registry,
            collaborators,
            orchestrator,
            integrity,
            storage,
            notifier,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &CertificateRegistry {
        &self.registry
    }

    /// Create a PENDING certificate, optionally generating it right away.
    pub fn create(
        &self,
        request: CreateCertificateRequest,
        actor: &str,
    ) -> Result<CreatedCertificate, ServiceError> {
        let client = self
            .collaborators
            .clients
            .client(&request.client_id)
            .ok_or_else(|| ServiceError::NotFound(format!("client {} not found", request.client_id)))?;
        let investment = self
            .collaborators
            .investments
            .investment(&request.investment_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("investment {} not found", request.investment_id))
            })?;
        if investment.client_id != client.id {
            return Err(ValidationError::InvalidField {
                field: "client_id",
                reason: format!(
                    "investment {} belongs to client {}",
                    investment.id, investment.client_id
                ),
            }
            .into());
        }
        if let Some(tid) = &request.template_id {
            if self.collaborators.templates.template(tid).is_none() {
                return Err(ServiceError::NotFound(format!("template {tid} not found")));
            }
        }

        let evidence = TransitionEvidence::by(actor);
        let draft = NewCertificate {
            certificate_type: request.certificate_type,
            investment_id: request.investment_id,
            client_id: request.client_id,
            template_id: request.template_id,
            issue_date: request.issue_date.unwrap_or_else(|| evidence.at.date()),
            expiry_date: request.expiry_date,
            investment_amount: request.investment_amount.or(investment.amount),
            number_of_shares: request.number_of_shares,
            share_price: request.share_price,
        };
        let certificate = self.registry.create(draft, &evidence)?;

        if !request.generate_immediately {
            return Ok(CreatedCertificate {
                certificate,
                generation: None,
            });
        }
        let generation = self
            .orchestrator
            .generate_with(certificate.id, actor, request.send_notification);
        Ok(CreatedCertificate {
            certificate: self.registry.get(certificate.id)?,
            generation: Some(generation),
        })
    }

    /// Fetch one certificate.
    pub fn get(&self, id: CertificateId) -> Result<Certificate, ServiceError> {
        Ok(self.registry.get(id)?)
    }

    /// Certificates matching `filter`, ordered by number.
    pub fn list(&self, filter: &CertificateFilter) -> Vec<Certificate> {
        self.registry.list(filter)
    }

    /// Run the pipeline for an existing certificate.
    pub fn generate(&self, id: CertificateId, actor: &str) -> Result<GenerationResult, ServiceError> {
        self.registry.get(id)?;
        Ok(self.orchestrator.generate(id, actor))
    }

    /// Run the pipeline for each id; failures are reported per item.
    pub fn batch_generate(
        &self,
        ids: &[CertificateId],
        actor: &str,
    ) -> BTreeMap<String, GenerationResult> {
        self.orchestrator.batch_generate(ids, actor)
    }

    /// Revoke permanently and tell the holder.
    pub fn revoke(
        &self,
        id: CertificateId,
        reason: &str,
        actor: &str,
    ) -> Result<Certificate, ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "reason",
                reason: "must not be empty".into(),
            }
            .into());
        }
        let revoked = self
            .registry
            .revoke(id, &TransitionEvidence::by(actor).because(reason))?;
        tracing::info!(
            certificate_number = %revoked.certificate_number,
            actor,
            reason,
            "certificate revoked"
        );
        self.notify_revoked(&revoked, reason);
        Ok(revoked)
    }

    /// Extend expiry by `months` and reactivate. Does not regenerate.
    pub fn renew(
        &self,
        id: CertificateId,
        months: u32,
        actor: &str,
    ) -> Result<Certificate, ServiceError> {
        let evidence = TransitionEvidence::by(actor).because(format!("renewed for {months} months"));
        let renewed = self.registry.renew(id, months, &evidence)?;
        tracing::info!(
            certificate_number = %renewed.certificate_number,
            expiry_date = %renewed.expiry_date,
            "certificate renewed"
        );
        Ok(renewed)
    }

    /// Administrative status change, validated against the transition table.
    pub fn set_status(
        &self,
        id: CertificateId,
        status: CertificateStatus,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<Certificate, ServiceError> {
        let mut evidence = TransitionEvidence::by(actor);
        if let Some(r) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            evidence = evidence.because(r);
        }
        Ok(self.registry.set_status(id, status, &evidence)?)
    }

    /// Re-download the artifact and check it against the recorded hash and
    /// signature.
    pub fn verify(&self, id: CertificateId) -> Result<VerificationReport, ServiceError> {
        let certificate = self.registry.get(id)?;
        let number = certificate.certificate_number.to_string();
        let (integrity_ok, signature_valid, signature_mode) = match &certificate.artifact {
            None => (false, false, None),
            Some(artifact) => match self.storage.download(&artifact.storage_key) {
                Ok(bytes) => (
                    self.integrity
                        .verify_integrity(&bytes, &artifact.content_hash),
                    self.integrity
                        .verify(&bytes, &number, artifact.signed_at, &artifact.signature),
                    Some(artifact.signature_mode),
                ),
                Err(e) => {
                    tracing::warn!(
                        certificate_number = %number,
                        key = %artifact.storage_key,
                        error = %e,
                        "artifact unavailable for verification"
                    );
                    (false, false, Some(artifact.signature_mode))
                }
            },
        };
        let is_valid = certificate.is_active() && integrity_ok && signature_valid;
        let cryptographically_valid = signature_valid && self.integrity.mode().is_cryptographic();
        Ok(VerificationReport {
            certificate_id: certificate.id,
            certificate_number: number,
            is_valid,
            status: certificate.status,
            verified_at: Timestamp::now(),
            integrity_ok,
            signature_valid,
            cryptographically_valid,
            signature_mode,
        })
    }

    /// Stored artifact bytes for download.
    pub fn download(&self, id: CertificateId) -> Result<ArtifactDownload, ServiceError> {
        let certificate = self.registry.get(id)?;
        let artifact = certificate.artifact.as_ref().ok_or_else(|| {
            ServiceError::NotFound(format!(
                "certificate {} has no stored artifact",
                certificate.certificate_number
            ))
        })?;
        let bytes = self.storage.download(&artifact.storage_key)?;
        Ok(ArtifactDownload {
            bytes,
            content_type: self.orchestrator.content_type(),
            filename: format!(
                "{}.{}",
                certificate.certificate_number,
                self.orchestrator.extension()
            ),
        })
    }

    /// The verification key for signatures produced by this service.
    pub fn public_key(&self) -> PublicKeyInfo {
        PublicKeyInfo {
            mode: self.integrity.mode(),
            public_key_hex: self.integrity.public_key().map(|k| k.to_hex()),
        }
    }

    fn notify_revoked(&self, certificate: &Certificate, reason: &str) {
        let Some(client) = self.collaborators.clients.client(&certificate.client_id) else {
            tracing::warn!(client_id = %certificate.client_id, "no client record; revocation notice not sent");
            return;
        };
        let subject = format!("Certificate {} has been revoked", certificate.certificate_number);
        let body = format!(
            "Dear {},\n\nYour certificate {} has been revoked.\nReason: {reason}\n",
            client.display_name, certificate.certificate_number
        );
        notify_best_effort(
            self.notifier.as_ref(),
            NotificationKind::Revoked,
            &client.email,
            &subject,
            &body,
        );
    }
}
