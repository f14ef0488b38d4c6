//! # Generation Orchestrator
//!
//! Runs the artifact pipeline for one certificate, strictly in order:
//!
//! ```text
//! Render → Hash → Sign → Store → Commit → Notify
//! ```
//!
//! Nothing is written to the registry before Commit, so a failure at any
//! earlier stage leaves the certificate exactly as it was. A Commit failure
//! removes the object uploaded in the Store stage on a best-effort basis.
//! Notify failures are logged and do not change the result.
//!
//! [`GenerationOrchestrator::generate`] never returns an error: the outcome is
//! always a [`GenerationResult`]. Batches run items one after another, and an
//! item's failure is recorded in its own entry only.
//!
//! At most one run per certificate is in flight. A second request for the
//! same certificate fails at Prepare instead of racing the first one to
//! Commit.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use holdcert_core::{CertificateId, Timestamp};
use holdcert_crypto::{IntegrityProvider, SignatureMode};
use holdcert_state::{
    is_permitted, ArtifactRecord, Certificate, CertificateRegistry, CertificateStatus,
    TransitionEvidence, TransitionKind,
};
use holdcert_storage::{ObjectMetadata, StorageGateway};

use crate::collaborators::Collaborators;
use crate::notify::{notify_best_effort, NotificationGateway, NotificationKind};
use crate::render::{ArtifactRenderer, RenderContext};

/// Pipeline stage, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Loading the certificate and its linked records.
    Prepare,
    /// Producing artifact bytes.
    Render,
    /// Signing.
    Sign,
    /// Uploading.
    Store,
    /// Updating the registry.
    Commit,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Prepare => "prepare",
            Self::Render => "render",
            Self::Sign => "sign",
            Self::Store => "store",
            Self::Commit => "commit",
        })
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Whether the certificate now carries the new artifact.
    pub success: bool,
    /// Certificate the run was for.
    pub certificate_id: CertificateId,
    /// Its number, when the certificate could be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
    /// Storage location of the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Artifact size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Hex SHA-256 of the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Stored signature string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Strategy that signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_mode: Option<SignatureMode>,
    /// Stage that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl GenerationResult {
    fn succeeded(certificate: &Certificate, artifact: &ArtifactRecord) -> Self {
        Self {
            success: true,
            certificate_id: certificate.id,
            certificate_number: Some(certificate.certificate_number.to_string()),
            location: Some(artifact.location.clone()),
            size: Some(artifact.size_bytes),
            hash: Some(artifact.content_hash.clone()),
            signature: Some(artifact.signature.to_string()),
            signature_mode: Some(artifact.signature_mode),
            failed_stage: None,
            error_message: None,
        }
    }

    fn failed(id: CertificateId, number: Option<String>, failure: StageFailure) -> Self {
        Self {
            success: false,
            certificate_id: id,
            certificate_number: number,
            location: None,
            size: None,
            hash: None,
            signature: None,
            signature_mode: None,
            failed_stage: Some(failure.stage),
            error_message: Some(failure.message),
        }
    }
}

struct StageFailure {
    stage: PipelineStage,
    message: String,
}

impl StageFailure {
    fn at(stage: PipelineStage, message: impl std::fmt::Display) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

/// Coordinates rendering, signing, storage and the registry.
pub struct GenerationOrchestrator {
    registry: CertificateRegistry,
    collaborators: Collaborators,
    renderer: Arc<dyn ArtifactRenderer>,
    integrity: IntegrityProvider,
    storage: Arc<dyn StorageGateway>,
    notifier: Arc<dyn NotificationGateway>,
    in_flight: Mutex<HashSet<CertificateId>>,
}

/// Claim on one certificate's pipeline; released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<CertificateId>>,
    id: CertificateId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("signing_mode", &self.integrity.mode())
            .field("storage_mode", &self.storage.mode())
            .finish_non_exhaustive()
    }
}

/// Storage key segment built from an external id.
fn key_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

impl GenerationOrchestrator {
    /// Wire the pipeline.
    pub fn new(
        registry: CertificateRegistry,
        collaborators: Collaborators,
        renderer: Arc<dyn ArtifactRenderer>,
        integrity: IntegrityProvider,
        storage: Arc<dyn StorageGateway>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            registry,
            collaborators,
            renderer,
            integrity,
            storage,
            notifier,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, id: CertificateId) -> Option<InFlight<'_>> {
        self.in_flight.lock().insert(id).then(|| InFlight {
            set: &self.in_flight,
            id,
        })
    }

    /// MIME type of produced artifacts.
    pub fn content_type(&self) -> &'static str {
        self.renderer.content_type()
    }

    /// File extension of produced artifacts.
    pub fn extension(&self) -> &'static str {
        self.renderer.extension()
    }

    /// Run the pipeline for one certificate and notify the holder.
    pub fn generate(&self, id: CertificateId, actor: &str) -> GenerationResult {
        self.generate_with(id, actor, true)
    }

    /// Run the pipeline; `notify` controls the "generated" message.
    pub fn generate_with(&self, id: CertificateId, actor: &str, notify: bool) -> GenerationResult {
        let Some(_claim) = self.claim(id) else {
            let number = self
                .registry
                .get(id)
                .ok()
                .map(|c| c.certificate_number.to_string());
            return self.record_failure(
                id,
                number,
                StageFailure::at(PipelineStage::Prepare, "generation already in progress"),
            );
        };
        let certificate = match self.registry.get(id) {
            Ok(c) => c,
            Err(e) => {
                return self.record_failure(id, None, StageFailure::at(PipelineStage::Prepare, e))
            }
        };
        let number = certificate.certificate_number.to_string();

        match self.run(&certificate, actor) {
            Ok((committed, artifact)) => {
                metrics::counter!("holdcert_generations_total", "outcome" => "success")
                    .increment(1);
                tracing::info!(
                    certificate_id = %id,
                    certificate_number = %number,
                    version = committed.version,
                    signature_mode = %artifact.signature_mode,
                    "certificate generated"
                );
                if notify {
                    self.notify_generated(&committed);
                }
                GenerationResult::succeeded(&committed, &artifact)
            }
            Err(failure) => self.record_failure(id, Some(number), failure),
        }
    }

    /// Run the pipeline for each id in order. Keys are certificate numbers,
    /// or the raw id when the certificate could not be loaded.
    pub fn batch_generate(
        &self,
        ids: &[CertificateId],
        actor: &str,
    ) -> BTreeMap<String, GenerationResult> {
        let mut results = BTreeMap::new();
        for &id in ids {
            let result = self.generate(id, actor);
            let key = result
                .certificate_number
                .clone()
                .unwrap_or_else(|| id.to_string());
            results.insert(key, result);
        }
        let failed = results.values().filter(|r| !r.success).count();
        tracing::info!(total = results.len(), failed, "batch generation finished");
        results
    }

    fn record_failure(
        &self,
        id: CertificateId,
        number: Option<String>,
        failure: StageFailure,
    ) -> GenerationResult {
        metrics::counter!("holdcert_generations_total", "outcome" => "failure").increment(1);
        tracing::warn!(
            certificate_id = %id,
            stage = %failure.stage,
            error = %failure.message,
            "certificate generation failed"
        );
        GenerationResult::failed(id, number, failure)
    }

    fn run(
        &self,
        certificate: &Certificate,
        actor: &str,
    ) -> Result<(Certificate, ArtifactRecord), StageFailure> {
        use PipelineStage::*;

        if !is_permitted(TransitionKind::Generate, certificate.status, CertificateStatus::Active) {
            return Err(StageFailure::at(
                Prepare,
                format!("cannot generate a certificate in status {}", certificate.status),
            ));
        }
        let client = self
            .collaborators
            .clients
            .client(&certificate.client_id)
            .ok_or_else(|| {
                StageFailure::at(Prepare, format!("client {} not found", certificate.client_id))
            })?;
        let investment = self
            .collaborators
            .investments
            .investment(&certificate.investment_id)
            .ok_or_else(|| {
                StageFailure::at(
                    Prepare,
                    format!("investment {} not found", certificate.investment_id),
                )
            })?;
        let template = match &certificate.template_id {
            Some(tid) => Some(self.collaborators.templates.template(tid).ok_or_else(|| {
                StageFailure::at(Prepare, format!("template {tid} not found"))
            })?),
            None => self
                .collaborators
                .templates
                .default_for(certificate.certificate_type),
        };
        let version = certificate.next_artifact_version();

        // Render
        let bytes = self
            .renderer
            .render(&RenderContext {
                certificate,
                version,
                client: &client,
                investment: &investment,
                template: template.as_ref(),
            })
            .map_err(|e| StageFailure::at(Render, e))?;

        // Hash
        let content_hash = self.integrity.hash(&bytes).to_hex();

        // Sign
        let signed_at = Timestamp::now();
        let number = certificate.certificate_number.to_string();
        let signed = self
            .integrity
            .sign(&bytes, &number, signed_at)
            .map_err(|e| StageFailure::at(Sign, e))?;

        // Store
        let key = format!(
            "certificates/{}/{}/{number}_v{version}.{}",
            key_segment(certificate.client_id.as_str()),
            certificate.id,
            self.renderer.extension()
        );
        let metadata = ObjectMetadata {
            certificate_number: number.clone(),
            client_id: certificate.client_id.to_string(),
            certificate_type: certificate.certificate_type.to_string(),
            hash: content_hash.clone(),
            signature: signed.signature.to_string(),
        };
        let stored = self
            .storage
            .upload(&key, &bytes, self.renderer.content_type(), &metadata)
            .map_err(|e| StageFailure::at(Store, e))?;

        // Commit
        let artifact = ArtifactRecord {
            storage_key: stored.key.clone(),
            location: stored.location,
            size_bytes: stored.size,
            content_hash,
            signature: signed.signature,
            signature_mode: signed.mode,
            signed_at,
        };
        let evidence = TransitionEvidence::by(actor).because(format!("artifact v{version}"));
        match self
            .registry
            .commit_artifact(certificate.id, artifact.clone(), &evidence)
        {
            Ok(committed) => Ok((committed, artifact)),
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored.key) {
                    tracing::warn!(key = %stored.key, error = %cleanup, "orphaned artifact not removed");
                }
                Err(StageFailure::at(Commit, e))
            }
        }
    }

    fn notify_generated(&self, certificate: &Certificate) {
        let Some(client) = self.collaborators.clients.client(&certificate.client_id) else {
            tracing::warn!(client_id = %certificate.client_id, "no client record; generated notice not sent");
            return;
        };
        let subject = format!("Your certificate {} is ready", certificate.certificate_number);
        let body = format!(
            "Dear {},\n\nYour {} certificate {} (version {}) has been issued and is valid until {}.\n",
            client.display_name,
            certificate.certificate_type,
            certificate.certificate_number,
            certificate.version,
            certificate.expiry_date
        );
        notify_best_effort(
            self.notifier.as_ref(),
            NotificationKind::Generated,
            &client.email,
            &subject,
            &body,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ClientRecord, InMemoryDirectory, InvestmentRecord};
    use crate::notify::RecordingNotifier;
    use crate::render::{PdfRenderer, RenderError};
    use chrono::NaiveDate;
    use holdcert_core::{ClientId, DecimalAmount, InvestmentId, TemplateId};
    use holdcert_state::{CertificateType, NewCertificate};
    use holdcert_storage::{SimulatedStorage, StorageError, StorageMode, StoredObject};

    struct BrokenRenderer;

    impl ArtifactRenderer for BrokenRenderer {
        fn content_type(&self) -> &'static str {
            "application/pdf"
        }
        fn extension(&self) -> &'static str {
            "pdf"
        }
        fn render(&self, _: &RenderContext<'_>) -> Result<Vec<u8>, RenderError> {
            Err(RenderError("font missing".into()))
        }
    }

    struct RejectingStorage;

    impl StorageGateway for RejectingStorage {
        fn mode(&self) -> StorageMode {
            StorageMode::Remote
        }
        fn upload(
            &self,
            key: &str,
            _: &[u8],
            _: &str,
            _: &ObjectMetadata,
        ) -> Result<StoredObject, StorageError> {
            Err(StorageError::Io {
                key: key.into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }
        fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound(key.into()))
        }
        fn delete(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::NotFound(key.into()))
        }
        fn exists(&self, _: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
        fn resolve_url(&self, key: &str) -> String {
            key.into()
        }
    }

    struct Fixture {
        registry: CertificateRegistry,
        notifier: Arc<RecordingNotifier>,
        storage: Arc<SimulatedStorage>,
        collaborators: Collaborators,
    }

    fn fixture() -> Fixture {
        let dir = InMemoryDirectory::new();
        dir.put_client(ClientRecord {
            id: ClientId::new("C 1").unwrap(),
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
        });
        for inv in ["I-1", "I-2"] {
            dir.put_investment(InvestmentRecord {
                id: InvestmentId::new(inv).unwrap(),
                client_id: ClientId::new("C 1").unwrap(),
                product_name: "Fund".into(),
                amount: None,
            });
        }
        Fixture {
            registry: CertificateRegistry::new(),
            notifier: Arc::new(RecordingNotifier::new()),
            storage: Arc::new(SimulatedStorage::new()),
            collaborators: Collaborators::from_directory(Arc::new(dir)),
        }
    }

    fn orchestrator(
        f: &Fixture,
        renderer: Arc<dyn ArtifactRenderer>,
        storage: Arc<dyn StorageGateway>,
    ) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            f.registry.clone(),
            f.collaborators.clone(),
            renderer,
            IntegrityProvider::fallback_only(),
            storage,
            f.notifier.clone(),
        )
    }

    fn create(f: &Fixture, investment: &str, template: Option<&str>) -> Certificate {
        let draft = NewCertificate {
            certificate_type: CertificateType::Share,
            investment_id: InvestmentId::new(investment).unwrap(),
            client_id: ClientId::new("C 1").unwrap(),
            template_id: template.map(|t| TemplateId::new(t).unwrap()),
            issue_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            investment_amount: None,
            number_of_shares: 5,
            share_price: DecimalAmount::new("1.5").unwrap(),
        };
        f.registry.create(draft, &TransitionEvidence::by("t")).unwrap()
    }

    #[test]
    fn success_populates_artifact_and_notifies() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), f.storage.clone());
        let cert = create(&f, "I-1", None);

        let result = orch.generate(cert.id, "tester");
        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.signature_mode, Some(SignatureMode::Fallback));

        let stored = f.registry.get(cert.id).unwrap();
        assert_eq!(stored.status, CertificateStatus::Active);
        let artifact = stored.artifact.unwrap();
        assert!(artifact
            .storage_key
            .starts_with(&format!("certificates/C_1/{}/SHR-", cert.id)));
        assert_eq!(Some(artifact.content_hash), result.hash);
        assert_eq!(f.notifier.sent_to("ada@example.com").len(), 1);
    }

    #[test]
    fn render_failure_leaves_certificate_pending() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(BrokenRenderer), f.storage.clone());
        let cert = create(&f, "I-1", None);

        let result = orch.generate(cert.id, "tester");
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(PipelineStage::Render));
        assert_eq!(f.registry.get(cert.id).unwrap(), cert);
        assert!(f.storage.is_empty());
        assert!(f.notifier.sent().is_empty());
    }

    #[test]
    fn store_failure_persists_no_metadata() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), Arc::new(RejectingStorage));
        let cert = create(&f, "I-1", None);

        let result = orch.generate(cert.id, "tester");
        assert_eq!(result.failed_stage, Some(PipelineStage::Store));
        assert!(f.registry.get(cert.id).unwrap().artifact.is_none());
    }

    #[test]
    fn commit_conflict_removes_uploaded_object() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), f.storage.clone());
        let a = create(&f, "I-1", None);
        let b = create(&f, "I-1", None);
        assert!(orch.generate(a.id, "t").success);

        let result = orch.generate(b.id, "t");
        assert_eq!(result.failed_stage, Some(PipelineStage::Commit));
        assert_eq!(f.storage.len(), 1);
        assert_eq!(f.registry.get(b.id).unwrap().status, CertificateStatus::Pending);
    }

    #[test]
    fn missing_explicit_template_fails_but_missing_default_is_tolerated() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), f.storage.clone());
        let explicit = create(&f, "I-1", Some("T-missing"));
        let result = orch.generate(explicit.id, "t");
        assert_eq!(result.failed_stage, Some(PipelineStage::Prepare));

        let generic = create(&f, "I-2", None);
        assert!(orch.generate(generic.id, "t").success);
    }

    #[test]
    fn regeneration_bumps_version_and_key() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), f.storage.clone());
        let cert = create(&f, "I-1", None);
        orch.generate(cert.id, "t");
        let second = orch.generate(cert.id, "t");
        assert!(second.success);
        let stored = f.registry.get(cert.id).unwrap();
        assert_eq!(stored.version, 2);
        assert!(stored.artifact.unwrap().storage_key.ends_with("_v2.pdf"));
    }

    #[test]
    fn revoked_certificate_cannot_be_generated() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), f.storage.clone());
        let cert = create(&f, "I-1", None);
        f.registry
            .revoke(cert.id, &TransitionEvidence::by("t").because("void"))
            .unwrap();
        let result = orch.generate(cert.id, "t");
        assert_eq!(result.failed_stage, Some(PipelineStage::Prepare));
    }

    #[test]
    fn batch_isolates_failures() {
        let f = fixture();
        let orch = orchestrator(&f, Arc::new(PdfRenderer), f.storage.clone());
        let ok = create(&f, "I-1", None);
        let bad = create(&f, "I-2", Some("T-missing"));
        let unknown = CertificateId::new();

        let results = orch.batch_generate(&[bad.id, unknown, ok.id], "t");
        assert_eq!(results.len(), 3);
        assert!(results[&ok.certificate_number.to_string()].success);
        assert!(!results[&bad.certificate_number.to_string()].success);
        assert!(!results[&unknown.to_string()].success);
    }

    /// Signals when a render starts, then waits to be released.
    struct GatedRenderer {
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl ArtifactRenderer for GatedRenderer {
        fn content_type(&self) -> &'static str {
            PdfRenderer.content_type()
        }
        fn extension(&self) -> &'static str {
            PdfRenderer.extension()
        }
        fn render(&self, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError> {
            let _ = self.entered.lock().send(());
            let _ = self.release.lock().recv();
            PdfRenderer.render(ctx)
        }
    }

    #[test]
    fn concurrent_run_for_the_same_certificate_is_rejected() {
        let f = fixture();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let renderer = GatedRenderer {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let orch = orchestrator(&f, Arc::new(renderer), f.storage.clone());
        let cert = create(&f, "I-1", None);

        std::thread::scope(|scope| {
            let first = scope.spawn(|| orch.generate(cert.id, "first"));
            entered_rx.recv().unwrap();

            let second = orch.generate(cert.id, "second");
            release_tx.send(()).unwrap();
            assert!(!second.success);
            assert_eq!(second.failed_stage, Some(PipelineStage::Prepare));
            assert!(second.error_message.unwrap().contains("already in progress"));
            assert_eq!(
                second.certificate_number,
                Some(cert.certificate_number.to_string())
            );

            assert!(first.join().unwrap().success);
        });

        let stored = f.registry.get(cert.id).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(f.storage.len(), 1);

        release_tx.send(()).unwrap();
        let again = orch.generate(cert.id, "again");
        assert!(again.success);
        assert_eq!(f.registry.get(cert.id).unwrap().version, 2);
    }

    #[test]
    fn key_segments_are_storage_safe() {
        assert_eq!(key_segment("C 1/../x"), "C_1_.._x");
        assert!(holdcert_storage::validate_key(&format!("a/{}/b", key_segment("C 1/../x"))).is_ok());
    }
}
