//! # Expiry Monitor
//!
//! One run, for a given `today`:
//!
//! 1. For each warning threshold `t`, every ACTIVE certificate expiring on
//!    exactly `today + t` gets one warning addressed to its holder.
//! 2. With auto-expire on, every ACTIVE certificate whose expiry date is
//!    before `today` becomes EXPIRED.
//! 3. Statistics are computed over the registry after step 2.
//! 4. If anything is overdue or expires within 7 days, administrators get a
//!    single report covering both sets.
//!
//! Each certificate is handled on its own: a failed send or transition is
//! counted in the [`MonitorRunSummary`] and the loop moves on. Runs are
//! serialized within the process; a second caller waits for the first.
//!
//! "Overdue" means an expiry date before today on a certificate that is
//! ACTIVE or EXPIRED, i.e. one that still needs renewing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use holdcert_core::{CertificateId, ClientId, InvestmentId};
use holdcert_state::{Certificate, CertificateRegistry, CertificateStatus, TransitionEvidence};

use crate::collaborators::Collaborators;
use crate::error::ServiceError;
use crate::notify::{notify_best_effort, NotificationGateway, NotificationKind};
use crate::orchestration::{GenerationOrchestrator, GenerationResult};

/// Actor recorded on transitions made by the monitor.
pub const MONITOR_ACTOR: &str = "expiry-monitor";

/// Window used for the "expiring soon" part of reports.
const REPORT_WINDOW_DAYS: u32 = 30;

/// Monitor behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Days before expiry at which holders are warned.
    pub warning_thresholds: Vec<u32>,
    /// Expire lapsed ACTIVE certificates during each run.
    pub auto_expire: bool,
    /// Recipients of the batch report.
    pub admin_recipients: Vec<String>,
    /// Re-run the pipeline after a monitor renewal.
    pub regenerate_on_renewal: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            warning_thresholds: vec![30, 7, 1],
            auto_expire: true,
            admin_recipients: Vec::new(),
            regenerate_on_renewal: true,
        }
    }
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorTrigger {
    /// The daily schedule.
    Scheduled,
    /// An operator request.
    Manual,
}

impl MonitorTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

/// Aggregate expiry figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryStatistics {
    /// Reference date.
    pub as_of: NaiveDate,
    /// ACTIVE certificates.
    pub total_active: usize,
    /// ACTIVE or EXPIRED certificates past their expiry date.
    pub overdue: usize,
    /// ACTIVE certificates expiring within 7 days.
    pub expiring_within_7_days: usize,
    /// ACTIVE certificates expiring within 30 days.
    pub expiring_within_30_days: usize,
    /// ACTIVE certificates expiring within 90 days.
    pub expiring_within_90_days: usize,
}

/// Warnings for one threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    /// Threshold in days.
    pub threshold_days: u32,
    /// Expiry date matched.
    pub target_date: NaiveDate,
    /// Certificates that matched.
    pub matched: usize,
    /// Warnings delivered.
    pub sent: usize,
    /// Warnings that could not be delivered.
    pub failed: usize,
}

/// A certificate the auto-expire step could not transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireFailure {
    /// Certificate number.
    pub certificate_number: String,
    /// Error detail.
    pub error: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRunSummary {
    /// Date the run evaluated.
    pub run_date: NaiveDate,
    /// What started it.
    pub trigger: MonitorTrigger,
    /// Per-threshold warning outcomes, in configured order.
    pub warnings: Vec<ThresholdOutcome>,
    /// Numbers of certificates moved to EXPIRED.
    pub expired: Vec<String>,
    /// Auto-expire failures.
    pub expire_failures: Vec<ExpireFailure>,
    /// Figures after auto-expiry.
    pub statistics: ExpiryStatistics,
    /// Certificates covered by the admin report.
    pub admin_report_certificates: usize,
    /// Whether at least one administrator received the report.
    pub admin_report_sent: bool,
}

/// One row in reports and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    /// Certificate id.
    pub certificate_id: CertificateId,
    /// Certificate number.
    pub certificate_number: String,
    /// Holder.
    pub client_id: ClientId,
    /// Holder display name.
    pub client_name: String,
    /// Linked investment.
    pub investment_id: InvestmentId,
    /// Current status.
    pub status: CertificateStatus,
    /// Expiry date.
    pub expiry_date: NaiveDate,
    /// Negative once expired.
    pub days_until_expiry: i64,
}

/// Overdue and soon-expiring certificates of one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientExpiryGroup {
    /// Past expiry.
    pub overdue: Vec<CertificateSummary>,
    /// Expiring within the report window.
    pub expiring_soon: Vec<CertificateSummary>,
}

/// Statistics plus listings grouped by client display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    /// Aggregate figures.
    pub statistics: ExpiryStatistics,
    /// All overdue certificates.
    pub overdue: Vec<CertificateSummary>,
    /// All certificates expiring within 30 days.
    pub expiring_soon: Vec<CertificateSummary>,
    /// The same rows keyed by client display name.
    pub by_client: BTreeMap<String, ClientExpiryGroup>,
}

/// A monitor renewal and the regeneration that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalOutcome {
    /// The certificate after renewal (and regeneration, if it succeeded).
    pub certificate: Certificate,
    /// Pipeline outcome, when regeneration is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regeneration: Option<GenerationResult>,
}

/// Scans the registry for expiring certificates.
pub struct ExpiryMonitor {
    registry: CertificateRegistry,
    collaborators: Collaborators,
    orchestrator: Arc<GenerationOrchestrator>,
    notifier: Arc<dyn NotificationGateway>,
    settings: MonitorSettings,
    run_lock: Mutex<()>,
}

impl std::fmt::Debug for ExpiryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryMonitor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ExpiryMonitor {
    /// Wire the monitor.
    pub fn new(
        registry: CertificateRegistry,
        collaborators: Collaborators,
        orchestrator: Arc<GenerationOrchestrator>,
        notifier: Arc<dyn NotificationGateway>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            registry,
            collaborators,
            orchestrator,
            notifier,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Execute one run for `today`.
    pub fn run(&self, today: NaiveDate, trigger: MonitorTrigger) -> MonitorRunSummary {
        let _guard = self.run_lock.lock();
        tracing::info!(%today, trigger = trigger.as_str(), "expiry monitor run started");

        let warnings = self
            .settings
            .warning_thresholds
            .iter()
            .map(|&t| self.send_warnings(today, t))
            .collect();

        let (expired, expire_failures) = if self.settings.auto_expire {
            self.auto_expire(today)
        } else {
            (Vec::new(), Vec::new())
        };

        let statistics = self.statistics(today);
        let (admin_report_certificates, admin_report_sent) =
            if statistics.overdue > 0 || statistics.expiring_within_7_days > 0 {
                self.send_admin_report(today)
            } else {
                (0, false)
            };

        metrics::counter!("holdcert_monitor_runs_total", "trigger" => trigger.as_str())
            .increment(1);
        tracing::info!(
            %today,
            expired = expired.len(),
            expire_failures = expire_failures.len(),
            overdue = statistics.overdue,
            admin_report_sent,
            "expiry monitor run finished"
        );
        MonitorRunSummary {
            run_date: today,
            trigger,
            warnings,
            expired,
            expire_failures,
            statistics,
            admin_report_certificates,
            admin_report_sent,
        }
    }

    /// Aggregate figures for `today`.
    pub fn statistics(&self, today: NaiveDate) -> ExpiryStatistics {
        ExpiryStatistics {
            as_of: today,
            total_active: self.registry.select(Certificate::is_active).len(),
            overdue: self.overdue_certificates(today).len(),
            expiring_within_7_days: self.registry.active_expiring_within(today, 7).len(),
            expiring_within_30_days: self.registry.active_expiring_within(today, 30).len(),
            expiring_within_90_days: self.registry.active_expiring_within(today, 90).len(),
        }
    }

    /// ACTIVE certificates expiring in `today..=today + days`.
    pub fn expiring_within(&self, today: NaiveDate, days: u32) -> Vec<CertificateSummary> {
        self.summarize(today, self.registry.active_expiring_within(today, days))
    }

    /// Certificates past expiry that still need renewing.
    pub fn overdue(&self, today: NaiveDate) -> Vec<CertificateSummary> {
        self.summarize(today, self.overdue_certificates(today))
    }

    /// Statistics plus overdue and soon-expiring rows grouped by client.
    pub fn detailed_report(&self, today: NaiveDate) -> ExpiryReport {
        let overdue = self.overdue(today);
        let expiring_soon = self.expiring_within(today, REPORT_WINDOW_DAYS);

        let mut by_client: BTreeMap<String, ClientExpiryGroup> = BTreeMap::new();
        for row in &overdue {
            by_client
                .entry(row.client_name.clone())
                .or_default()
                .overdue
                .push(row.clone());
        }
        for row in &expiring_soon {
            by_client
                .entry(row.client_name.clone())
                .or_default()
                .expiring_soon
                .push(row.clone());
        }

        ExpiryReport {
            statistics: self.statistics(today),
            overdue,
            expiring_soon,
            by_client,
        }
    }

    /// Renew by `months` and, if enabled, regenerate the artifact. A failed
    /// regeneration leaves the renewal in place.
    pub fn renew_certificate(
        &self,
        id: CertificateId,
        months: u32,
        actor: &str,
    ) -> Result<RenewalOutcome, ServiceError> {
        let evidence = TransitionEvidence::by(actor).because(format!("renewed for {months} months"));
        let renewed = self.registry.renew(id, months, &evidence)?;
        tracing::info!(
            certificate_number = %renewed.certificate_number,
            expiry_date = %renewed.expiry_date,
            "certificate renewed"
        );
        if !self.settings.regenerate_on_renewal {
            return Ok(RenewalOutcome {
                certificate: renewed,
                regeneration: None,
            });
        }

        let regeneration = self.orchestrator.generate(id, actor);
        if !regeneration.success {
            tracing::warn!(
                certificate_number = %renewed.certificate_number,
                error = regeneration.error_message.as_deref().unwrap_or_default(),
                "renewed certificate kept its previous artifact"
            );
        }
        Ok(RenewalOutcome {
            certificate: self.registry.get(id)?,
            regeneration: Some(regeneration),
        })
    }

    fn overdue_certificates(&self, today: NaiveDate) -> Vec<Certificate> {
        self.registry.select(|c| {
            matches!(c.status, CertificateStatus::Active | CertificateStatus::Expired)
                && c.expiry_date < today
        })
    }

    fn summarize(&self, today: NaiveDate, certificates: Vec<Certificate>) -> Vec<CertificateSummary> {
        certificates
            .into_iter()
            .map(|c| CertificateSummary {
                certificate_id: c.id,
                certificate_number: c.certificate_number.to_string(),
                client_name: self.collaborators.client_name(&c.client_id),
                days_until_expiry: c.days_until_expiry(today),
                client_id: c.client_id,
                investment_id: c.investment_id,
                status: c.status,
                expiry_date: c.expiry_date,
            })
            .collect()
    }

    fn send_warnings(&self, today: NaiveDate, threshold_days: u32) -> ThresholdOutcome {
        let target_date = today + chrono::Duration::days(i64::from(threshold_days));
        let matched = self.registry.active_expiring_on(target_date);
        let mut outcome = ThresholdOutcome {
            threshold_days,
            target_date,
            matched: matched.len(),
            sent: 0,
            failed: 0,
        };

        for certificate in &matched {
            let Some(client) = self.collaborators.clients.client(&certificate.client_id) else {
                tracing::warn!(
                    certificate_number = %certificate.certificate_number,
                    client_id = %certificate.client_id,
                    threshold_days,
                    "no client record; expiry warning not sent"
                );
                outcome.failed += 1;
                continue;
            };
            let subject = format!(
                "Certificate {} expires in {threshold_days} day{}",
                certificate.certificate_number,
                if threshold_days == 1 { "" } else { "s" }
            );
            let body = format!(
                "Dear {},\n\nYour certificate {} expires on {}. Please arrange a renewal.\n",
                client.display_name, certificate.certificate_number, certificate.expiry_date
            );
            if notify_best_effort(
                self.notifier.as_ref(),
                NotificationKind::ExpiryWarning,
                &client.email,
                &subject,
                &body,
            ) {
                outcome.sent += 1;
            } else {
                outcome.failed += 1;
            }
        }
        if outcome.matched > 0 {
            tracing::info!(
                threshold_days,
                %target_date,
                sent = outcome.sent,
                failed = outcome.failed,
                "expiry warnings dispatched"
            );
        }
        outcome
    }

    fn auto_expire(&self, today: NaiveDate) -> (Vec<String>, Vec<ExpireFailure>) {
        let evidence = TransitionEvidence::by(MONITOR_ACTOR).because("expiry date passed");
        let mut expired = Vec::new();
        let mut failures = Vec::new();
        for certificate in self.registry.active_overdue(today) {
            let number = certificate.certificate_number.to_string();
            match self.registry.mark_expired(certificate.id, today, &evidence) {
                Ok(_) => {
                    tracing::info!(certificate_number = %number, "certificate expired");
                    expired.push(number);
                }
                Err(e) => {
                    tracing::warn!(certificate_number = %number, error = %e, "auto-expire failed");
                    failures.push(ExpireFailure {
                        certificate_number: number,
                        error: e.to_string(),
                    });
                }
            }
        }
        metrics::counter!("holdcert_certificates_auto_expired_total").increment(expired.len() as u64);
        (expired, failures)
    }

    fn send_admin_report(&self, today: NaiveDate) -> (usize, bool) {
        let mut rows: BTreeMap<String, CertificateSummary> = BTreeMap::new();
        for row in self
            .overdue(today)
            .into_iter()
            .chain(self.expiring_within(today, 7))
        {
            rows.insert(row.certificate_number.clone(), row);
        }
        if self.settings.admin_recipients.is_empty() {
            tracing::warn!(certificates = rows.len(), "no administrator recipients; expiry report not sent");
            return (rows.len(), false);
        }

        let subject = format!("Certificate expiry report for {today}: {} need attention", rows.len());
        let mut body = format!("Certificates overdue or expiring within 7 days as of {today}:\n\n");
        for row in rows.values() {
            body.push_str(&format!(
                "{}  {}  {}  expires {} ({} days)\n",
                row.certificate_number, row.client_name, row.status, row.expiry_date, row.days_until_expiry
            ));
        }

        let mut delivered = false;
        for recipient in &self.settings.admin_recipients {
            delivered |= notify_best_effort(
                self.notifier.as_ref(),
                NotificationKind::AdminReport,
                recipient,
                &subject,
                &body,
            );
        }
        (rows.len(), delivered)
    }
}
