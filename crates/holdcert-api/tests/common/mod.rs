//! Shared fixtures for the holdcert-api integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use holdcert_api::collaborators::{
    ClientRecord, Collaborators, InMemoryDirectory, InvestmentRecord, TemplateRecord,
};
use holdcert_api::monitor::MonitorSettings;
use holdcert_api::notify::RecordingNotifier;
use holdcert_api::render::PdfRenderer;
use holdcert_api::service::CreateCertificateRequest;
use holdcert_api::state::{AppComponents, AppState};
use holdcert_core::{ClientId, DecimalAmount, InvestmentId, TemplateId};
use holdcert_crypto::{Ed25519KeyPair, IntegrityProvider};
use holdcert_state::{CertificateRegistry, CertificateType};
use holdcert_storage::{SimulatedStorage, StorageGateway};

pub const C1_EMAIL: &str = "c1@example.com";
pub const C2_EMAIL: &str = "c2@example.com";
pub const ADMIN_EMAIL: &str = "registrar@example.com";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Clients C1 and C2; investments I1..I4 owned by C1, I5 by C2; one
/// default template for SHARE.
pub fn directory() -> Arc<InMemoryDirectory> {
    let dir = InMemoryDirectory::new();
    dir.put_client(ClientRecord {
        id: ClientId::new("C1").unwrap(),
        display_name: "Client One".into(),
        email: C1_EMAIL.into(),
    });
    dir.put_client(ClientRecord {
        id: ClientId::new("C2").unwrap(),
        display_name: "Client Two".into(),
        email: C2_EMAIL.into(),
    });
    for n in 1..=5 {
        dir.put_investment(InvestmentRecord {
            id: InvestmentId::new(format!("I{n}")).unwrap(),
            client_id: ClientId::new(if n == 5 { "C2" } else { "C1" }).unwrap(),
            product_name: format!("Product {n}"),
            amount: Some(DecimalAmount::new("1000.00").unwrap()),
        });
    }
    dir.put_template(TemplateRecord {
        id: TemplateId::new("T-SHARE").unwrap(),
        title: "Share Certificate".into(),
        default_for: Some(CertificateType::Share),
        footer: None,
    });
    Arc::new(dir)
}

pub struct Harness {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<dyn StorageGateway>,
}

pub fn harness_with(storage: Arc<dyn StorageGateway>, integrity: IntegrityProvider) -> Harness {
    harness_over(CertificateRegistry::new(), storage, integrity)
}

pub fn harness_over(
    registry: CertificateRegistry,
    storage: Arc<dyn StorageGateway>,
    integrity: IntegrityProvider,
) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let state = AppState::new(AppComponents {
        registry,
        collaborators: Collaborators::from_directory(directory()),
        renderer: Arc::new(PdfRenderer),
        integrity,
        storage: storage.clone(),
        notifier: notifier.clone(),
        monitor: MonitorSettings {
            admin_recipients: vec![ADMIN_EMAIL.into()],
            ..MonitorSettings::default()
        },
    });
    Harness {
        state,
        notifier,
        storage,
    }
}

/// Simulated storage with an Ed25519 signing key.
pub fn harness() -> Harness {
    harness_with(
        Arc::new(SimulatedStorage::new()),
        IntegrityProvider::with_key_pair("test-key", Ed25519KeyPair::generate()),
    )
}

pub fn request(investment: &str, expiry: NaiveDate, generate: bool) -> CreateCertificateRequest {
    let client = if investment == "I5" { "C2" } else { "C1" };
    CreateCertificateRequest {
        investment_id: InvestmentId::new(investment).unwrap(),
        client_id: ClientId::new(client).unwrap(),
        certificate_type: CertificateType::Share,
        template_id: None,
        issue_date: Some(date(2020, 1, 1)),
        expiry_date: expiry,
        investment_amount: None,
        number_of_shares: 100,
        share_price: DecimalAmount::new("10.00").unwrap(),
        generate_immediately: generate,
        send_notification: true,
    }
}
