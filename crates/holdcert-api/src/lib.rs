//! # holdcert-api: Holding-Certificate Service
//!
//! Issues, generates, signs, stores and retires certificates that attest to
//! a financial holding.
//!
//! ## API Surface
//!
//! | Prefix               | Module                    | Domain                   |
//! |----------------------|---------------------------|--------------------------|
//! | `/v1/certificates/*` | [`routes::certificates`]  | Certificate lifecycle    |
//! | `/v1/expiry/*`       | [`routes::expiry`]        | Expiry administration    |
//! | `/v1/signing/*`      | [`routes::signing`]       | Verification key         |
//! | `/health/*`          | this module               | Probes                   |
//!
//! ## Components
//!
//! ```text
//! CertificateService ──┐
//!                      ├─► GenerationOrchestrator ─► renderer, IntegrityProvider,
//! ExpiryMonitor ───────┘                             StorageGateway, CertificateRegistry
//!      ▲
//!  DailySchedule (scheduler)
//! ```
//!
//! The service and monitor are synchronous; handlers call them directly,
//! except the manual monitor run, which goes to the blocking pool.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod extractors;
pub mod monitor;
pub mod notify;
pub mod orchestration;
pub mod render;
pub mod routes;
pub mod scheduler;
pub mod service;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::certificates::router())
        .merge(routes::expiry::router())
        .merge(routes::signing::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
