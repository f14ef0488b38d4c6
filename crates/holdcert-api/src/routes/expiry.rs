//! # Expiry Administration API
//!
//! ## Endpoints
//!
//! - `GET /v1/expiry/statistics`: aggregate figures
//! - `GET /v1/expiry/report`: statistics plus rows grouped by client
//! - `GET /v1/expiry/expiring?days=N`: ACTIVE certificates expiring within N days (default 30)
//! - `GET /v1/expiry/overdue`: certificates past expiry
//! - `POST /v1/expiry/run`: run the monitor now
//! - `POST /v1/expiry/renew/{id}`: renew and regenerate

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use holdcert_core::CertificateId;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Actor};
use crate::monitor::{
    CertificateSummary, ExpiryReport, ExpiryStatistics, MonitorRunSummary, MonitorTrigger,
    RenewalOutcome,
};
use crate::routes::blocking;
use crate::routes::certificates::RenewRequest;
use crate::state::AppState;

/// Longest window accepted by `/v1/expiry/expiring`.
const MAX_WINDOW_DAYS: u32 = 3650;

fn default_days() -> u32 {
    30
}

/// Query for the expiring listing.
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    /// Window length in days.
    #[serde(default = "default_days")]
    pub days: u32,
}

/// Build the expiry router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/expiry/statistics", get(statistics))
        .route("/v1/expiry/report", get(report))
        .route("/v1/expiry/expiring", get(expiring))
        .route("/v1/expiry/overdue", get(overdue))
        .route("/v1/expiry/run", post(run_now))
        .route("/v1/expiry/renew/{id}", post(renew))
}

/// GET /v1/expiry/statistics
async fn statistics(State(state): State<AppState>) -> Json<ExpiryStatistics> {
    Json(state.monitor.statistics(state.clock.today()))
}

/// GET /v1/expiry/report
async fn report(State(state): State<AppState>) -> Json<ExpiryReport> {
    Json(state.monitor.detailed_report(state.clock.today()))
}

/// GET /v1/expiry/expiring
async fn expiring(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<CertificateSummary>>, AppError> {
    if query.days > MAX_WINDOW_DAYS {
        return Err(AppError::Validation(format!(
            "days must not exceed {MAX_WINDOW_DAYS}"
        )));
    }
    Ok(Json(
        state.monitor.expiring_within(state.clock.today(), query.days),
    ))
}

/// GET /v1/expiry/overdue
async fn overdue(State(state): State<AppState>) -> Json<Vec<CertificateSummary>> {
    Json(state.monitor.overdue(state.clock.today()))
}

/// POST /v1/expiry/run: Same algorithm as the daily schedule, run
/// synchronously. Waits if a run is already in progress.
async fn run_now(State(state): State<AppState>) -> Result<Json<MonitorRunSummary>, AppError> {
    let today = state.clock.today();
    let monitor = state.monitor.clone();
    let summary = blocking(move || Ok(monitor.run(today, MonitorTrigger::Manual))).await?;
    Ok(Json(summary))
}

/// POST /v1/expiry/renew/{id}
async fn renew(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CertificateId>,
    body: Result<Json<RenewRequest>, JsonRejection>,
) -> Result<Json<RenewalOutcome>, AppError> {
    let req = extract_validated_json(body)?;
    let monitor = state.monitor.clone();
    let outcome =
        blocking(move || Ok(monitor.renew_certificate(id, req.extension_months, &actor)?)).await?;
    Ok(Json(outcome))
}
