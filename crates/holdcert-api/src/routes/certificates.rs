//! # Certificate API
//!
//! ## Endpoints
//!
//! - `POST /v1/certificates`: create (optionally generate)
//! - `GET /v1/certificates`: list, filtered by `status`, `client_id`, `investment_id`
//! - `GET /v1/certificates/{id}`: get
//! - `POST /v1/certificates/{id}/generate`: run the generation pipeline
//! - `POST /v1/certificates/batch-generate`: generate several
//! - `PUT /v1/certificates/{id}/status`: administrative status change
//! - `POST /v1/certificates/{id}/revoke`: revoke
//! - `POST /v1/certificates/{id}/renew`: renew (no regeneration)
//! - `GET /v1/certificates/{id}/verify`: integrity and signature re-check
//! - `GET /v1/certificates/{id}/download`: artifact bytes

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use holdcert_core::{CertificateId, ClientId, InvestmentId};
use holdcert_state::{Certificate, CertificateFilter, CertificateStatus};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Actor, Validate};
use crate::orchestration::GenerationResult;
use crate::routes::blocking;
use crate::service::{CreateCertificateRequest, CreatedCertificate, VerificationReport};
use crate::state::AppState;

/// Upper bound on ids in one batch request.
const MAX_BATCH: usize = 100;

/// Upper bound on a single renewal, in months.
pub const MAX_EXTENSION_MONTHS: u32 = 120;

// ── Request DTOs ────────────────────────────────────────────────────

impl Validate for CreateCertificateRequest {
    fn validate(&self) -> Result<(), String> {
        if self.number_of_shares == 0 {
            return Err("number_of_shares must be greater than zero".to_string());
        }
        if let Some(issue) = self.issue_date {
            if self.expiry_date <= issue {
                return Err("expiry_date must be after issue_date".to_string());
            }
        }
        Ok(())
    }
}

/// Query parameters for listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only this status.
    pub status: Option<CertificateStatus>,
    /// Only this client.
    pub client_id: Option<String>,
    /// Only this investment.
    pub investment_id: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<CertificateFilter, AppError> {
        Ok(CertificateFilter {
            status: self.status,
            client_id: self.client_id.map(ClientId::new).transpose()?,
            investment_id: self.investment_id.map(InvestmentId::new).transpose()?,
        })
    }
}

/// Ids to generate.
#[derive(Debug, Deserialize)]
pub struct BatchGenerateRequest {
    /// Certificates, processed in order.
    pub certificate_ids: Vec<CertificateId>,
}

impl Validate for BatchGenerateRequest {
    fn validate(&self) -> Result<(), String> {
        if self.certificate_ids.is_empty() {
            return Err("certificate_ids must not be empty".to_string());
        }
        if self.certificate_ids.len() > MAX_BATCH {
            return Err(format!("certificate_ids must not exceed {MAX_BATCH} entries"));
        }
        Ok(())
    }
}

/// Administrative status change.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// Target status.
    pub status: CertificateStatus,
    /// Recorded in the audit trail.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Revocation.
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// Why the certificate is withdrawn.
    pub reason: String,
}

impl Validate for RevokeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".to_string());
        }
        Ok(())
    }
}

/// Renewal.
#[derive(Debug, Deserialize)]
pub struct RenewRequest {
    /// Months added to the expiry date.
    pub extension_months: u32,
}

impl Validate for RenewRequest {
    fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_EXTENSION_MONTHS).contains(&self.extension_months) {
            return Err(format!(
                "extension_months must be between 1 and {MAX_EXTENSION_MONTHS}"
            ));
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the certificates router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/certificates",
            get(list_certificates).post(create_certificate),
        )
        .route("/v1/certificates/batch-generate", post(batch_generate))
        .route("/v1/certificates/{id}", get(get_certificate))
        .route("/v1/certificates/{id}/generate", post(generate_certificate))
        .route("/v1/certificates/{id}/status", put(set_status))
        .route("/v1/certificates/{id}/revoke", post(revoke_certificate))
        .route("/v1/certificates/{id}/renew", post(renew_certificate))
        .route("/v1/certificates/{id}/verify", get(verify_certificate))
        .route("/v1/certificates/{id}/download", get(download_certificate))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/certificates: Create a certificate.
async fn create_certificate(
    State(state): State<AppState>,
    Actor(actor): Actor,
    body: Result<Json<CreateCertificateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedCertificate>), AppError> {
    let req = extract_validated_json(body)?;
    let service = state.service.clone();
    let created = blocking(move || Ok(service.create(req, &actor)?)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/certificates: List certificates.
async fn list_certificates(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Certificate>>, AppError> {
    Ok(Json(state.service.list(&query.into_filter()?)))
}

/// GET /v1/certificates/{id}: Get a certificate.
async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<CertificateId>,
) -> Result<Json<Certificate>, AppError> {
    Ok(Json(state.service.get(id)?))
}

/// POST /v1/certificates/{id}/generate: Run the pipeline.
///
/// A pipeline failure answers 422 with the result body naming the failed
/// stage; the certificate is unchanged.
async fn generate_certificate(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CertificateId>,
) -> Result<(StatusCode, Json<GenerationResult>), AppError> {
    let service = state.service.clone();
    let result = blocking(move || Ok(service.generate(id, &actor)?)).await?;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result)))
}

/// POST /v1/certificates/batch-generate: Generate several certificates.
async fn batch_generate(
    State(state): State<AppState>,
    Actor(actor): Actor,
    body: Result<Json<BatchGenerateRequest>, JsonRejection>,
) -> Result<Json<BTreeMap<String, GenerationResult>>, AppError> {
    let req = extract_validated_json(body)?;
    let service = state.service.clone();
    let results =
        blocking(move || Ok(service.batch_generate(&req.certificate_ids, &actor))).await?;
    Ok(Json(results))
}

/// PUT /v1/certificates/{id}/status: Administrative status change.
async fn set_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CertificateId>,
    body: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<Certificate>, AppError> {
    let req = extract_json(body)?;
    let updated = state
        .service
        .set_status(id, req.status, req.reason.as_deref(), &actor)?;
    Ok(Json(updated))
}

/// POST /v1/certificates/{id}/revoke: Revoke.
async fn revoke_certificate(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CertificateId>,
    body: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<Certificate>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.service.revoke(id, &req.reason, &actor)?))
}

/// POST /v1/certificates/{id}/renew: Renew.
async fn renew_certificate(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CertificateId>,
    body: Result<Json<RenewRequest>, JsonRejection>,
) -> Result<Json<Certificate>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.service.renew(id, req.extension_months, &actor)?))
}

/// GET /v1/certificates/{id}/verify: Re-check the stored artifact.
async fn verify_certificate(
    State(state): State<AppState>,
    Path(id): Path<CertificateId>,
) -> Result<Json<VerificationReport>, AppError> {
    let service = state.service.clone();
    Ok(Json(blocking(move || Ok(service.verify(id)?)).await?))
}

/// GET /v1/certificates/{id}/download: Artifact bytes as an attachment.
async fn download_certificate(
    State(state): State<AppState>,
    Path(id): Path<CertificateId>,
) -> Result<Response, AppError> {
    let service = state.service.clone();
    let download = blocking(move || Ok(service.download(id)?)).await?;
    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    Ok((
        [
            (header::CONTENT_TYPE, download.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}
