//! # Signing Key API
//!
//! - `GET /v1/signing/public-key`: verification key and active mode

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::service::PublicKeyInfo;
use crate::state::AppState;

/// Build the signing router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/signing/public-key", get(public_key))
}

/// GET /v1/signing/public-key
async fn public_key(State(state): State<AppState>) -> Json<PublicKeyInfo> {
    Json(state.service.public_key())
}
