//! Relay API Handlers
//!
//! The companion device polls `next` for the oldest unconfirmed byte
//! stream, forwards it to the printer over its short-range link, and
//! reports the physical outcome through `confirm`. A device that accepts a
//! stream and never confirms loses it back to the queue when the grace
//! period expires.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::api::print_jobs::JobView;
use crate::core::ServerState;
use crate::printing::RelayOutcome;
use crate::utils::AppResult;

/// Payload handed to the companion device
#[derive(Debug, Serialize)]
pub struct PullResponse {
    pub job_id: String,
    /// ESC/POS bytes, base64-encoded for the JSON transport
    pub receipt_b64: String,
}

/// GET /api/relay/:restaurant_id/next - Pull the oldest unconfirmed stream
///
/// 204 when there is nothing to print. Each stream is handed out once;
/// repeated polling cannot produce duplicate receipts.
pub async fn pull(
    State(state): State<ServerState>,
    Path(restaurant_id): Path<String>,
) -> AppResult<Response> {
    match state.service.relay_pull(&restaurant_id)? {
        Some((job_id, bytes)) => {
            let receipt_b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
            Ok(Json(PullResponse { job_id, receipt_b64 }).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Confirm request body
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub outcome: RelayOutcome,
    pub error: Option<String>,
}

/// POST /api/relay/:job_id/confirm - Report the physical outcome
///
/// `completed` finishes the job; `failed` sends it back through the retry
/// budget.
pub async fn confirm(
    State(state): State<ServerState>,
    Path(job_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> AppResult<Json<JobView>> {
    let job = state.service.confirm_relay(&job_id, req.outcome, req.error)?;
    Ok(Json(job.into()))
}
