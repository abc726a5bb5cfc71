//! Health check route
//!
//! # Routes
//!
//! | Path | Method | Description | Auth |
//! |------|--------|-------------|------|
//! | /health | GET | Status + queue statistics | none |
//!
//! # Response example
//!
//! ```json
//! {
//!   "status": "ok",
//!   "version": "0.1.0",
//!   "jobs": { "total": 12, "pending": 1, "printing": 0, "completed": 11, "failed": 0 }
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::printing::JobStoreStats;
use crate::utils::AppResult;

/// Health check route - public, no auth
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// Status (ok | error)
    status: &'static str,
    /// Version
    version: &'static str,
    /// Queue statistics
    jobs: JobStoreStats,
}

async fn health(State(state): State<ServerState>) -> AppResult<Json<HealthResponse>> {
    let jobs = state.service.stats()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs,
    }))
}
