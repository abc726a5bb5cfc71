//! Print Jobs API Handlers
//!
//! - Submit a completed order for printing (idempotent intake)
//! - List jobs for a restaurant (operator troubleshooting)
//! - Get a single job
//!
//! The intake handler answers before any printer is touched: it validates,
//! renders, persists, and returns. Delivery is the worker's job.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::printing::{IntakeReceipt, JobStatus, OrderData, PrintJob, PrinterDescriptor};
use crate::utils::AppResult;

/// Intake request body
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub order: OrderData,
    pub printer: PrinterDescriptor,
}

/// Job summary for API responses; receipt bytes stay server-side
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub restaurant_id: String,
    pub order_number: String,
    pub status: JobStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl From<PrintJob> for JobView {
    fn from(job: PrintJob) -> Self {
        Self {
            job_id: job.job_id,
            restaurant_id: job.restaurant_id,
            order_number: job.order_number,
            status: job.status,
            retry_count: job.retry_count,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

/// Query params for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub restaurant_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub items: Vec<JobView>,
}

/// POST /api/print-jobs - Accept a completed order for printing
///
/// Returns `{ job_id, accepted, deduplicated }` synchronously, or 400 when
/// the order data fails validation (no job is created in that case).
/// Re-submitting the same payment reference returns the existing job.
pub async fn submit(
    State(state): State<ServerState>,
    Json(req): Json<SubmitRequest>,
) -> AppResult<Json<IntakeReceipt>> {
    let receipt = state.service.submit(req.order, req.printer)?;
    Ok(Json(receipt))
}

/// GET /api/print-jobs?restaurant_id= - List jobs for a restaurant
///
/// Newest first; exposes status, retry_count and error_message for operator
/// troubleshooting.
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<JobListResponse>> {
    let jobs = state.service.jobs_for_restaurant(&query.restaurant_id)?;
    Ok(Json(JobListResponse {
        items: jobs.into_iter().map(JobView::from).collect(),
    }))
}

/// GET /api/print-jobs/:id - Get a single job
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobView>> {
    let job = state.service.get_job(&id)?;
    Ok(Json(job.into()))
}
