//! Print service - intake boundary, relay contract, and operator queries
//!
//! Intake validates and renders synchronously, persists the job, and
//! returns. It never waits on a printer: the caller gets its answer before
//! physical delivery is attempted, and everything after job creation is the
//! worker's problem.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::renderer::{ReceiptRenderer, RenderError};
use super::storage::{JobStore, JobStoreError, JobStoreStats};
use super::types::{OrderData, PrintJob, PrinterDescriptor};
use super::worker::RetryPolicy;
use crate::utils::time::now_millis;

#[derive(Debug, Error)]
pub enum PrintServiceError {
    /// Malformed order data; surfaced synchronously, no job is created
    #[error("Validation failed: {0}")]
    Validation(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] JobStoreError),

    #[error("Print job not found: {0}")]
    JobNotFound(String),
}

pub type PrintServiceResult<T> = Result<T, PrintServiceError>;

/// Synchronous intake answer
#[derive(Debug, Clone, Serialize)]
pub struct IntakeReceipt {
    pub job_id: String,
    pub accepted: bool,
    /// True when an identical payment reference had already been submitted;
    /// the original job is returned and nothing new is created
    pub deduplicated: bool,
}

/// Outcome reported by the relay companion device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayOutcome {
    Completed,
    Failed,
}

/// Print job service
///
/// Responsibilities:
/// - Accept completed orders and create jobs idempotently
/// - Expose the relay pull/confirm contract
/// - Answer operator status queries
#[derive(Clone)]
pub struct PrintService {
    store: JobStore,
    policy: RetryPolicy,
}

impl PrintService {
    pub fn new(store: JobStore, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Accept a completed order for printing
    ///
    /// Renders the receipt (the only synchronous failure point), derives the
    /// job id from the payment reference, and persists the job. A repeated
    /// payment confirmation maps to the existing job: one order, one
    /// physical receipt.
    pub fn submit(
        &self,
        order: OrderData,
        printer: PrinterDescriptor,
    ) -> PrintServiceResult<IntakeReceipt> {
        let renderer = ReceiptRenderer::new(printer.paper_width);
        let receipt_bytes = renderer.render(&order)?;

        let job = PrintJob::new(order, printer, receipt_bytes, now_millis());
        let (job, created) = self.store.create_job(&job)?;

        if created {
            info!(
                job_id = %job.job_id,
                restaurant_id = %job.restaurant_id,
                order_number = %job.order_number,
                "Print job created"
            );
        } else {
            info!(
                job_id = %job.job_id,
                payment_reference = %job.payment_reference,
                "Duplicate submission, returning existing job"
            );
        }

        Ok(IntakeReceipt {
            job_id: job.job_id,
            accepted: true,
            deduplicated: !created,
        })
    }

    /// Relay pull: oldest unconfirmed byte stream for a restaurant
    pub fn relay_pull(&self, restaurant_id: &str) -> PrintServiceResult<Option<(String, Vec<u8>)>> {
        Ok(self.store.relay_pull(restaurant_id, now_millis())?)
    }

    /// Relay confirm: the companion device reports the physical outcome
    ///
    /// `Completed` finishes the job. `Failed` consumes retry budget exactly
    /// like a network dispatch failure: requeue with backoff, or terminal
    /// failure once the budget is spent.
    pub fn confirm_relay(
        &self,
        job_id: &str,
        outcome: RelayOutcome,
        error: Option<String>,
    ) -> PrintServiceResult<PrintJob> {
        let now = now_millis();
        match outcome {
            RelayOutcome::Completed => {
                let job = self.store.mark_completed(job_id, now)?;
                info!(job_id = %job.job_id, "Relay confirmed delivery");
                Ok(job)
            }
            RelayOutcome::Failed => {
                let job = self
                    .store
                    .get_job(job_id)?
                    .ok_or_else(|| PrintServiceError::JobNotFound(job_id.to_string()))?;
                let reason = error.unwrap_or_else(|| "relay reported failure".to_string());

                if job.retry_count + 1 >= self.policy.max_retries {
                    let failed = self.store.mark_failed(job_id, &reason, now)?;
                    error!(
                        job_id = %failed.job_id,
                        restaurant_id = %failed.restaurant_id,
                        retry_count = failed.retry_count,
                        error = %reason,
                        "Print job permanently failed"
                    );
                    Ok(failed)
                } else {
                    let delay = self.policy.backoff_delay(job.retry_count);
                    let requeued =
                        self.store
                            .requeue(job_id, &reason, now + delay.as_millis() as i64, now)?;
                    warn!(
                        job_id = %requeued.job_id,
                        retry_count = requeued.retry_count,
                        error = %reason,
                        "Relay failure, job requeued"
                    );
                    Ok(requeued)
                }
            }
        }
    }

    /// Get a job by id
    pub fn get_job(&self, job_id: &str) -> PrintServiceResult<PrintJob> {
        self.store
            .get_job(job_id)?
            .ok_or_else(|| PrintServiceError::JobNotFound(job_id.to_string()))
    }

    /// Jobs for a restaurant, newest first
    pub fn jobs_for_restaurant(&self, restaurant_id: &str) -> PrintServiceResult<Vec<PrintJob>> {
        Ok(self.store.jobs_for_restaurant(restaurant_id)?)
    }

    /// Queue statistics for the health endpoint
    pub fn stats(&self) -> PrintServiceResult<JobStoreStats> {
        Ok(self.store.stats()?)
    }
}

impl std::fmt::Debug for PrintService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintService")
            .field("store", &"<JobStore>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::types::{JobStatus, OrderItem, TransportKind, VenueInfo};

    fn sample_order(payment_ref: &str) -> OrderData {
        OrderData {
            order_number: "A-7".to_string(),
            payment_reference: payment_ref.to_string(),
            venue: VenueInfo {
                name: "La Taberna".to_string(),
                address: "Calle Mayor 12".to_string(),
                phone: None,
            },
            items: vec![OrderItem {
                quantity: 1,
                name: "Tortilla".to_string(),
                unit_price: 8.5,
                total: 8.5,
            }],
            subtotal: 8.5,
            tax: 0.85,
            delivery_fee: 0.0,
            tip: 0.0,
            total: 9.35,
            special_instructions: None,
            customer_name: None,
            placed_at: 1754300000000,
        }
    }

    fn relay_descriptor(restaurant: &str) -> PrinterDescriptor {
        PrinterDescriptor {
            restaurant_id: restaurant.to_string(),
            transport: TransportKind::BluetoothRelay {
                device_id: "tab-1".to_string(),
            },
            paper_width: 48,
        }
    }

    fn service() -> PrintService {
        PrintService::new(JobStore::open_in_memory().unwrap(), RetryPolicy::default())
    }

    #[test]
    fn test_submit_idempotent() {
        let service = service();

        let first = service
            .submit(sample_order("pay-1"), relay_descriptor("r1"))
            .unwrap();
        assert!(first.accepted);
        assert!(!first.deduplicated);

        let second = service
            .submit(sample_order("pay-1"), relay_descriptor("r1"))
            .unwrap();
        assert!(second.accepted);
        assert!(second.deduplicated);
        assert_eq!(second.job_id, first.job_id);

        assert_eq!(service.jobs_for_restaurant("r1").unwrap().len(), 1);
    }

    #[test]
    fn test_submit_rejects_empty_order() {
        let service = service();
        let mut order = sample_order("pay-2");
        order.items.clear();

        let result = service.submit(order, relay_descriptor("r1"));
        assert!(matches!(result, Err(PrintServiceError::Validation(_))));

        // No job row exists after the rejection
        assert!(service.jobs_for_restaurant("r1").unwrap().is_empty());
    }

    #[test]
    fn test_submit_renders_bytes_up_front() {
        let service = service();
        let receipt = service
            .submit(sample_order("pay-3"), relay_descriptor("r1"))
            .unwrap();

        let job = service.get_job(&receipt.job_id).unwrap();
        assert!(!job.receipt_bytes.is_empty());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_confirm_relay_completed() {
        let store = JobStore::open_in_memory().unwrap();
        let service = PrintService::new(store.clone(), RetryPolicy::default());

        let receipt = service
            .submit(sample_order("pay-4"), relay_descriptor("r1"))
            .unwrap();
        store.claim_next_pending("r1", now_millis()).unwrap().unwrap();

        let job = service
            .confirm_relay(&receipt.job_id, RelayOutcome::Completed, None)
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_confirm_relay_failed_requeues() {
        let store = JobStore::open_in_memory().unwrap();
        let service = PrintService::new(store.clone(), RetryPolicy::default());

        let receipt = service
            .submit(sample_order("pay-5"), relay_descriptor("r1"))
            .unwrap();
        store.claim_next_pending("r1", now_millis()).unwrap().unwrap();

        let job = service
            .confirm_relay(
                &receipt.job_id,
                RelayOutcome::Failed,
                Some("paper jam".to_string()),
            )
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.error_message.as_deref(), Some("paper jam"));
    }
}
