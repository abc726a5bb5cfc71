//! Transport dispatcher
//!
//! Delivers a rendered byte stream to a venue's printer over one of two
//! transports. The two report different things and the difference is kept
//! visible in the return type:
//!
//! - `Network` writes straight to the printer's TCP socket; a clean
//!   write-then-close comes back as [`SendOutcome::Delivered`]. That is the
//!   strongest signal the protocol offers (it still does not prove paper
//!   advanced).
//! - `BluetoothRelay` cannot reach the printer from this process; the bytes
//!   are persisted for the venue's companion device to pull, and the result
//!   is [`SendOutcome::Accepted`]: in flight, not done.

use std::time::Duration;

use comanda_printer::{NetworkPrinter, Printer};
use thiserror::Error;
use tracing::{info, instrument};

use super::storage::{JobStore, JobStoreError};
use super::types::{PrintJob, SendOutcome, TransportKind};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transport-level failure; always retryable
    #[error("Transport error: {0}")]
    Transport(#[from] comanda_printer::PrintError),

    #[error("Storage error: {0}")]
    Storage(#[from] JobStoreError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Polymorphic delivery of receipt bytes to a printer
pub struct TransportDispatcher {
    store: JobStore,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TransportDispatcher {
    pub fn new(store: JobStore, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            store,
            connect_timeout,
            write_timeout,
        }
    }

    /// Send a job's bytes over its configured transport
    ///
    /// Callers must branch on the outcome: only `Delivered` justifies
    /// completing the job; `Accepted` means wait for the relay confirm or
    /// the stale sweep.
    #[instrument(skip(self, job), fields(job_id = %job.job_id, restaurant_id = %job.restaurant_id))]
    pub async fn send(&self, job: &PrintJob) -> DispatchResult<SendOutcome> {
        match &job.printer.transport {
            TransportKind::Network { host, port } => {
                let printer = NetworkPrinter::new(host, *port)?
                    .with_timeouts(self.connect_timeout, self.write_timeout);
                printer.print(&job.receipt_bytes).await?;
                info!(bytes = job.receipt_bytes.len(), "Receipt delivered to printer socket");
                Ok(SendOutcome::Delivered)
            }
            TransportKind::BluetoothRelay { device_id } => {
                self.store.relay_enqueue(job)?;
                info!(
                    device_id = %device_id,
                    bytes = job.receipt_bytes.len(),
                    "Receipt queued for relay pickup"
                );
                Ok(SendOutcome::Accepted)
            }
        }
    }
}
