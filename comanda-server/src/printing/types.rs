//! Receipt print job types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Venue identity printed in the receipt header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueInfo {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

/// A single order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub quantity: i32,
    pub name: String,
    /// Unit price in euros
    pub unit_price: f64,
    /// Line total (quantity * unit_price, adjustments already applied)
    pub total: f64,
}

/// Immutable snapshot of a completed order
///
/// Stored on the job at intake and never re-fetched, so a render after a
/// process restart reproduces the exact same receipt even if the upstream
/// order record has changed since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderData {
    pub order_number: String,
    /// Payment/transaction identifier; the job id is derived from this
    pub payment_reference: String,
    pub venue: VenueInfo,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub tip: f64,
    pub total: f64,
    /// Customer free text; sanitized before it reaches the printer
    pub special_instructions: Option<String>,
    pub customer_name: Option<String>,
    /// Order placement time (unix millis); the only timestamp that appears
    /// on the receipt, so rendering never reads the clock
    pub placed_at: i64,
}

/// How a venue's printer is reached
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportKind {
    /// Direct TCP connection to the printer (raw port 9100)
    Network { host: String, port: u16 },
    /// Venue-local companion device pulls queued bytes and forwards them
    /// over a short-range link only it can reach
    BluetoothRelay { device_id: String },
}

fn default_paper_width() -> usize {
    48
}

/// Per-venue printer configuration, established at onboarding
///
/// Read by the dispatcher; not owned by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    pub restaurant_id: String,
    pub transport: TransportKind,
    /// Paper width in columns (58mm = 32, 80mm = 48)
    #[serde(default = "default_paper_width")]
    pub paper_width: usize,
}

/// Print job status state machine
///
/// Forward-moving except `Printing -> Pending` on a failed or stale attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Printing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Printing => write!(f, "printing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A durable receipt print job
///
/// Created once at intake, driven to a terminal state by the worker, and
/// retained afterwards as an audit trail. Never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    /// Derived from the payment reference, never random; re-submission of
    /// the same order maps to the same id
    pub job_id: String,
    pub restaurant_id: String,
    pub order_number: String,
    pub payment_reference: String,
    pub order_data: OrderData,
    /// Descriptor snapshot so dispatch survives restarts and config edits
    pub printer: PrinterDescriptor,
    /// Rendered protocol bytes; written once, reused on every retry
    pub receipt_bytes: Vec<u8>,
    pub status: JobStatus,
    /// Failed attempts so far; bounded by the configured maximum
    pub retry_count: u32,
    /// Last failure reason, cleared on success
    pub error_message: Option<String>,
    /// Earliest time (unix millis) the job may be claimed again
    pub next_attempt_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl PrintJob {
    /// Derive the job id from a payment reference
    ///
    /// `pj-` + first 24 hex chars of SHA-256. Deterministic so a duplicated
    /// payment confirmation can never create a second job.
    pub fn derive_id(payment_reference: &str) -> String {
        let digest = Sha256::digest(payment_reference.as_bytes());
        format!("pj-{}", &hex::encode(digest)[..24])
    }

    /// Build a fresh pending job from an order snapshot
    pub fn new(
        order: OrderData,
        printer: PrinterDescriptor,
        receipt_bytes: Vec<u8>,
        now: i64,
    ) -> Self {
        Self {
            job_id: Self::derive_id(&order.payment_reference),
            restaurant_id: printer.restaurant_id.clone(),
            order_number: order.order_number.clone(),
            payment_reference: order.payment_reference.clone(),
            order_data: order,
            printer,
            receipt_bytes,
            status: JobStatus::Pending,
            retry_count: 0,
            error_message: None,
            next_attempt_at: now,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Outcome of a transport send
///
/// The two transports give asymmetric guarantees, and the asymmetry is kept
/// as a tagged variant on purpose: `Delivered` means the printer's socket
/// took the full stream, `Accepted` only means the bytes are queued for a
/// relay. Callers must branch; collapsing this into a bool would let
/// unconfirmed relay acceptance pass for proof of printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Accepted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_deterministic() {
        let a = PrintJob::derive_id("stripe-ch_3abc");
        let b = PrintJob::derive_id("stripe-ch_3abc");
        assert_eq!(a, b);
        assert!(a.starts_with("pj-"));
        assert_eq!(a.len(), 3 + 24);
    }

    #[test]
    fn test_derive_id_distinct_references() {
        assert_ne!(
            PrintJob::derive_id("stripe-ch_3abc"),
            PrintJob::derive_id("stripe-ch_3abd")
        );
    }

    #[test]
    fn test_transport_kind_serde() {
        let t: TransportKind =
            serde_json::from_str(r#"{"kind":"network","host":"10.0.0.5","port":9100}"#).unwrap();
        assert!(matches!(t, TransportKind::Network { ref host, port: 9100 } if host == "10.0.0.5"));

        let t: TransportKind =
            serde_json::from_str(r#"{"kind":"bluetooth_relay","device_id":"tab-7"}"#).unwrap();
        assert!(matches!(t, TransportKind::BluetoothRelay { ref device_id } if device_id == "tab-7"));
    }
}
