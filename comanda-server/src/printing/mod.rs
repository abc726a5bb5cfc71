//! Receipt Print Job Module
//!
//! Turns a completed order into an ESC/POS byte stream and reliably gets it
//! to the venue's thermal printer:
//! - Renderer: order snapshot -> printer bytes (pure, deterministic)
//! - Job store: durable redb-backed queue with atomic status transitions
//! - Dispatcher: network socket or Bluetooth-relay hand-off
//! - Worker/sweeper: retries with backoff, stale-claim recovery

pub mod dispatcher;
pub mod money;
pub mod renderer;
pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

pub use dispatcher::{DispatchError, DispatchResult, TransportDispatcher};
pub use renderer::{ReceiptRenderer, RenderError, RenderResult};
pub use service::{IntakeReceipt, PrintService, PrintServiceError, PrintServiceResult, RelayOutcome};
pub use storage::{JobStore, JobStoreError, JobStoreResult, JobStoreStats};
pub use types::*;
pub use worker::{PrintWorker, RetryPolicy, StaleSweeper};
