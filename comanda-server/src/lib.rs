//! Comanda Print Server - receipt print job subsystem for restaurant venues
//!
//! # Architecture overview
//!
//! A payment confirmation comes in once (or more than once; intake is
//! idempotent), becomes a durable print job, and a worker pool drives it to
//! a terminal state against one of two transports:
//!
//! - **Network**: raw TCP to the venue's thermal printer (port 9100)
//! - **Bluetooth relay**: bytes are queued for a venue-local companion
//!   device that pulls and confirms them
//!
//! # Module structure
//!
//! ```text
//! comanda-server/src/
//! ├── core/          # Configuration, state, HTTP server, background tasks
//! ├── printing/      # Renderer, job store, dispatcher, worker, service
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # Errors, logging, time
//! ```

pub mod api;
pub mod core;
pub mod printing;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState};
pub use printing::{
    IntakeReceipt, JobStatus, JobStore, OrderData, PrintJob, PrintService, PrinterDescriptor,
    ReceiptRenderer, RelayOutcome, RetryPolicy, SendOutcome, TransportKind,
};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Prepare the process environment: dotenv, working directory, logging
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}
