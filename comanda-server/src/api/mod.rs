//! API route modules
//!
//! # Structure
//!
//! - [`health`] - health check and queue statistics
//! - [`print_jobs`] - intake and operator status queries
//! - [`relay`] - pull/confirm contract for the Bluetooth companion device

pub mod health;
pub mod print_jobs;
pub mod relay;

use axum::Router;

use crate::core::ServerState;

/// Assemble the full application router
pub fn routes() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(print_jobs::router())
        .merge(relay::router())
}
