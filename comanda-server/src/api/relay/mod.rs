//! Relay API Module
//!
//! Pull/confirm contract for the venue-local Bluetooth companion device.

mod handler;

use axum::{Router, routing::get, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/relay", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{restaurant_id}/next", get(handler::pull))
        .route("/{job_id}/confirm", post(handler::confirm))
}
