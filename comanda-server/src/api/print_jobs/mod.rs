//! Print Jobs API Module
//!
//! Intake boundary and operator status queries.

mod handler;

pub use handler::JobView;

use axum::{Router, routing::get, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/print-jobs", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::submit).get(handler::list))
        .route("/{id}", get(handler::get_by_id))
}
