//! HTTP interface for the salescast prediction service.
//!
//! Routes:
//! - `POST /predict`: score a JSON array of prediction requests
//! - `GET /health`: readiness, 503 while the artifacts are not loaded
//! - `GET /version`: crate version and build commit
//! - `GET /metrics`: Prometheus text exposition

pub mod server;

#[cfg(test)]
mod server_tests;

pub use server::{
    build_router, describe_metrics, start_server, AppState, DEFAULT_MAX_BODY_BYTES, GIT_COMMIT,
    PREDICT_RECORDS_TOTAL, PREDICT_REJECTED_TOTAL, PREDICT_REQUESTS_TOTAL,
};
