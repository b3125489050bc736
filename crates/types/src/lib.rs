//! Shared data types for the salescast prediction service.

pub mod columns;
pub mod request;
pub mod store;

pub use request::{PredictionRequest, PredictionResult};
pub use store::StoreAttributes;
