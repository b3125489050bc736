//! Store sales forecasting core
//!
//! Validates prediction requests, turns them into the feature layout a
//! fitted gradient boosted tree ensemble was trained on, and scores them.
//!
//! Modules:
//! - `validation`: Field-level checks on incoming requests
//! - `encoding`: Categorical encoding maps, keyed by column name
//! - `stores`: Static per-store attributes used by the join
//! - `features`: Request-to-feature transformation
//! - `model`: The `Regressor` seam between the service and a fitted model
//! - `gbdt`: Gradient boosted tree ensemble inference
//! - `artifacts`: Loading the startup artifacts from disk
//! - `service`: The prediction service tying it all together

pub mod artifacts;
pub mod encoding;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod model;
pub mod service;
pub mod stores;
pub mod validation;

pub use artifacts::ArtifactPaths;
pub use encoding::EncodingMaps;
pub use errors::{ArtifactError, PredictError, TransformError};
pub use features::{
    FeatureTable, FeatureTransformer, FeatureValue, JoinMissPolicy, TransformPolicy,
    UnknownCategoryPolicy,
};
pub use gbdt::Model;
pub use model::{ModelError, Regressor};
pub use service::{PredictionService, ServiceConfig, ServiceContext};
pub use stores::StoreTable;
pub use validation::{validate, ValidationError};

/// Crate version string, reported by `/version` and `/health`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
