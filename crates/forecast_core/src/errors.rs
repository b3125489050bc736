//! Error types for the forecast core

use crate::gbdt::ModelError;
use crate::validation::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or cross-checking startup artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode JSON artifact {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode bincode artifact {path}: {source}")]
    Bincode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("unsupported artifact format for {path} (expected .json or .bin)")]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid model: {0}")]
    Model(#[from] ModelError),

    /// Artifacts decoded fine but disagree with each other or with the feature schema
    #[error("inconsistent artifacts: {0}")]
    Inconsistent(String),
}

/// Errors raised by the transformer for rows it cannot turn into features
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("record {id}: unparseable date {date:?}")]
    InvalidDate { id: i64, date: String },

    #[error("record {id}: store {store} has no attributes")]
    JoinMiss { id: i64, store: i64 },

    #[error("record {id}: value {value:?} of column {column} has no encoding")]
    UnknownCategory {
        id: i64,
        column: &'static str,
        value: String,
    },
}

/// Errors returned by [`crate::service::PredictionService::predict`]
#[derive(Error, Debug)]
pub enum PredictError {
    /// A record failed its field checks; the whole batch is rejected
    #[error("{source}")]
    Validation {
        index: usize,
        id: i64,
        #[source]
        source: ValidationError,
    },

    #[error("service not ready: {0}")]
    NotReady(String),

    #[error("batch of {size} records exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("record {id}: store {store} has no attributes")]
    JoinMiss { id: i64, store: i64 },

    #[error("record {id}: value {value:?} of column {column} has no encoding")]
    UnknownCategory {
        id: i64,
        column: &'static str,
        value: String,
    },

    #[error("model failure: {0}")]
    Model(#[from] ModelError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PredictError {
    /// Whether the caller sent something the service cannot accept, as
    /// opposed to the service itself being unable to answer.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::Validation { .. }
                | PredictError::BatchTooLarge { .. }
                | PredictError::JoinMiss { .. }
                | PredictError::UnknownCategory { .. }
        )
    }
}

impl From<TransformError> for PredictError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::JoinMiss { id, store } => PredictError::JoinMiss { id, store },
            TransformError::UnknownCategory { id, column, value } => {
                PredictError::UnknownCategory { id, column, value }
            }
            // validated records always carry a parseable date
            TransformError::InvalidDate { .. } => PredictError::Internal(err.to_string()),
        }
    }
}

/// Result type for artifact loading
pub type Result<T> = std::result::Result<T, ArtifactError>;
