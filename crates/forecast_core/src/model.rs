//! The scoring seam between the prediction service and a fitted model

use crate::features::{FeatureTable, FeatureValue};
use salescast_types::columns::column_index;
use thiserror::Error;

/// Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Feature table has no column {0:?} required by the model")]
    MissingFeature(String),

    #[error("Model returned {got} predictions for {expected} rows")]
    RowCountMismatch { expected: usize, got: usize },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A fitted regression model: one prediction per feature-table row, in row
/// order. Implementations are immutable and shared across requests.
pub trait Regressor: Send + Sync {
    /// Names of the input features, in the order the model consumes them
    fn feature_names(&self) -> &[String];

    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, ModelError>;

    /// Stable identifier of the fitted artifact, for health reporting
    fn fingerprint(&self) -> String;

    /// Structural checks that must pass before the model is served
    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Features the model needs that the transformer never produces
    fn unknown_features(&self) -> Vec<&str> {
        self.feature_names()
            .iter()
            .map(String::as_str)
            .filter(|name| column_index(name).is_none())
            .collect()
    }
}

/// Project the table onto `feature_names`, by column name.
///
/// Unencoded categorical cells become NaN, i.e. a missing feature.
pub fn feature_matrix(
    table: &FeatureTable,
    feature_names: &[String],
) -> Result<Vec<Vec<f64>>, ModelError> {
    let indices = feature_names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| ModelError::MissingFeature(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(table
        .rows()
        .iter()
        .map(|row| {
            indices
                .iter()
                .map(|&i| model_input(&row[i]))
                .collect()
        })
        .collect())
}

/// Cell value as the model sees it.
pub fn model_input(value: &FeatureValue) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}
