//! Gradient boosted tree ensemble
//!
//! The model names its input features, so the feature table is projected
//! onto them by column name rather than by position. Prediction is
//! `base_score + sum(tree_leaf * tree_weight)` per row.

use super::tree::Tree;
use crate::features::FeatureTable;
use crate::model::{feature_matrix, ModelError, Regressor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Current model format version
pub const MODEL_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    /// Input features, in the order tree nodes index them
    pub feature_names: Vec<String>,

    /// Constant added to every prediction
    #[serde(default)]
    pub base_score: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,
}

impl Model {
    pub fn new(feature_names: Vec<String>, trees: Vec<Tree>, base_score: f64) -> Self {
        Self {
            version: MODEL_VERSION,
            feature_names,
            base_score,
            trees,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.feature_names.is_empty() {
            return Err(ModelError::ValidationFailed(
                "Model declares no input features".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.feature_names {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::ValidationFailed(format!(
                    "Duplicate feature name: {name}"
                )));
            }
        }

        if !self.base_score.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid base_score: {}",
                self.base_score
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_names.len()).map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Score a single feature vector laid out as `feature_names`.
    pub fn score(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |sum, tree| {
                sum + tree.evaluate(features) * tree.weight
            })
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        let value = canonicalize(serde_json::to_value(self)?);
        Ok(serde_json::to_string(&value)?)
    }

    /// Blake3 hash of the canonical JSON representation, as hex
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        let json = self.to_canonical_json()?;
        Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
    }

    /// Get number of trees in the model
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for Model {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        let matrix = feature_matrix(table, &self.feature_names)?;
        Ok(matrix.iter().map(|row| self.score(row)).collect())
    }

    fn fingerprint(&self) -> String {
        self.hash_hex().unwrap_or_else(|_| String::from("unhashable"))
    }

    fn validate(&self) -> Result<(), ModelError> {
        Model::validate(self)
    }
}

/// Recursively sort object keys so equal models hash equally.
fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize).collect())
        }
        other => other,
    }
}
