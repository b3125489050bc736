//! Decision tree structures for GBDT inference
//!
//! Splits follow the usual boosted-tree convention: a row goes left when
//! `feature < threshold`, and rows whose feature is missing (NaN) follow the
//! node's default direction.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the model's feature list
/// - `left` and `right` point to child node indices
/// - `default_left` picks the branch for missing values
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1` indicates this is a leaf
/// - `leaf` contains the prediction value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold
    pub threshold: f64,

    /// Branch taken when the feature value is missing
    #[serde(default = "default_left")]
    pub default_left: bool,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

fn default_left() -> bool {
    true
}

impl Node {
    /// Create a new internal (split) node; missing values go left
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            default_left: true,
            leaf: None,
        }
    }

    /// Same node, sending missing values right instead
    pub fn missing_right(mut self) -> Self {
        self.default_left = false;
        self
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            default_left: true,
            leaf: Some(value),
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Get the leaf value if this is a leaf node
    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }
}

/// A single regression tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to this tree's leaf value
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Evaluate this tree on a feature vector and return the raw leaf value
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }

        let mut idx = 0usize;

        // a root-to-leaf path visits each node at most once
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0; // Invalid tree structure
            };

            if node.is_leaf() {
                return node.leaf_value().unwrap_or(0.0);
            }

            let feature_idx = node.feature_idx as usize;
            let Some(&value) = features.get(feature_idx) else {
                return 0.0; // Invalid feature index
            };

            let go_left = if value.is_nan() {
                node.default_left
            } else {
                value < node.threshold
            };

            let next = if go_left { node.left } else { node.right };
            if next < 0 || next as usize >= self.nodes.len() {
                return 0.0;
            }
            idx = next as usize;
        }

        0.0 // cycle
    }

    /// Validate tree structure against the model's feature count
    pub fn validate(&self, num_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left < 0 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }

                if node.right < 0 || node.right as usize >= self.nodes.len() {
                    return Err(format!(
                        "Node {} has invalid right child: {}",
                        i, node.right
                    ));
                }

                // children must come after their parent, which also rules out cycles
                if node.left as usize <= i || node.right as usize <= i {
                    return Err(format!("Node {i} points backwards"));
                }

                if node.feature_idx < 0 || node.feature_idx as usize >= num_features {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }

                if !node.threshold.is_finite() {
                    return Err(format!("Internal node {i} has a non-finite threshold"));
                }
            } else {
                match node.leaf {
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                    Some(v) if !v.is_finite() => {
                        return Err(format!("Leaf node {i} has a non-finite value"))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }
}
