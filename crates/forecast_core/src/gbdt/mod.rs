//! GBDT (Gradient Boosted Decision Tree) inference
//!
//! # Model Format
//!
//! Models are JSON documents:
//!
//! ```json
//! {
//!   "version": 1,
//!   "feature_names": ["Store", "DayOfWeek", "Promo"],
//!   "base_score": 0.5,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature":2,"threshold":0.5,"default_left":true,"leaf":null},
//!         {"id":1,"left":-1,"right":-1,"feature":-1,"threshold":0.0,"leaf":5234.1},
//!         {"id":2,"left":-1,"right":-1,"feature":-1,"threshold":0.0,"leaf":7011.9}
//!       ],
//!       "weight": 1.0
//!     }
//!   ]
//! }
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use salescast_forecast_core::gbdt::{Model, Node, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 0.5, 1, 2),
//!         Node::leaf(1, 5234.1),
//!         Node::leaf(2, 7011.9),
//!     ],
//!     1.0,
//! );
//! let model = Model::new(vec!["Promo".to_string()], vec![tree], 0.0);
//!
//! let sales = model.score(&[1.0]);
//! let hash = model.hash_hex().unwrap();
//! ```

pub mod model;
pub mod tree;

pub use crate::model::ModelError;
pub use model::{Model, MODEL_VERSION};
pub use tree::{Node, Tree};
