//! Worker node for distributed recommendation scoring.
//!
//! A worker connects to the coordinator, receives one shard (the target
//! user's ratings plus a slice of the dataset), builds a sparse user-item
//! matrix from it, predicts scores for the movies the target has not rated
//! and streams them back as partial scores.
//!
//! ## Example Usage
//! ```ignore
//! use std::sync::Arc;
//! use worker::{FactorizationScorer, WorkerNode};
//!
//! let node = WorkerNode::connect("localhost:15000", Arc::new(FactorizationScorer::new())).await?;
//! let report = node.run().await?;
//! ```

pub mod matrix;
pub mod node;
pub mod scorers;

pub use matrix::UserItemMatrix;
pub use node::{serve, WorkerNode, WorkerReport};
pub use scorers::{FactorizationScorer, ItemMeanScorer, Scorer};
