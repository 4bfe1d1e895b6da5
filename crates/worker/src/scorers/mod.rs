//! Scoring strategies a worker can plug in.
//!
//! The wire protocol does not care how predictions are produced, so every
//! strategy implements the same `Scorer` trait and the worker picks one at
//! startup.

pub mod factorization;
pub mod item_mean;

pub use factorization::FactorizationScorer;
pub use item_mean::ItemMeanScorer;

use std::collections::BTreeMap;

use data_loader::MovieId;

use crate::matrix::UserItemMatrix;

/// Core trait for predicting scores for a target user.
///
/// `Send + Sync` lets a scorer move onto a blocking thread and be shared
/// between concurrent shards.
pub trait Scorer: Send + Sync {
    /// Returns the name of this scorer (for logging)
    fn name(&self) -> &str;

    /// Predict a score for every movie in `matrix` that `target_user_id`
    /// has not rated.
    fn score(&self, matrix: &UserItemMatrix, target_user_id: &str) -> BTreeMap<MovieId, f64>;
}
