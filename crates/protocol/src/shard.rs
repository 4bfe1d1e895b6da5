//! The unit of work handed to a single worker.

use data_loader::{Rating, UserId};
use serde::{Deserialize, Serialize};

/// One worker's slice of the dataset.
///
/// `ratings` starts with a full copy of the target user's ratings, followed
/// by the subset of the remaining dataset assigned to this shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub target_user_id: UserId,
    pub ratings: Vec<Rating>,
}

impl Shard {
    pub fn new(target_user_id: impl Into<UserId>) -> Self {
        Self {
            target_user_id: target_user_id.into(),
            ratings: Vec::new(),
        }
    }

    /// Ratings given by the target user
    pub fn target_ratings(&self) -> impl Iterator<Item = &Rating> {
        self.ratings
            .iter()
            .filter(move |rating| rating.user_id == self.target_user_id)
    }

    /// Ratings given by anyone other than the target user
    pub fn other_ratings(&self) -> impl Iterator<Item = &Rating> {
        self.ratings
            .iter()
            .filter(move |rating| rating.user_id != self.target_user_id)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}
