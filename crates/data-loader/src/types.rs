//! Core domain types for the ratings dataset.
//!
//! Identifiers are opaque strings on the wire and in the CSV input, so they
//! stay strings here. Type aliases keep user IDs and movie IDs apart in
//! signatures even though both are `String` underneath.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================

/// Opaque identifier for a user
pub type UserId = String;

/// Opaque identifier for a movie
pub type MovieId = String;

// =============================================================================
// Rating
// =============================================================================

/// One user's score for one movie.
///
/// Ratings are never mutated after parsing; shards and indices hold clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub score: f64,
}

impl Rating {
    pub fn new(user_id: impl Into<UserId>, movie_id: impl Into<MovieId>, score: f64) -> Self {
        Self {
            user_id: user_id.into(),
            movie_id: movie_id.into(),
            score,
        }
    }
}

// =============================================================================
// RatingIndex
// =============================================================================

/// In-memory index over a ratings dataset.
///
/// Ratings are kept in the order they were read so that everything derived
/// from the index (in particular shard assignment) is reproducible for a
/// given input file. `user_ratings` maps a user to row positions in
/// `ratings`.
#[derive(Debug, Default, Clone)]
pub struct RatingIndex {
    pub(crate) ratings: Vec<Rating>,
    pub(crate) user_ratings: HashMap<UserId, Vec<usize>>,
}

impl RatingIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from ratings in their given order
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let mut index = Self::new();
        for rating in ratings {
            index.insert_rating(rating);
        }
        index
    }

    /// Append a rating, keeping the per-user row list in sync
    pub fn insert_rating(&mut self, rating: Rating) {
        let row = self.ratings.len();
        self.user_ratings
            .entry(rating.user_id.clone())
            .or_default()
            .push(row);
        self.ratings.push(rating);
    }

    /// All ratings in file order
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Ratings given by `user_id`, in file order. Empty if the user is unknown.
    pub fn user_ratings(&self, user_id: &str) -> Vec<Rating> {
        self.user_ratings
            .get(user_id)
            .map(|rows| rows.iter().map(|&row| self.ratings[row].clone()).collect())
            .unwrap_or_default()
    }

    /// Every rating not given by `user_id`, in file order
    pub fn remaining_ratings(&self, user_id: &str) -> Vec<Rating> {
        self.ratings
            .iter()
            .filter(|rating| rating.user_id != user_id)
            .cloned()
            .collect()
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.user_ratings.contains_key(user_id)
    }

    /// Number of distinct users
    pub fn user_count(&self) -> usize {
        self.user_ratings.len()
    }

    /// Number of ratings
    pub fn rating_count(&self) -> usize {
        self.ratings.len()
    }
}
