//! Sparse user-item matrix built from a shard.

use std::collections::{BTreeMap, BTreeSet};

use data_loader::{MovieId, UserId};
use protocol::Shard;

/// Ratings keyed by user, then by movie.
///
/// Backed by `BTreeMap`s so iteration order is stable, which keeps the
/// scorers deterministic for a given shard. A later rating for the same
/// `(user, movie)` pair replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct UserItemMatrix {
    ratings: BTreeMap<UserId, BTreeMap<MovieId, f64>>,
}

impl UserItemMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_shard(shard: &Shard) -> Self {
        let mut matrix = Self::new();
        for rating in &shard.ratings {
            matrix.insert(&rating.user_id, &rating.movie_id, rating.score);
        }
        matrix
    }

    pub fn insert(&mut self, user_id: &str, movie_id: &str, score: f64) {
        self.ratings
            .entry(user_id.to_string())
            .or_default()
            .insert(movie_id.to_string(), score);
    }

    pub fn user_ratings(&self, user_id: &str) -> Option<&BTreeMap<MovieId, f64>> {
        self.ratings.get(user_id)
    }

    pub fn has_rated(&self, user_id: &str, movie_id: &str) -> bool {
        self.ratings
            .get(user_id)
            .is_some_and(|movies| movies.contains_key(movie_id))
    }

    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.ratings.keys()
    }

    /// Every movie rated by anyone, in id order
    pub fn movies(&self) -> BTreeSet<&MovieId> {
        self.ratings.values().flat_map(|movies| movies.keys()).collect()
    }

    /// Movies someone rated but `user_id` did not
    pub fn unrated_movies(&self, user_id: &str) -> Vec<&MovieId> {
        self.movies()
            .into_iter()
            .filter(|movie_id| !self.has_rated(user_id, movie_id))
            .collect()
    }

    /// All `(user, movie, score)` entries in key order
    pub fn entries(&self) -> impl Iterator<Item = (&UserId, &MovieId, f64)> {
        self.ratings.iter().flat_map(|(user_id, movies)| {
            movies
                .iter()
                .map(move |(movie_id, score)| (user_id, movie_id, *score))
        })
    }

    /// Number of stored ratings
    pub fn len(&self) -> usize {
        self.ratings.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Mean of all stored ratings, 0 when empty
    pub fn global_mean(&self) -> f64 {
        let count = self.len();
        if count == 0 {
            return 0.0;
        }
        self.entries().map(|(_, _, score)| score).sum::<f64>() / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::Rating;

    fn shard() -> Shard {
        Shard {
            target_user_id: "T".to_string(),
            ratings: vec![
                Rating::new("T", "M1", 5.0),
                Rating::new("A", "M1", 4.0),
                Rating::new("A", "M2", 2.0),
                Rating::new("B", "M3", 3.0),
                Rating::new("A", "M2", 1.0),
            ],
        }
    }

    #[test]
    fn test_from_shard_keeps_latest_duplicate() {
        let matrix = UserItemMatrix::from_shard(&shard());
        assert_eq!(matrix.len(), 4);
        assert_eq!(matrix.user_ratings("A").unwrap()["M2"], 1.0);
        assert_eq!(matrix.users().count(), 3);
    }

    #[test]
    fn test_unrated_movies() {
        let matrix = UserItemMatrix::from_shard(&shard());
        let unrated: Vec<&str> = matrix
            .unrated_movies("T")
            .into_iter()
            .map(String::as_str)
            .collect();
        assert_eq!(unrated, vec!["M2", "M3"]);
        assert!(matrix.has_rated("T", "M1"));
    }

    #[test]
    fn test_global_mean() {
        let matrix = UserItemMatrix::from_shard(&shard());
        assert_eq!(matrix.global_mean(), (5.0 + 4.0 + 1.0 + 3.0) / 4.0);
        assert_eq!(UserItemMatrix::new().global_mean(), 0.0);
    }
}
