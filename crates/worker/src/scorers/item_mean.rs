//! Baseline scorer: each unseen movie's mean rating.

use std::collections::BTreeMap;

use data_loader::MovieId;

use super::Scorer;
use crate::matrix::UserItemMatrix;

/// Predicts the average rating other users gave a movie.
///
/// Cheap and deterministic; useful as a sanity check next to the
/// factorization model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemMeanScorer;

impl Scorer for ItemMeanScorer {
    fn name(&self) -> &str {
        "ItemMeanScorer"
    }

    fn score(&self, matrix: &UserItemMatrix, target_user_id: &str) -> BTreeMap<MovieId, f64> {
        let mut totals: BTreeMap<&MovieId, (f64, u32)> = BTreeMap::new();
        for (user_id, movie_id, score) in matrix.entries() {
            if user_id == target_user_id || matrix.has_rated(target_user_id, movie_id) {
                continue;
            }
            let entry = totals.entry(movie_id).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }

        totals
            .into_iter()
            .map(|(movie_id, (sum, count))| (movie_id.clone(), sum / count as f64))
            .collect()
    }
}
