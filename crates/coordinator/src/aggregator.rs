//! Shared accumulator for partial scores.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use data_loader::MovieId;

/// Running per-movie sums of partial scores from every session.
///
/// One instance is created per run and handed to each session behind an
/// `Arc`. Each `add` holds the lock for a single map update, so sessions
/// contend only briefly. Since summation is commutative the final map does
/// not depend on how merges from different sessions interleave.
#[derive(Debug, Default)]
pub struct Aggregator {
    scores: Mutex<HashMap<MovieId, f64>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the running sum for `movie_id`, starting from 0
    pub fn add(&self, movie_id: &str, delta: f64) {
        let mut scores = self.lock();
        match scores.get_mut(movie_id) {
            Some(sum) => *sum += delta,
            None => {
                scores.insert(movie_id.to_string(), delta);
            }
        }
    }

    /// Current sum for a single movie
    pub fn get(&self, movie_id: &str) -> Option<f64> {
        self.lock().get(movie_id).copied()
    }

    /// All `(movie_id, sum)` pairs, ordered by movie id.
    ///
    /// Meant to be called once the join barrier has released; earlier calls
    /// see whatever has been merged so far.
    pub fn snapshot(&self) -> Vec<(MovieId, f64)> {
        let mut pairs: Vec<(MovieId, f64)> = self
            .lock()
            .iter()
            .map(|(movie_id, sum)| (movie_id.clone(), *sum))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic mid-update cannot leave a half-applied `+=`, so a poisoned
    // map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<MovieId, f64>> {
        self.scores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
