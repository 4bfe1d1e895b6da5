//! Matrix factorization trained with stochastic gradient descent.
//!
//! ## Model
//! `r(u, i) ~ mu + b_u + b_i + p_u . q_i`
//!
//! - `mu`: global mean of the shard's ratings
//! - `b_u`, `b_i`: user and item biases
//! - `p_u`, `q_i`: latent factor vectors of length `factors`
//!
//! Each epoch visits every observed rating once, in an order shuffled by a
//! seeded RNG, and nudges the parameters against the prediction error with
//! L2 regularisation. Training is fully determined by the shard contents
//! and the seed.

use std::collections::{BTreeMap, HashMap};

use data_loader::MovieId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::Scorer;
use crate::matrix::UserItemMatrix;

/// Trained parameters, indexed by position in `users` / `movies`
struct Model {
    global_mean: f64,
    user_bias: Vec<f64>,
    item_bias: Vec<f64>,
    user_factors: Vec<Vec<f64>>,
    item_factors: Vec<Vec<f64>>,
}

impl Model {
    fn predict(&self, user: usize, item: usize) -> f64 {
        let dot: f64 = self.user_factors[user]
            .iter()
            .zip(&self.item_factors[item])
            .map(|(p, q)| p * q)
            .sum();
        self.global_mean + self.user_bias[user] + self.item_bias[item] + dot
    }
}

#[derive(Debug, Clone)]
pub struct FactorizationScorer {
    factors: usize,
    epochs: usize,
    learning_rate: f64,
    regularization: f64,
    seed: u64,
    min_score: f64,
    max_score: f64,
}

impl Default for FactorizationScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FactorizationScorer {
    pub fn new() -> Self {
        Self {
            factors: 3,
            epochs: 50,
            learning_rate: 0.01,
            regularization: 0.02,
            seed: 42,
            min_score: 1.0,
            max_score: 5.0,
        }
    }

    /// Number of latent factors (default: 3)
    pub fn with_factors(mut self, factors: usize) -> Self {
        self.factors = factors;
        self
    }

    /// Passes over the training data (default: 50)
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// SGD step size (default: 0.01)
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// L2 penalty on biases and factors (default: 0.02)
    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    /// Seed for factor initialisation and shuffling (default: 42)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Range predictions are clamped to (default: 1.0..=5.0)
    ///
    /// Bounds given in reverse order are swapped. A range with no usable
    /// bound (both NaN) leaves the current range in place.
    pub fn with_score_range(mut self, min_score: f64, max_score: f64) -> Self {
        let (low, high) = (min_score.min(max_score), min_score.max(max_score));
        if !low.is_nan() {
            self.min_score = low;
            self.max_score = high;
        }
        self
    }

    fn train(
        &self,
        samples: &[(usize, usize, f64)],
        users: usize,
        movies: usize,
        global_mean: f64,
    ) -> Model {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut init = |n: usize| -> Vec<Vec<f64>> {
            (0..n)
                .map(|_| (0..self.factors).map(|_| rng.random::<f64>() * 0.1).collect())
                .collect()
        };
        let user_factors = init(users);
        let item_factors = init(movies);

        let mut model = Model {
            global_mean,
            user_bias: vec![0.0; users],
            item_bias: vec![0.0; movies],
            user_factors,
            item_factors,
        };

        let (lr, reg) = (self.learning_rate, self.regularization);
        let mut order: Vec<usize> = (0..samples.len()).collect();
        for epoch in 0..self.epochs {
            order.shuffle(&mut rng);
            let mut squared_error = 0.0;

            for &sample in &order {
                let (u, i, rating) = samples[sample];
                let err = rating - model.predict(u, i);
                squared_error += err * err;

                model.user_bias[u] += lr * (err - reg * model.user_bias[u]);
                model.item_bias[i] += lr * (err - reg * model.item_bias[i]);
                for f in 0..self.factors {
                    let p = model.user_factors[u][f];
                    let q = model.item_factors[i][f];
                    model.user_factors[u][f] += lr * (err * q - reg * p);
                    model.item_factors[i][f] += lr * (err * p - reg * q);
                }
            }

            if epoch + 1 == self.epochs {
                debug!(
                    "Epoch {} training RMSE {:.4}",
                    epoch + 1,
                    (squared_error / samples.len().max(1) as f64).sqrt()
                );
            }
        }

        model
    }
}

impl Scorer for FactorizationScorer {
    fn name(&self) -> &str {
        "FactorizationScorer"
    }

    #[instrument(skip(self, matrix), fields(ratings = matrix.len()))]
    fn score(&self, matrix: &UserItemMatrix, target_user_id: &str) -> BTreeMap<MovieId, f64> {
        let users: Vec<&str> = matrix.users().map(String::as_str).collect();
        let movies: Vec<&MovieId> = matrix.movies().into_iter().collect();
        let user_pos: HashMap<&str, usize> = users.iter().enumerate().map(|(i, u)| (*u, i)).collect();
        let movie_pos: HashMap<&str, usize> = movies
            .iter()
            .enumerate()
            .map(|(i, m)| (m.as_str(), i))
            .collect();

        let Some(&target) = user_pos.get(target_user_id) else {
            debug!("Target user {} has no ratings in this shard", target_user_id);
            return BTreeMap::new();
        };

        let samples: Vec<(usize, usize, f64)> = matrix
            .entries()
            .map(|(user_id, movie_id, score)| {
                (user_pos[user_id.as_str()], movie_pos[movie_id.as_str()], score)
            })
            .collect();

        let model = self.train(&samples, users.len(), movies.len(), matrix.global_mean());

        let unrated = matrix.unrated_movies(target_user_id);
        debug!("Predicting {} unrated movies", unrated.len());
        unrated
            .par_iter()
            .map(|movie_id| {
                let prediction = model
                    .predict(target, movie_pos[movie_id.as_str()])
                    .clamp(self.min_score, self.max_score);
                ((*movie_id).clone(), prediction)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two taste groups: A-likers rate A movies 5 and B movies 1, and vice versa
    fn two_group_matrix() -> UserItemMatrix {
        let mut matrix = UserItemMatrix::new();
        for u in 0..6 {
            let likes_a = u % 2 == 0;
            for m in 0..4 {
                let (a, b) = if likes_a { (5.0, 1.0) } else { (1.0, 5.0) };
                matrix.insert(&format!("u{}", u), &format!("a{}", m), a);
                matrix.insert(&format!("u{}", u), &format!("b{}", m), b);
            }
        }
        // Target likes A movies and has not seen a3 or b3
        for m in 0..3 {
            matrix.insert("target", &format!("a{}", m), 5.0);
            matrix.insert("target", &format!("b{}", m), 1.0);
        }
        matrix
    }

    #[test]
    fn test_predicts_only_unrated_movies() {
        let matrix = two_group_matrix();
        let scores = FactorizationScorer::new().score(&matrix, "target");
        let movies: Vec<&str> = scores.keys().map(String::as_str).collect();
        assert_eq!(movies, vec!["a3", "b3"]);
    }

    #[test]
    fn test_learns_group_preference() {
        let matrix = two_group_matrix();
        let scores = FactorizationScorer::new()
            .with_epochs(500)
            .with_learning_rate(0.05)
            .score(&matrix, "target");
        assert!(
            scores["a3"] > scores["b3"],
            "expected a3 > b3, got {:?}",
            scores
        );
    }

    #[test]
    fn test_predictions_are_clamped() {
        let matrix = two_group_matrix();
        let scores = FactorizationScorer::new()
            .with_score_range(2.0, 3.0)
            .score(&matrix, "target");
        for score in scores.values() {
            assert!((2.0..=3.0).contains(score));
        }
    }

    #[test]
    fn test_reversed_score_range_is_swapped() {
        let matrix = two_group_matrix();
        let scores = FactorizationScorer::new()
            .with_score_range(3.0, 2.0)
            .score(&matrix, "target");
        assert!(!scores.is_empty());
        for score in scores.values() {
            assert!((2.0..=3.0).contains(score));
        }
    }

    #[test]
    fn test_nan_score_range_keeps_default() {
        let matrix = two_group_matrix();
        let scores = FactorizationScorer::new()
            .with_score_range(f64::NAN, f64::NAN)
            .score(&matrix, "target");
        for score in scores.values() {
            assert!((1.0..=5.0).contains(score));
        }
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let matrix = two_group_matrix();
        let a = FactorizationScorer::new().with_seed(7).score(&matrix, "target");
        let b = FactorizationScorer::new().with_seed(7).score(&matrix, "target");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_target_yields_nothing() {
        let matrix = two_group_matrix();
        assert!(FactorizationScorer::new().score(&matrix, "ghost").is_empty());
    }
}
