//! Final ordering of aggregated scores.

use data_loader::MovieId;
use serde::Serialize;

/// How many movies a run reports unless told otherwise
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMovie {
    pub movie_id: MovieId,
    pub score: f64,
}

/// Aggregated scores ordered best first.
///
/// Sorted by score descending, then by movie id ascending so that equal
/// scores always come out in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedList {
    entries: Vec<RankedMovie>,
}

impl RankedList {
    pub fn from_snapshot(snapshot: impl IntoIterator<Item = (MovieId, f64)>) -> Self {
        let mut entries: Vec<RankedMovie> = snapshot
            .into_iter()
            .map(|(movie_id, score)| RankedMovie { movie_id, score })
            .collect();

        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });

        Self { entries }
    }

    /// The best `k` entries (fewer if the list is shorter)
    pub fn top(&self, k: usize) -> &[RankedMovie] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn entries(&self) -> &[RankedMovie] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, f64)]) -> Vec<(MovieId, f64)> {
        pairs.iter().map(|(m, s)| (m.to_string(), *s)).collect()
    }

    fn ids(movies: &[RankedMovie]) -> Vec<&str> {
        movies.iter().map(|m| m.movie_id.as_str()).collect()
    }

    #[test]
    fn test_sorts_by_score_descending() {
        let ranked = RankedList::from_snapshot(snapshot(&[("a", 1.0), ("b", 9.0), ("c", 4.5)]));
        assert_eq!(ids(ranked.entries()), vec!["b", "c", "a"]);
        assert_eq!(ranked.entries()[0].score, 9.0);
    }

    #[test]
    fn test_ties_break_on_movie_id() {
        let ranked = RankedList::from_snapshot(snapshot(&[
            ("m3", 2.0),
            ("m1", 2.0),
            ("m9", 5.0),
            ("m2", 2.0),
        ]));
        assert_eq!(ids(ranked.entries()), vec!["m9", "m1", "m2", "m3"]);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let pairs = [("x", 1.0), ("y", 1.0), ("z", 3.0), ("w", 0.5)];
        let forward = RankedList::from_snapshot(snapshot(&pairs));
        let mut reversed = pairs;
        reversed.reverse();
        let backward = RankedList::from_snapshot(snapshot(&reversed));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_top_k() {
        let ranked = RankedList::from_snapshot(snapshot(&[
            ("a", 1.0),
            ("b", 2.0),
            ("c", 3.0),
            ("d", 4.0),
        ]));
        assert_eq!(ids(ranked.top(DEFAULT_TOP_K)), vec!["d", "c", "b"]);
        assert_eq!(ranked.top(10).len(), 4);
        assert!(ranked.top(0).is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let ranked = RankedList::from_snapshot(Vec::new());
        assert!(ranked.is_empty());
        assert!(ranked.top(3).is_empty());
    }
}
