//! Building a `RatingIndex` from disk and carving out the target user.

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::{Rating, RatingIndex};
use std::path::Path;
use tracing::{debug, info};

impl RatingIndex {
    /// Load a ratings CSV into an index.
    ///
    /// `max_records` caps the number of data rows read; `None` reads them all.
    pub fn load_from_file(path: &Path, max_records: Option<usize>) -> Result<Self> {
        info!("Loading ratings from {}", path.display());

        let ratings = parser::parse_ratings(path, max_records)?;
        let index = Self::from_ratings(ratings);

        info!(
            "Loaded {} ratings from {} users",
            index.rating_count(),
            index.user_count()
        );
        Ok(index)
    }

    /// Separate the target user's ratings from the rest of the dataset.
    ///
    /// Returns `(target, remaining)`, both in file order. Fails with
    /// `UserNotFound` when the user has no ratings, since an empty target
    /// set cannot seed any shard.
    pub fn split_for_target(&self, user_id: &str) -> Result<(Vec<Rating>, Vec<Rating>)> {
        let target = self.user_ratings(user_id);
        if target.is_empty() {
            return Err(DataLoadError::UserNotFound {
                user_id: user_id.to_string(),
            });
        }
        let remaining = self.remaining_ratings(user_id);
        debug!(
            "Target user {} has {} ratings, {} remaining",
            user_id,
            target.len(),
            remaining.len()
        );
        Ok((target, remaining))
    }
}
