//! Round-robin sharding of the dataset around a target user.

use crate::error::{CoordinatorError, Result};
use data_loader::{Rating, RatingIndex};
use protocol::Shard;
use tracing::{debug, instrument};

/// Split the dataset into `num_shards` shards.
///
/// Every shard starts with a full copy of `target`. The ratings in
/// `remaining` are then dealt out by index, `remaining[i]` going to shard
/// `i % num_shards`, so the assignment depends only on input order and
/// never groups a user's ratings together.
pub fn split(remaining: &[Rating], target: &[Rating], num_shards: usize) -> Result<Vec<Shard>> {
    if num_shards == 0 {
        return Err(CoordinatorError::InvalidShardCount(num_shards));
    }
    let target_user_id = &target.first().ok_or(CoordinatorError::EmptyTarget)?.user_id;

    let per_shard = target.len() + remaining.len().div_ceil(num_shards);
    let mut shards: Vec<Shard> = (0..num_shards)
        .map(|_| {
            let mut ratings = Vec::with_capacity(per_shard);
            ratings.extend_from_slice(target);
            Shard {
                target_user_id: target_user_id.clone(),
                ratings,
            }
        })
        .collect();

    for (i, rating) in remaining.iter().enumerate() {
        shards[i % num_shards].ratings.push(rating.clone());
    }

    Ok(shards)
}

/// Resolve `target_user_id` in `index` and split the dataset around it
#[instrument(skip(index))]
pub fn shards_for_target(
    index: &RatingIndex,
    target_user_id: &str,
    num_shards: usize,
) -> Result<Vec<Shard>> {
    let (target, remaining) = index.split_for_target(target_user_id)?;
    let shards = split(&remaining, &target, num_shards)?;
    debug!(
        "Built {} shards ({} target ratings each, {} remaining ratings dealt)",
        shards.len(),
        target.len(),
        remaining.len()
    );
    Ok(shards)
}
