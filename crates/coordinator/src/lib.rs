//! # Coordinator Crate
//!
//! Partitions a ratings dataset across worker nodes, sends each worker its
//! shard over TCP, sums the partial scores they send back and ranks the
//! result for a single target user.
//!
//! ## Pipeline
//! 1. `partitioner` builds one shard per worker (target ratings + a
//!    round-robin slice of everything else)
//! 2. `Coordinator` accepts one connection per shard and spawns a `Session`
//!    for each
//! 3. Each session merges result lines into a shared `Aggregator`
//! 4. The join barrier waits for every session to close
//! 5. `RankedList` orders the aggregate, best first
//!
//! ## Example Usage
//! ```ignore
//! use coordinator::{partitioner, Coordinator, CoordinatorConfig, DEFAULT_TOP_K};
//!
//! let shards = partitioner::shards_for_target(&index, "42", 4)?;
//! let coordinator = Coordinator::bind(CoordinatorConfig::new("localhost:15000", 4)).await?;
//! let summary = coordinator.recommend(shards).await;
//! for movie in summary.ranked.top(DEFAULT_TOP_K) {
//!     println!("{} {:.2}", movie.movie_id, movie.score);
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod partitioner;
pub mod ranking;
pub mod session;

pub use aggregator::Aggregator;
pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, RunReport, RunSummary};
pub use error::{CoordinatorError, Result, SessionError};
pub use ranking::{RankedList, RankedMovie, DEFAULT_TOP_K};
pub use session::{Session, SessionFailure, SessionOutcome, SessionState};
