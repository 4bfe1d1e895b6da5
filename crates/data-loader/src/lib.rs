//! # Data Loader Crate
//!
//! Loads the ratings dataset that the coordinator partitions across workers.
//!
//! ## Main Components
//!
//! - **types**: `Rating` and the `RatingIndex` built over a dataset
//! - **parser**: Parse the `movieId,userId,rating` CSV into `Rating`s
//! - **index**: Load an index from disk and split out the target user
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::RatingIndex;
//! use std::path::Path;
//!
//! let index = RatingIndex::load_from_file(Path::new("dataset.csv"), Some(200_000))?;
//! let (target, remaining) = index.split_for_target("42")?;
//! ```

pub mod error;
pub mod types;
pub mod parser;
pub mod index;

pub use error::{DataLoadError, Result};
pub use types::{MovieId, Rating, RatingIndex, UserId};
