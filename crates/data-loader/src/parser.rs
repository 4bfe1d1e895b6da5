//! Parser for the ratings CSV file.
//!
//! Format (first line is a header and is skipped):
//! `movieId,userId,rating`
//!
//! Blank lines are ignored. Rows with the wrong field count, an empty id, or a
//! non-numeric rating are logged and skipped; only I/O failures abort the load.

use crate::error::{DataLoadError, Result};
use crate::types::Rating;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use tracing::warn;

const EXPECTED_FIELDS: usize = 3;

/// Parse the ratings file at `path`, reading at most `max_records` data rows
pub fn parse_ratings(path: &Path, max_records: Option<usize>) -> Result<Vec<Rating>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    parse_ratings_from_reader(BufReader::new(file), &file_name, max_records)
}

/// Parse ratings from any buffered reader.
///
/// `file_name` is only used to label skipped rows in the log. `max_records`
/// counts accepted rows, so skipped rows never eat into the limit.
pub fn parse_ratings_from_reader<R: BufRead>(
    reader: R,
    file_name: &str,
    max_records: Option<usize>,
) -> Result<Vec<Rating>> {
    let limit = max_records.unwrap_or(usize::MAX);
    let mut ratings = Vec::new();
    let mut skipped = 0usize;

    // Skip the header row
    for (idx, line) in reader.lines().enumerate().skip(1) {
        if ratings.len() >= limit {
            break;
        }
        let line = line?;
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }

        match parse_rating_row(line_trimmed, file_name, line_no) {
            Ok(rating) => ratings.push(rating),
            Err(e) => {
                warn!(error = %e, "Skipping malformed rating row");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(file = file_name, skipped, kept = ratings.len(), "Dataset contained malformed rows");
    }

    Ok(ratings)
}

/// Parse a single `movieId,userId,rating` row
fn parse_rating_row(line: &str, file_name: &str, line_no: usize) -> Result<Rating> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != EXPECTED_FIELDS {
        return Err(DataLoadError::FieldCountMismatch {
            expected: EXPECTED_FIELDS,
            found: fields.len(),
            line: line_no,
        });
    }

    let (movie_id, user_id, score) = (fields[0], fields[1], fields[2]);
    if movie_id.is_empty() || user_id.is_empty() {
        return Err(DataLoadError::ParseError {
            file: file_name.to_string(),
            line: line_no,
            reason: "Empty identifier".to_string(),
        });
    }

    let score: f64 = score.parse().map_err(|e| DataLoadError::ParseError {
        file: file_name.to_string(),
        line: line_no,
        reason: format!("Invalid rating: {}", e),
    })?;

    Ok(Rating::new(user_id, movie_id, score))
}
