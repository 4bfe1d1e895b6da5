//! Line codec for the coordinator/worker wire protocol.
//!
//! Coordinator to worker:
//! ```text
//! UserID: <targetUserID>
//! <userID>,<movieID>,<score>      (target ratings, then shard ratings)
//! END
//! ```
//!
//! Worker to coordinator:
//! ```text
//! <movieID> <score>               (one per prediction)
//! END
//! ```
//!
//! Writers in this module never flush; callers own the buffering policy and
//! flush once the whole message has been queued.

use crate::error::{ProtocolError, Result};
use crate::shard::Shard;
use data_loader::{MovieId, Rating};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Literal line terminating a shard or a result stream
pub const SENTINEL: &str = "END";

/// Prefix of the first line of a shard
pub const HEADER_PREFIX: &str = "UserID:";

// =============================================================================
// Shard encoding (coordinator side)
// =============================================================================

pub fn format_header(target_user_id: &str) -> String {
    format!("{} {}", HEADER_PREFIX, target_user_id)
}

/// `userID,movieID,score`, using the shortest lossless float representation
pub fn format_rating_line(rating: &Rating) -> String {
    format!("{},{},{}", rating.user_id, rating.movie_id, rating.score)
}

/// Every line of an encoded shard, header and sentinel included
pub fn encode_shard_lines(shard: &Shard) -> Vec<String> {
    let mut lines = Vec::with_capacity(shard.ratings.len() + 2);
    lines.push(format_header(&shard.target_user_id));
    lines.extend(shard.ratings.iter().map(format_rating_line));
    lines.push(SENTINEL.to_string());
    lines
}

/// Write a full shard, header through sentinel, without flushing
pub async fn write_shard<W: AsyncWrite + Unpin>(writer: &mut W, shard: &Shard) -> Result<()> {
    for line in encode_shard_lines(shard) {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}

// =============================================================================
// Shard decoding (worker side)
// =============================================================================

/// Extract the target user from a `UserID: <id>` header line
pub fn parse_header(line: &str) -> Option<&str> {
    line.strip_prefix(HEADER_PREFIX)
        .map(str::trim)
        .filter(|user_id| !user_id.is_empty())
}

/// Parse one `userID,movieID,score` line
pub fn parse_rating_line(line: &str) -> Result<Rating> {
    let malformed = |reason: &str| ProtocolError::MalformedRating {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 3 {
        return Err(malformed("expected 3 comma-separated fields"));
    }
    if fields[0].is_empty() || fields[1].is_empty() {
        return Err(malformed("empty identifier"));
    }
    let score = parse_score(fields[2]).ok_or_else(|| malformed("score is not a finite number"))?;

    Ok(Rating::new(fields[0], fields[1], score))
}

/// Read a shard up to and including the sentinel.
///
/// The first line must be the header. After it, every line up to the
/// sentinel is a rating, even one whose user id happens to look like a
/// header; malformed rating lines are logged and skipped. The stream must not
/// end before the sentinel.
pub async fn read_shard<R: AsyncBufRead + Unpin>(reader: R) -> Result<Shard> {
    let mut lines = reader.lines();
    let first = lines.next_line().await?.ok_or(ProtocolError::UnexpectedEof)?;
    let target_user_id = parse_header(&first)
        .ok_or(ProtocolError::MissingHeader)?
        .to_string();
    let mut ratings = Vec::new();
    let mut skipped = 0usize;

    loop {
        let line = lines.next_line().await?.ok_or(ProtocolError::UnexpectedEof)?;
        if line == SENTINEL {
            break;
        }
        match parse_rating_line(&line) {
            Ok(rating) => ratings.push(rating),
            Err(e) => {
                warn!("Skipping shard line: {}", e);
                skipped += 1;
            }
        }
    }

    debug!(
        "Decoded shard for user {}: {} ratings, {} skipped lines",
        target_user_id,
        ratings.len(),
        skipped
    );
    Ok(Shard {
        target_user_id,
        ratings,
    })
}

// =============================================================================
// Results (worker to coordinator)
// =============================================================================

pub fn format_result_line(movie_id: &str, score: f64) -> String {
    format!("{} {}", movie_id, score)
}

/// Parse one `<movieID> <score>` line.
///
/// Exactly two space-separated fields are accepted, and the score must be a
/// finite number so that a single bad line can never poison a sum.
pub fn parse_result_line(line: &str) -> Result<(MovieId, f64)> {
    let malformed = |reason: &str| ProtocolError::MalformedResult {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = line.split(' ');
    let (Some(movie_id), Some(score), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed("expected exactly 2 space-separated fields"));
    };
    if movie_id.is_empty() {
        return Err(malformed("empty movie id"));
    }
    let score = parse_score(score).ok_or_else(|| malformed("score is not a finite number"))?;

    Ok((movie_id.to_string(), score))
}

/// Write one result line per prediction followed by the sentinel, without flushing
pub async fn write_results<W, I, M>(writer: &mut W, results: I) -> Result<usize>
where
    W: AsyncWrite + Unpin,
    I: IntoIterator<Item = (M, f64)>,
    M: AsRef<str>,
{
    let mut written = 0;
    for (movie_id, score) in results {
        let line = format_result_line(movie_id.as_ref(), score);
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        written += 1;
    }
    writer.write_all(SENTINEL.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(written)
}

fn parse_score(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|score| score.is_finite())
}
