//! Per-connection protocol handler.
//!
//! A session drives one worker connection through
//! `SendingShard -> AwaitingSendComplete -> ReceivingResults -> Closed`.
//! Any I/O failure or deadline expiry jumps straight to `Closed`. Whatever
//! was merged into the aggregator before the failure stays there.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use protocol::{ProtocolError, Shard, SENTINEL};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SendingShard,
    AwaitingSendComplete,
    ReceivingResults,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::SendingShard => "sending shard",
            SessionState::AwaitingSendComplete => "awaiting send completion",
            SessionState::ReceivingResults => "receiving results",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a session closed early
#[derive(Debug)]
pub struct SessionFailure {
    /// State the session was in when it failed
    pub state: SessionState,
    pub error: SessionError,
}

/// What a session reports once it reaches `Closed`
#[derive(Debug)]
pub struct SessionOutcome {
    pub shard_index: usize,
    pub peer: Option<SocketAddr>,
    /// Result lines merged into the aggregator
    pub merged_lines: usize,
    /// Result lines ignored as malformed
    pub skipped_lines: usize,
    pub failure: Option<SessionFailure>,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Outcome for a connection that was never established
    pub(crate) fn accept_failed(shard_index: usize, error: std::io::Error) -> Self {
        Self {
            shard_index,
            peer: None,
            merged_lines: 0,
            skipped_lines: 0,
            failure: Some(SessionFailure {
                state: SessionState::SendingShard,
                error: SessionError::Connection(error),
            }),
        }
    }
}

/// Protocol handler for a single worker connection
pub struct Session<S> {
    shard_index: usize,
    peer: Option<SocketAddr>,
    stream: S,
    shard: Shard,
    aggregator: Arc<Aggregator>,
    io_timeout: Option<Duration>,
    state: SessionState,
    merged_lines: usize,
    skipped_lines: usize,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(shard_index: usize, stream: S, shard: Shard, aggregator: Arc<Aggregator>) -> Self {
        Self {
            shard_index,
            peer: None,
            stream,
            shard,
            aggregator,
            io_timeout: None,
            state: SessionState::SendingShard,
            merged_lines: 0,
            skipped_lines: 0,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Bound every read and write by `timeout` (default: no deadline)
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Drive the session to `Closed`. Never fails; errors land in the outcome.
    #[instrument(skip_all, fields(shard = self.shard_index, peer = ?self.peer))]
    pub async fn run(mut self) -> SessionOutcome {
        info!(
            "Session started: sending {} ratings for user {}",
            self.shard.len(),
            self.shard.target_user_id
        );

        let result = self.exchange().await;
        let failed_in = self.state;
        self.transition(SessionState::Closed);

        let failure = match result {
            Ok(()) => {
                info!(
                    "Session closed: merged {} results, skipped {} malformed lines",
                    self.merged_lines, self.skipped_lines
                );
                None
            }
            Err(error) => {
                warn!(
                    "Session aborted while {}: {} (merged {} results before failure)",
                    failed_in, error, self.merged_lines
                );
                Some(SessionFailure {
                    state: failed_in,
                    error,
                })
            }
        };

        SessionOutcome {
            shard_index: self.shard_index,
            peer: self.peer,
            merged_lines: self.merged_lines,
            skipped_lines: self.skipped_lines,
            failure,
        }
    }

    async fn exchange(&mut self) -> Result<(), SessionError> {
        let (read_half, write_half) = tokio::io::split(&mut self.stream);
        let mut writer = BufWriter::new(write_half);

        with_deadline(
            self.io_timeout,
            "sending shard",
            protocol::write_shard(&mut writer, &self.shard),
        )
        .await?;

        self.state = SessionState::AwaitingSendComplete;
        debug!("Shard queued, flushing");
        with_deadline(self.io_timeout, "flushing shard", writer.flush()).await?;

        self.state = SessionState::ReceivingResults;
        debug!("Shard sent, awaiting results");
        let mut lines = BufReader::new(read_half).lines();
        loop {
            let line = with_deadline(self.io_timeout, "receiving results", lines.next_line())
                .await?
                .ok_or(ProtocolError::UnexpectedEof)?;

            if line == SENTINEL {
                break;
            }
            match protocol::parse_result_line(&line) {
                Ok((movie_id, score)) => {
                    self.aggregator.add(&movie_id, score);
                    self.merged_lines += 1;
                    debug!("Merged result: movie {} score {:.2}", movie_id, score);
                }
                Err(e) => {
                    self.skipped_lines += 1;
                    debug!("Ignoring result line: {}", e);
                }
            }
        }

        // The worker has nothing more to send; a failed shutdown changes nothing
        let _ = writer.shutdown().await;
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Run an I/O future, failing with `SessionError::Timeout` if `timeout` elapses first
async fn with_deadline<F, T, E>(
    timeout: Option<Duration>,
    phase: &'static str,
    io: F,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<SessionError>,
{
    let result = match timeout {
        Some(after) => tokio::time::timeout(after, io)
            .await
            .map_err(|_| SessionError::Timeout { phase, after })?,
        None => io.await,
    };
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::Rating;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn shard() -> Shard {
        Shard {
            target_user_id: "U1".to_string(),
            ratings: vec![Rating::new("U1", "M1", 5.0), Rating::new("U2", "M2", 3.0)],
        }
    }

    /// Read the shard from the worker end, then reply with `reply`
    async fn fake_worker(mut stream: DuplexStream, reply: &'static str) -> String {
        let mut received = String::new();
        let mut buf = [0u8; 256];
        while !received.ends_with("END\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "coordinator closed early");
            received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }
        stream.write_all(reply.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        received
    }

    #[tokio::test]
    async fn test_session_sends_shard_and_merges_results() {
        let (coordinator_end, worker_end) = tokio::io::duplex(4096);
        let aggregator = Arc::new(Aggregator::new());

        let worker = tokio::spawn(fake_worker(worker_end, "M2 3.0\nM3 1.5\nEND\n"));
        let outcome = Session::new(0, coordinator_end, shard(), aggregator.clone())
            .run()
            .await;

        let received = worker.await.unwrap();
        assert_eq!(received, "UserID: U1\nU1,M1,5\nU2,M2,3\nEND\n");

        assert!(outcome.is_success());
        assert_eq!(outcome.merged_lines, 2);
        assert_eq!(outcome.skipped_lines, 0);
        assert_eq!(aggregator.get("M2"), Some(3.0));
        assert_eq!(aggregator.get("M3"), Some(1.5));
    }

    #[tokio::test]
    async fn test_malformed_result_lines_are_skipped() {
        let (coordinator_end, worker_end) = tokio::io::duplex(4096);
        let aggregator = Arc::new(Aggregator::new());

        let reply = "M2 2.0\nM3\nM4 abc\nM5 1.0 2.0\n\nM2 1.0\nEND\n";
        let worker = tokio::spawn(fake_worker(worker_end, reply));
        let outcome = Session::new(0, coordinator_end, shard(), aggregator.clone())
            .run()
            .await;
        worker.await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.merged_lines, 2);
        assert_eq!(outcome.skipped_lines, 4);
        assert_eq!(aggregator.snapshot(), vec![("M2".to_string(), 3.0)]);
    }

    #[tokio::test]
    async fn test_disconnect_keeps_partial_contribution() {
        let (coordinator_end, worker_end) = tokio::io::duplex(4096);
        let aggregator = Arc::new(Aggregator::new());

        // Worker drops the connection without sending the sentinel
        let worker = tokio::spawn(fake_worker(worker_end, "M2 4.0\n"));
        let outcome = Session::new(3, coordinator_end, shard(), aggregator.clone())
            .run()
            .await;
        worker.await.unwrap();

        let failure = outcome.failure.expect("session should fail");
        assert_eq!(failure.state, SessionState::ReceivingResults);
        assert!(matches!(
            failure.error,
            SessionError::Protocol(ProtocolError::UnexpectedEof)
        ));
        assert_eq!(outcome.shard_index, 3);
        assert_eq!(outcome.merged_lines, 1);
        assert_eq!(aggregator.get("M2"), Some(4.0));
    }

    #[tokio::test]
    async fn test_write_failure_aborts_session() {
        let (coordinator_end, worker_end) = tokio::io::duplex(16);
        drop(worker_end);

        let aggregator = Arc::new(Aggregator::new());
        let outcome = Session::new(0, coordinator_end, shard(), aggregator.clone())
            .run()
            .await;

        let failure = outcome.failure.expect("session should fail");
        assert!(matches!(failure.error, SessionError::Connection(_)));
        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_worker_hits_io_deadline() {
        let (coordinator_end, worker_end) = tokio::io::duplex(4096);
        let aggregator = Arc::new(Aggregator::new());

        let outcome = Session::new(0, coordinator_end, shard(), aggregator)
            .with_io_timeout(Some(Duration::from_millis(50)))
            .run()
            .await;
        drop(worker_end);

        let failure = outcome.failure.expect("session should time out");
        assert_eq!(failure.state, SessionState::ReceivingResults);
        assert!(matches!(failure.error, SessionError::Timeout { .. }));
    }
}
