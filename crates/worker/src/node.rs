//! Worker side of the protocol: receive a shard, score it, send results.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tracing::{info, instrument};

use crate::matrix::UserItemMatrix;
use crate::scorers::Scorer;

/// Summary of one completed exchange with the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub target_user_id: String,
    pub ratings_received: usize,
    pub predictions_sent: usize,
}

/// A worker connected to a coordinator.
pub struct WorkerNode {
    stream: TcpStream,
    scorer: Arc<dyn Scorer>,
    coordinator_addr: String,
}

impl WorkerNode {
    /// Connect to the coordinator at `addr` (e.g. "localhost:15000")
    pub async fn connect(addr: impl Into<String>, scorer: Arc<dyn Scorer>) -> Result<Self> {
        let addr = addr.into();
        info!("Connecting to coordinator at {}", addr);

        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("Connecting to coordinator at {}", addr))?;

        Ok(Self {
            stream,
            scorer,
            coordinator_addr: addr,
        })
    }

    pub fn coordinator_addr(&self) -> &str {
        &self.coordinator_addr
    }

    /// Handle the single shard this connection carries
    pub async fn run(self) -> Result<WorkerReport> {
        serve(self.stream, self.scorer).await
    }
}

/// Run the worker protocol over any byte stream.
///
/// Scoring is CPU-bound, so it runs on tokio's blocking pool.
#[instrument(skip_all, fields(scorer = scorer.name()))]
pub async fn serve<S>(stream: S, scorer: Arc<dyn Scorer>) -> Result<WorkerReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = tokio::io::split(stream);

    let shard = protocol::read_shard(BufReader::new(read_half))
        .await
        .context("Receiving shard from coordinator")?;
    info!(
        "Received shard for user {} with {} ratings",
        shard.target_user_id,
        shard.len()
    );

    let target_user_id = shard.target_user_id.clone();
    let ratings_received = shard.len();
    let predictions = tokio::task::spawn_blocking({
        let target_user_id = target_user_id.clone();
        move || {
            let matrix = UserItemMatrix::from_shard(&shard);
            scorer.score(&matrix, &target_user_id)
        }
    })
    .await
    .context("Scoring task panicked")?;
    info!("Computed {} predictions", predictions.len());

    let mut writer = BufWriter::new(write_half);
    let predictions_sent = protocol::write_results(&mut writer, predictions)
        .await
        .context("Sending predictions to coordinator")?;
    writer.flush().await.context("Flushing predictions")?;
    writer.shutdown().await.context("Closing connection")?;

    info!("Sent {} predictions to coordinator", predictions_sent);
    Ok(WorkerReport {
        target_user_id,
        ratings_received,
        predictions_sent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorers::ItemMeanScorer;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serve_replies_with_predictions_and_sentinel() {
        let (coordinator_end, worker_end) = tokio::io::duplex(4096);
        let worker = tokio::spawn(serve(worker_end, Arc::new(ItemMeanScorer)));

        let (read_half, mut write_half) = tokio::io::split(coordinator_end);
        write_half
            .write_all(b"UserID: T\nT,M1,5\nA,M1,4\nA,M2,2\nB,M2,4\nB,M3,3\nEND\n")
            .await
            .unwrap();
        write_half.flush().await.unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(line);
        }
        assert_eq!(received, vec!["M2 3", "M3 3", "END"]);

        let report = worker.await.unwrap().unwrap();
        assert_eq!(
            report,
            WorkerReport {
                target_user_id: "T".to_string(),
                ratings_received: 5,
                predictions_sent: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_serve_fails_on_truncated_shard() {
        let (mut coordinator_end, worker_end) = tokio::io::duplex(4096);
        let worker = tokio::spawn(serve(worker_end, Arc::new(ItemMeanScorer)));

        coordinator_end.write_all(b"UserID: T\nT,M1,5\n").await.unwrap();
        drop(coordinator_end);

        assert!(worker.await.unwrap().is_err());
    }
}
