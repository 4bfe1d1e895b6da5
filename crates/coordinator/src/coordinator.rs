//! Accepting workers, running sessions and the join barrier.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use protocol::Shard;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::{self, Instant as Deadline};
use tracing::{info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::ranking::RankedList;
use crate::session::{Session, SessionOutcome};

/// What happened to every shard in a run
#[derive(Debug, Default)]
pub struct RunReport {
    /// One entry per session that reached `Closed`, ordered by shard index
    pub outcomes: Vec<SessionOutcome>,
    /// Shards never sent because no worker connected before the deadline
    pub undistributed: Vec<usize>,
    /// Sessions abandoned when the barrier deadline expired
    pub abandoned: Vec<usize>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when some shard did not contribute a complete result stream
    pub fn is_partial(&self) -> bool {
        self.failed() > 0 || !self.undistributed.is_empty() || !self.abandoned.is_empty()
    }
}

/// Ranked output of a run together with its report
#[derive(Debug)]
pub struct RunSummary {
    pub ranked: RankedList,
    pub report: RunReport,
}

/// Listens for workers and hands each one a shard.
pub struct Coordinator {
    listener: TcpListener,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Bind the listener. Workers may connect as soon as this returns.
    pub async fn bind(config: CoordinatorConfig) -> Result<Self> {
        if config.num_shards == 0 {
            return Err(CoordinatorError::InvalidShardCount(0));
        }
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| CoordinatorError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Distribute `shards`, one per accepted connection, and wait for every
    /// session to close before returning.
    ///
    /// A failed accept consumes its shard. With a barrier timeout set, the
    /// deadline covers both accepting and joining; shards not yet sent and
    /// sessions still open at expiry are reported and dropped.
    #[instrument(skip_all, fields(shards = shards.len()))]
    pub async fn run(&self, shards: Vec<Shard>, aggregator: Arc<Aggregator>) -> RunReport {
        let started = Instant::now();
        let deadline = self.config.barrier_timeout().map(|t| Deadline::now() + t);
        let total = shards.len();
        let mut report = RunReport::default();
        let mut sessions: JoinSet<SessionOutcome> = JoinSet::new();
        let mut dispatched = BTreeSet::new();

        info!("Waiting for {} worker connections", total);
        let mut shards = shards.into_iter().enumerate();
        while let Some((index, shard)) = shards.next() {
            let accepted = match deadline {
                Some(deadline) => match time::timeout_at(deadline, self.listener.accept()).await {
                    Ok(accepted) => accepted,
                    Err(_) => {
                        warn!("Barrier deadline passed while waiting for workers");
                        report.undistributed.push(index);
                        report.undistributed.extend(shards.by_ref().map(|(i, _)| i));
                        break;
                    }
                },
                None => self.listener.accept().await,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!("Worker {} connected for shard {}", peer, index);
                    let session = Session::new(index, stream, shard, Arc::clone(&aggregator))
                        .with_peer(peer)
                        .with_io_timeout(self.config.session_timeout());
                    sessions.spawn(session.run());
                    dispatched.insert(index);
                }
                Err(e) => {
                    warn!("Failed to accept connection for shard {}: {}", index, e);
                    report.outcomes.push(SessionOutcome::accept_failed(index, e));
                }
            }
        }

        let joined = join_sessions(&mut sessions, &mut report.outcomes);
        let timed_out = match deadline {
            Some(deadline) => time::timeout_at(deadline, joined).await.is_err(),
            None => {
                joined.await;
                false
            }
        };

        if timed_out {
            abandon_sessions(&mut sessions, &mut report.outcomes).await;
            let closed: BTreeSet<usize> = report.outcomes.iter().map(|o| o.shard_index).collect();
            report.abandoned = dispatched.difference(&closed).copied().collect();
            warn!(
                "Barrier deadline passed, abandoning {} sessions",
                report.abandoned.len()
            );
        }

        report.outcomes.sort_by_key(|o| o.shard_index);
        info!(
            "All sessions closed in {:.2?}: {} succeeded, {} failed, {} undistributed, {} abandoned",
            started.elapsed(),
            report.succeeded(),
            report.failed(),
            report.undistributed.len(),
            report.abandoned.len()
        );
        report
    }

    /// Run the shards against a fresh aggregator and rank the result
    pub async fn recommend(&self, shards: Vec<Shard>) -> RunSummary {
        let aggregator = Arc::new(Aggregator::new());
        let report = self.run(shards, Arc::clone(&aggregator)).await;
        let ranked = RankedList::from_snapshot(aggregator.snapshot());
        RunSummary { ranked, report }
    }
}

/// The join barrier: wait until every spawned session has closed
async fn join_sessions(sessions: &mut JoinSet<SessionOutcome>, outcomes: &mut Vec<SessionOutcome>) {
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("Session task did not complete: {}", e),
        }
    }
}

/// Cancel the sessions still open and collect the ones that closed anyway.
///
/// A session can finish between the deadline firing and the abort, so every
/// completed outcome is kept rather than discarded with the set.
async fn abandon_sessions(sessions: &mut JoinSet<SessionOutcome>, outcomes: &mut Vec<SessionOutcome>) {
    sessions.abort_all();
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("Session task did not complete: {}", e),
        }
    }
}
