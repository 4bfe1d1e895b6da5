//! Coordinator configuration.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_LISTEN_ADDR: &str = "localhost:15000";
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 300_000;

/// Settings for one coordinator run.
///
/// Deserializable so the CLI can read it from a JSON file; missing fields
/// fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address workers connect to
    pub listen_addr: String,

    /// Number of shards, and therefore of worker connections to accept
    pub num_shards: usize,

    /// Deadline in milliseconds for each read or write on a worker connection.
    /// `None` waits forever.
    pub session_timeout_ms: Option<u64>,

    /// Deadline in milliseconds for the whole accept-and-join phase. On expiry the
    /// remaining sessions are abandoned and ranking uses what was merged.
    /// `None` waits for every session.
    pub barrier_timeout_ms: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            num_shards: 1,
            session_timeout_ms: Some(DEFAULT_SESSION_TIMEOUT_MS),
            barrier_timeout_ms: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(listen_addr: impl Into<String>, num_shards: usize) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            num_shards,
            ..Self::default()
        }
    }

    pub fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_barrier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.barrier_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }

    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_ms.map(Duration::from_millis)
    }
}
