//! Harness error types.
//!
//! Fatal conditions abort the remaining disruption cycles and propagate to
//! the scenario boundary; transient conditions (`InstanceNotFound`) are only
//! ever retried inside the retry poller and surface as `RetryExhausted` once
//! the budget runs out. A classification mismatch is not an error; it is
//! the expected mechanism by which a scenario fails.

use thiserror::Error;

/// Errors produced by the churn-detection harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Node list is too small to pick a monitor and a target worker.
    #[error("insufficient topology: found {found} nodes ({workers} workers), need a control-plane node plus two workers")]
    InsufficientTopology { found: usize, workers: usize },

    /// Retry budget exhausted without a successful attempt.
    #[error("retry budget exhausted after {attempts} attempts, last error: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: Box<HarnessError>,
    },

    /// `start` called on a capture session that is already running or spent.
    #[error("route observer already running on node {node}")]
    ObserverAlreadyRunning { node: String },

    /// `stop` called on a capture session that was never started.
    #[error("route observer is not running")]
    ObserverNotRunning,

    /// A disruption cycle did not reach convergence; fatal for the run.
    #[error("disruption cycle {cycle} failed: {source}")]
    DisruptionFailed {
        cycle: u32,
        source: Box<HarnessError>,
    },

    /// No agent instance currently resolvable for a node IP (transient).
    #[error("no agent instance found for node ip {node_ip}")]
    InstanceNotFound { node_ip: String },

    /// A remote command exited non-zero or could not be spawned.
    #[error("remote command on node {node} failed: `{command}`: {detail}")]
    RemoteCommand {
        node: String,
        command: String,
        detail: String,
    },

    /// Cluster API (kubectl) operation failed.
    #[error("cluster api error: {0}")]
    ClusterApi(String),

    /// Noise-filter exclusion pattern did not compile.
    #[error("invalid noise filter pattern: {0}")]
    InvalidFilter(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// True for the transient class that the retry poller may swallow
    /// between attempts. Everything else is a hard failure the moment it
    /// occurs.
    pub fn is_transient(&self) -> bool {
        matches!(self, HarnessError::InstanceNotFound { .. })
    }
}

/// Result type alias using `HarnessError`.
pub type Result<T> = std::result::Result<T, HarnessError>;
