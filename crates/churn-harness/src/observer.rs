//! Route change capture on the monitor node.
//!
//! [`RouteObserver`] owns one capture session: it spawns a detached
//! `ip -ts monitor route` redirected to a per-session file on the monitor
//! node, and on stop kills the capture, reads the file back, and applies the
//! noise filter. The raw stream never escapes the observer; classification
//! only ever sees filtered content.

use crate::error::{HarnessError, Result};
use crate::exec::NodeExec;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Line-exclusion filter for the captured route feed.
///
/// Drops every line matching the pattern. The default pattern excludes a
/// known class of benign IPv6 workload-block churn that flaps for reasons
/// unrelated to the agent under test; the class is environment-specific, so
/// the pattern stays configurable.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    pattern: Regex,
}

impl NoiseFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern =
            Regex::new(pattern).map_err(|e| HarnessError::InvalidFilter(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Return the buffer with every matching line removed.
    ///
    /// Kept lines are joined with `\n` and carry a trailing newline; a
    /// buffer with no kept lines filters to the empty string.
    pub fn apply(&self, buffer: &str) -> String {
        let kept: Vec<&str> = buffer
            .lines()
            .filter(|line| !self.pattern.is_match(line))
            .collect();

        if kept.is_empty() {
            String::new()
        } else {
            let mut filtered = kept.join("\n");
            filtered.push('\n');
            filtered
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// One background route-capture session on the monitor node.
///
/// A session is single-use: Idle until started, Running while capturing,
/// Stopped once the buffer has been retrieved. Reusing a stopped session is
/// a programming error, not a retryable condition.
pub struct RouteObserver<E: NodeExec> {
    exec: Arc<E>,
    node: String,
    filter: NoiseFilter,
    capture_path: String,
    state: SessionState,
}

impl<E: NodeExec> RouteObserver<E> {
    pub fn new(exec: Arc<E>, node: impl Into<String>, filter: NoiseFilter) -> Self {
        Self {
            exec,
            node: node.into(),
            filter,
            capture_path: format!("/tmp/route-monitor-{}.log", Uuid::new_v4()),
            state: SessionState::Idle,
        }
    }

    /// Spawn the detached route capture on the monitor node.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(HarnessError::ObserverAlreadyRunning {
                node: self.node.clone(),
            });
        }

        let command = format!("stdbuf -oL ip -ts monitor route > {}", self.capture_path);
        self.exec.spawn(&self.node, &command).await?;
        self.state = SessionState::Running;

        info!(
            target: "churn.observer",
            node = %self.node,
            capture_path = %self.capture_path,
            "route capture started"
        );
        Ok(())
    }

    /// Kill the capture, retrieve the session file, and return the filtered
    /// buffer. May be empty.
    pub async fn stop(&mut self) -> Result<String> {
        if self.state != SessionState::Running {
            return Err(HarnessError::ObserverNotRunning);
        }

        self.exec.run(&self.node, "pkill ip").await?;
        let raw = self
            .exec
            .run(&self.node, &format!("cat {}", self.capture_path))
            .await?;
        self.state = SessionState::Stopped;

        let filtered = self.filter.apply(&raw);
        debug!(
            target: "churn.observer",
            node = %self.node,
            raw_lines = raw.lines().count(),
            kept_lines = filtered.lines().count(),
            "route capture stopped"
        );
        Ok(filtered)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::exec::mock::{CallKind, MockNodeExec};

    const NOISE: &str = "fd00:10:244";

    fn filter() -> NoiseFilter {
        NoiseFilter::new(NOISE).unwrap()
    }

    #[test]
    fn test_filter_drops_matching_lines_only() {
        let raw = "[ts] 10.244.1.0/24 via 172.18.0.3 dev eth0\n\
                   [ts] fd00:10:244:0:1::/80 dev vxlan.calico metric 1024\n\
                   [ts] 10.244.2.0/24 via 172.18.0.4 dev eth0\n";

        let filtered = filter().apply(raw);

        assert_eq!(
            filtered,
            "[ts] 10.244.1.0/24 via 172.18.0.3 dev eth0\n\
             [ts] 10.244.2.0/24 via 172.18.0.4 dev eth0\n"
        );
    }

    #[test]
    fn test_filter_noise_only_stream_is_empty() {
        let raw = "[ts] fd00:10:244:0:1::/80 dev vxlan.calico\n".repeat(50);
        assert_eq!(filter().apply(&raw), "");
    }

    #[test]
    fn test_filter_empty_input_is_empty() {
        assert_eq!(filter().apply(""), "");
    }

    #[test]
    fn test_filter_invalid_pattern_rejected() {
        let err = NoiseFilter::new("fd00[").unwrap_err();
        assert!(matches!(err, HarnessError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_start_spawns_detached_capture() {
        let exec = Arc::new(MockNodeExec::new());
        let mut observer = RouteObserver::new(exec.clone(), "kind-worker", filter());

        observer.start().await.unwrap();

        let calls = exec.calls();
        assert_eq!(calls.len(), 1);
        let call = calls.first().unwrap();
        assert_eq!(call.kind, CallKind::Spawn);
        assert_eq!(call.node, "kind-worker");
        assert!(call.command.contains("ip -ts monitor route"));
        assert!(call.command.contains("/tmp/route-monitor-"));
    }

    #[tokio::test]
    async fn test_start_twice_is_an_error() {
        let exec = Arc::new(MockNodeExec::new());
        let mut observer = RouteObserver::new(exec, "kind-worker", filter());

        observer.start().await.unwrap();
        let err = observer.start().await.unwrap_err();

        assert!(matches!(
            err,
            HarnessError::ObserverAlreadyRunning { ref node } if node == "kind-worker"
        ));
    }

    #[tokio::test]
    async fn test_stop_before_start_is_an_error() {
        let exec = Arc::new(MockNodeExec::new());
        let mut observer = RouteObserver::new(exec, "kind-worker", filter());

        let err = observer.stop().await.unwrap_err();
        assert!(matches!(err, HarnessError::ObserverNotRunning));
    }

    #[tokio::test]
    async fn test_stop_kills_reads_and_filters() {
        let exec = Arc::new(MockNodeExec::new());
        exec.succeed_with(
            "cat",
            "[ts] 10.244.1.0/24 via 172.18.0.3\n[ts] fd00:10:244::/64 dev eth0\n",
        );
        let mut observer = RouteObserver::new(exec.clone(), "kind-worker", filter());

        observer.start().await.unwrap();
        let buffer = observer.stop().await.unwrap();

        assert_eq!(buffer, "[ts] 10.244.1.0/24 via 172.18.0.3\n");
        let kill = exec.first_index_of("pkill ip").unwrap();
        let read = exec.first_index_of("cat ").unwrap();
        assert!(kill < read);
    }

    #[tokio::test]
    async fn test_stopped_session_cannot_restart_or_restop() {
        let exec = Arc::new(MockNodeExec::new());
        let mut observer = RouteObserver::new(exec, "kind-worker", filter());

        observer.start().await.unwrap();
        observer.stop().await.unwrap();

        assert!(matches!(
            observer.start().await.unwrap_err(),
            HarnessError::ObserverAlreadyRunning { .. }
        ));
        assert!(matches!(
            observer.stop().await.unwrap_err(),
            HarnessError::ObserverNotRunning
        ));
    }
}
