//! Remote command execution on cluster nodes.
//!
//! The harness never talks to node operating systems directly; everything
//! goes through [`NodeExec`] so orchestration logic can be exercised against
//! the scripted mock. The shipped implementation targets kind-style clusters
//! whose nodes are containers reachable with `docker exec`.

use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Command execution on a named cluster node.
#[async_trait]
pub trait NodeExec: Send + Sync {
    /// Run a shell command on the node and return captured stdout.
    ///
    /// A non-zero exit is an error carrying the captured stderr; callers
    /// treat success as the command's assertion (e.g. `pgrep` succeeding
    /// means the process exists).
    async fn run(&self, node: &str, command: &str) -> Result<String>;

    /// Start a shell command on the node detached, without waiting for it.
    ///
    /// Used for the background route capture; the command keeps running
    /// until something on the node kills it.
    async fn spawn(&self, node: &str, command: &str) -> Result<()>;
}

/// [`NodeExec`] implementation for clusters whose nodes are containers
/// (kind and friends): commands run under `docker exec <node> sh -c ...`.
#[derive(Debug, Default)]
pub struct DockerExec;

impl DockerExec {
    /// Create a new docker-backed executor.
    pub fn new() -> Self {
        Self
    }

    async fn docker(&self, node: &str, command: &str, detach: bool) -> Result<String> {
        let mut cmd = Command::new("docker");
        cmd.arg("exec");
        if detach {
            cmd.arg("-d");
        }
        cmd.args([node, "sh", "-c", command]);

        debug!(target: "churn.exec", node, command, detach, "running docker exec");

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::RemoteCommand {
                node: node.to_string(),
                command: command.to_string(),
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl NodeExec for DockerExec {
    async fn run(&self, node: &str, command: &str) -> Result<String> {
        self.docker(node, command, false).await
    }

    async fn spawn(&self, node: &str, command: &str) -> Result<()> {
        self.docker(node, command, true).await.map(|_| ())
    }
}

/// Scripted mock executor for tests.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// How a recorded call was issued.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CallKind {
        /// Foreground `run`.
        Run,
        /// Detached `spawn`.
        Spawn,
    }

    /// One recorded call against the mock.
    #[derive(Debug, Clone)]
    pub struct ExecCall {
        pub kind: CallKind,
        pub node: String,
        pub command: String,
    }

    enum Outcome {
        Stdout(String),
        Fail(String),
    }

    struct Script {
        pattern: String,
        /// Consumed front to back; the last outcome repeats once drained.
        outcomes: VecDeque<Outcome>,
    }

    /// Mock [`NodeExec`] with substring-scripted responses and an ordered
    /// call log for sequencing assertions.
    ///
    /// Commands that match no script succeed with empty stdout, so tests
    /// only script the commands they care about.
    #[derive(Default)]
    pub struct MockNodeExec {
        calls: Mutex<Vec<ExecCall>>,
        scripts: Mutex<Vec<Script>>,
    }

    impl MockNodeExec {
        pub fn new() -> Self {
            Self::default()
        }

        /// Commands containing `pattern` always succeed with `stdout`.
        pub fn succeed_with(&self, pattern: &str, stdout: &str) {
            self.push_script(pattern, vec![Outcome::Stdout(stdout.to_string())]);
        }

        /// Commands containing `pattern` always fail with `detail`.
        pub fn fail_with(&self, pattern: &str, detail: &str) {
            self.push_script(pattern, vec![Outcome::Fail(detail.to_string())]);
        }

        /// Commands containing `pattern` fail `failures` times, then succeed
        /// with empty stdout from then on.
        pub fn fail_then_succeed(&self, pattern: &str, failures: u32) {
            let mut outcomes: Vec<Outcome> = (0..failures)
                .map(|i| Outcome::Fail(format!("scripted failure {}", i + 1)))
                .collect();
            outcomes.push(Outcome::Stdout(String::new()));
            self.push_script(pattern, outcomes);
        }

        /// Commands containing `pattern` succeed `successes` times, then
        /// fail with `detail` from then on.
        pub fn succeed_then_fail(&self, pattern: &str, successes: u32, detail: &str) {
            let mut outcomes: Vec<Outcome> = (0..successes)
                .map(|_| Outcome::Stdout(String::new()))
                .collect();
            outcomes.push(Outcome::Fail(detail.to_string()));
            self.push_script(pattern, outcomes);
        }

        fn push_script(&self, pattern: &str, outcomes: Vec<Outcome>) {
            if let Ok(mut scripts) = self.scripts.lock() {
                scripts.push(Script {
                    pattern: pattern.to_string(),
                    outcomes: outcomes.into(),
                });
            }
        }

        /// Snapshot of all calls in issue order.
        pub fn calls(&self) -> Vec<ExecCall> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }

        /// Number of detached spawns issued.
        pub fn spawn_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.kind == CallKind::Spawn)
                .count()
        }

        /// Index in the call log of the first command containing `pattern`.
        pub fn first_index_of(&self, pattern: &str) -> Option<usize> {
            self.calls()
                .iter()
                .position(|c| c.command.contains(pattern))
        }

        /// Index in the call log of the last command containing `pattern`.
        pub fn last_index_of(&self, pattern: &str) -> Option<usize> {
            let calls = self.calls();
            calls
                .iter()
                .enumerate()
                .rev()
                .find(|(_, c)| c.command.contains(pattern))
                .map(|(i, _)| i)
        }

        fn record_and_respond(&self, kind: CallKind, node: &str, command: &str) -> Result<String> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(ExecCall {
                    kind,
                    node: node.to_string(),
                    command: command.to_string(),
                });
            }

            let mut scripts = match self.scripts.lock() {
                Ok(guard) => guard,
                Err(_) => return Ok(String::new()),
            };

            for script in scripts.iter_mut() {
                if !command.contains(&script.pattern) {
                    continue;
                }

                let outcome = if script.outcomes.len() > 1 {
                    script.outcomes.pop_front()
                } else {
                    script.outcomes.front().map(|o| match o {
                        Outcome::Stdout(s) => Outcome::Stdout(s.clone()),
                        Outcome::Fail(d) => Outcome::Fail(d.clone()),
                    })
                };

                return match outcome {
                    Some(Outcome::Stdout(stdout)) => Ok(stdout),
                    Some(Outcome::Fail(detail)) => Err(HarnessError::RemoteCommand {
                        node: node.to_string(),
                        command: command.to_string(),
                        detail,
                    }),
                    None => Ok(String::new()),
                };
            }

            Ok(String::new())
        }
    }

    #[async_trait]
    impl NodeExec for MockNodeExec {
        async fn run(&self, node: &str, command: &str) -> Result<String> {
            self.record_and_respond(CallKind::Run, node, command)
        }

        async fn spawn(&self, node: &str, command: &str) -> Result<()> {
            self.record_and_respond(CallKind::Spawn, node, command)
                .map(|_| ())
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_unscripted_commands_succeed_empty() {
            let mock = MockNodeExec::new();

            let out = mock.run("node-a", "pkill ip").await.unwrap();
            assert_eq!(out, "");
            assert_eq!(mock.calls().len(), 1);
        }

        #[tokio::test]
        async fn test_scripted_stdout_and_failure() {
            let mock = MockNodeExec::new();
            mock.succeed_with("cat", "line one\n");
            mock.fail_with("pgrep", "no such process");

            assert_eq!(mock.run("n", "cat /tmp/x").await.unwrap(), "line one\n");
            assert!(mock.run("n", "pgrep bird").await.is_err());
        }

        #[tokio::test]
        async fn test_fail_then_succeed_sequence() {
            let mock = MockNodeExec::new();
            mock.fail_then_succeed("pgrep", 2);

            assert!(mock.run("n", "pgrep bird").await.is_err());
            assert!(mock.run("n", "pgrep bird").await.is_err());
            assert!(mock.run("n", "pgrep bird").await.is_ok());
            // Last outcome repeats.
            assert!(mock.run("n", "pgrep bird").await.is_ok());
        }

        #[tokio::test]
        async fn test_call_log_ordering_helpers() {
            let mock = MockNodeExec::new();

            mock.spawn("n", "ip -ts monitor route").await.unwrap();
            mock.run("n", "pkill bird").await.unwrap();
            mock.run("n", "pkill ip").await.unwrap();

            assert_eq!(mock.spawn_count(), 1);
            assert_eq!(mock.first_index_of("monitor route"), Some(0));
            assert_eq!(mock.last_index_of("pkill ip"), Some(2));
            assert!(mock.first_index_of("rm -rf").is_none());
        }
    }
}
