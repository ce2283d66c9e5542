//! Scoped failure diagnostics.
//!
//! A scenario arms a [`DiagsCollector`] on entry and disarms it on success.
//! If the guard drops while still armed, it bundles cluster state and agent
//! logs into a timestamped directory. Collection is best-effort and blocking
//! (it runs during unwinding or error return, off the happy path); a failed
//! capture logs a warning and never masks the scenario's own failure.

use crate::config::HarnessConfig;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::warn;

/// Drop guard that captures cluster diagnostics unless disarmed.
pub struct DiagsCollector {
    dir: PathBuf,
    namespace: String,
    selector: String,
    armed: bool,
}

impl DiagsCollector {
    /// Arm diagnostics for the scope being entered.
    pub fn arm(
        dir: impl Into<PathBuf>,
        namespace: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            namespace: namespace.into(),
            selector: selector.into(),
            armed: true,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::arm(
            &config.diags_dir,
            &config.agent_namespace,
            &config.agent_selector,
        )
    }

    /// Mark the scope successful; dropping will not collect anything.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DiagsCollector {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let bundle = self
            .dir
            .join(format!("churn-{}", Utc::now().format("%Y%m%d-%H%M%S")));
        if let Err(e) = fs::create_dir_all(&bundle) {
            warn!(
                target: "churn.diags",
                dir = %bundle.display(),
                error = %e,
                "could not create diagnostics directory"
            );
            return;
        }

        warn!(
            target: "churn.diags",
            dir = %bundle.display(),
            "collecting failure diagnostics"
        );

        capture(&bundle, "nodes-wide.txt", &["get", "nodes", "-o", "wide"]);
        capture(&bundle, "pods-wide.txt", &["get", "pods", "-A", "-o", "wide"]);
        capture(
            &bundle,
            "agent-describe.txt",
            &["describe", "pods", "-n", &self.namespace, "-l", &self.selector],
        );
        capture(
            &bundle,
            "agent-logs.txt",
            &[
                "logs",
                "-n",
                &self.namespace,
                "-l",
                &self.selector,
                "--all-containers",
                "--prefix",
                "--tail=-1",
            ],
        );
        capture(
            &bundle,
            "events.txt",
            &[
                "get",
                "events",
                "-n",
                &self.namespace,
                "--sort-by=.lastTimestamp",
            ],
        );
    }
}

fn capture(bundle: &Path, file: &str, args: &[&str]) {
    let output = match Command::new("kubectl").args(args).output() {
        Ok(output) => output,
        Err(e) => {
            warn!(
                target: "churn.diags",
                command = %args.join(" "),
                error = %e,
                "diagnostic capture failed"
            );
            return;
        }
    };

    let mut content = output.stdout;
    if !output.status.success() {
        content.extend_from_slice(b"\n--- stderr ---\n");
        content.extend_from_slice(&output.stderr);
    }

    if let Err(e) = fs::write(bundle.join(file), &content) {
        warn!(
            target: "churn.diags",
            file,
            error = %e,
            "could not write diagnostic capture"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn bundle_dirs(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with("churn-"))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_disarmed_guard_collects_nothing() {
        let scratch = tempfile::tempdir().unwrap();

        let guard = DiagsCollector::arm(scratch.path(), "fabric-system", "k8s-app=fabric-node");
        guard.disarm();

        assert!(bundle_dirs(scratch.path()).is_empty());
    }

    #[test]
    fn test_armed_drop_creates_timestamped_bundle() {
        let scratch = tempfile::tempdir().unwrap();

        {
            let _guard =
                DiagsCollector::arm(scratch.path(), "fabric-system", "k8s-app=fabric-node");
        }

        assert_eq!(bundle_dirs(scratch.path()).len(), 1);
    }

    #[test]
    fn test_from_config_uses_configured_paths() {
        let scratch = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            diags_dir: scratch.path().to_string_lossy().into_owned(),
            ..HarnessConfig::default()
        };

        {
            let _guard = DiagsCollector::from_config(&config);
        }

        assert_eq!(bundle_dirs(scratch.path()).len(), 1);
    }
}
