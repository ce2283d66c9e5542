//! Restart-cycle orchestrator.
//!
//! [`ChurnProbe`] drives one full observation window: select the topology,
//! start the route capture on the monitor node, resolve the agent on the
//! target node, disrupt it for the configured number of cycles, stop the
//! capture, and classify what survived the noise filter. The sequence is a
//! single foreground task; ordering is enforced by code order plus the
//! observer's session state.

use crate::classify::{classify, Verdict};
use crate::cluster::ClusterApi;
use crate::config::HarnessConfig;
use crate::disruption::Disruption;
use crate::error::{HarnessError, Result};
use crate::exec::NodeExec;
use crate::observer::{NoiseFilter, RouteObserver};
use crate::poll::{retry_until_success, RetryPolicy};
use crate::topology::{ClusterNode, Topology};
use std::sync::Arc;
use tracing::info;

/// Methodology check: abrupt kills across this many cycles must visibly
/// churn routes, proving the capture would catch a disruptive restart.
const METHODOLOGY_CYCLES: u32 = 3;

/// Graceful path: this many clean replacements must leave the feed silent.
const GRACEFUL_CYCLES: u32 = 8;

/// Per-run probe parameters.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Number of disruption cycles inside the single observation window.
    pub cycles: u32,
    /// Whether the scenario expects the filtered feed to contain churn.
    pub expect_churn: bool,
    /// Budget for resolving the agent instance by target node IP.
    pub resolve_policy: RetryPolicy,
    /// Exclusion pattern for the capture noise filter.
    pub noise_pattern: String,
}

impl ProbeConfig {
    pub fn new(cycles: u32, expect_churn: bool, config: &HarnessConfig) -> Self {
        Self {
            cycles,
            expect_churn,
            resolve_policy: RetryPolicy::new(config.ready_retries, config.ready_interval),
            noise_pattern: config.noise_pattern.clone(),
        }
    }

    /// Preset for the methodology scenario (paired with an abrupt kill).
    pub fn methodology(config: &HarnessConfig) -> Self {
        Self::new(METHODOLOGY_CYCLES, true, config)
    }

    /// Preset for the graceful-restart scenario (paired with a pod
    /// replacement).
    pub fn graceful(config: &HarnessConfig) -> Self {
        Self::new(GRACEFUL_CYCLES, false, config)
    }
}

/// What one probe run observed.
#[derive(Debug, Clone)]
pub struct ChurnReport {
    pub verdict: Verdict,
    /// The filtered capture buffer, verbatim.
    pub buffer: String,
    pub expect_churn: bool,
    pub strategy: &'static str,
    pub cycles: u32,
}

impl ChurnReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Descriptive failure text embedding the captured feed, for test
    /// report surfaces.
    pub fn failure_message(&self) -> String {
        if self.expect_churn {
            format!(
                "expected route churn across {} {} cycles, but the filtered capture is empty",
                self.cycles, self.strategy
            )
        } else {
            format!(
                "expected a silent route feed across {} {} cycles, but captured:\n{}",
                self.cycles, self.strategy, self.buffer
            )
        }
    }
}

/// One-shot churn probe binding executors, cluster access, and a disruption
/// strategy.
pub struct ChurnProbe<E: NodeExec, A: ClusterApi, D: Disruption> {
    exec: Arc<E>,
    api: Arc<A>,
    strategy: D,
    config: ProbeConfig,
}

impl<E: NodeExec, A: ClusterApi, D: Disruption> ChurnProbe<E, A, D> {
    pub fn new(exec: Arc<E>, api: Arc<A>, strategy: D, config: ProbeConfig) -> Self {
        Self {
            exec,
            api,
            strategy,
            config,
        }
    }

    /// Run one observation window over the given node list.
    ///
    /// Classification mismatch is not an error: the report carries the
    /// verdict either way. Errors are environmental or programming
    /// failures, and abort the run where they occur.
    pub async fn run(&self, nodes: &[ClusterNode]) -> Result<ChurnReport> {
        let topology = Topology::select(nodes)?;
        info!(
            target: "churn.probe",
            monitor = %topology.monitor.name,
            target_node = %topology.target.name,
            strategy = self.strategy.name(),
            cycles = self.config.cycles,
            expect_churn = self.config.expect_churn,
            "starting churn probe"
        );

        let filter = NoiseFilter::new(&self.config.noise_pattern)?;
        let mut observer =
            RouteObserver::new(Arc::clone(&self.exec), &topology.monitor.name, filter);
        observer.start().await?;

        let mut instance = retry_until_success(self.config.resolve_policy, || async {
            self.api.find_agent(&topology.target.ip).await
        })
        .await?;
        info!(target: "churn.probe", instance = %instance.name, "resolved agent instance");

        for cycle in 1..=self.config.cycles {
            info!(
                target: "churn.probe",
                cycle,
                cycles = self.config.cycles,
                instance = %instance.name,
                "running disruption cycle"
            );
            instance = self
                .strategy
                .disrupt(&topology.target, &instance)
                .await
                .map_err(|e| HarnessError::DisruptionFailed {
                    cycle,
                    source: Box::new(e),
                })?;
        }

        let buffer = observer.stop().await?;
        let verdict = classify(&buffer, self.config.expect_churn);
        info!(
            target: "churn.probe",
            verdict = ?verdict,
            captured_lines = buffer.lines().count(),
            "probe complete"
        );

        Ok(ChurnReport {
            verdict,
            buffer,
            expect_churn: self.config.expect_churn,
            strategy: self.strategy.name(),
            cycles: self.config.cycles,
        })
    }
}
