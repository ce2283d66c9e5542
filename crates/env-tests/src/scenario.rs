//! Live-cluster scenario wiring.
//!
//! Binds the real executors (docker exec for node commands, kubectl for the
//! cluster API) into a churn probe and runs one scenario end to end. The
//! diagnostics guard is armed for the whole scenario: any error return or
//! failing verdict leaves it armed, so the bundle is collected before the
//! caller's assertion fires.

use churn_harness::cluster::{ClusterApi, Kubectl, PodHealth};
use churn_harness::config::{ConfigError, HarnessConfig};
use churn_harness::diags::DiagsCollector;
use churn_harness::disruption::{AbruptKill, Disruption, GracefulReplace};
use churn_harness::error::HarnessError;
use churn_harness::exec::DockerExec;
use churn_harness::probe::{ChurnProbe, ChurnReport, ProbeConfig};
use churn_harness::topology::ClusterNode;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Scenario-level failures: anything other than the probe's own verdict.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Harness(#[from] HarnessError),
}

/// Run the methodology scenario: abrupt kills must produce visible churn.
pub async fn run_methodology() -> Result<ChurnReport, ScenarioError> {
    let config = HarnessConfig::from_env()?;
    let exec = Arc::new(DockerExec::new());
    let api = Arc::new(Kubectl::from_config(&config));
    let strategy = AbruptKill::from_config(Arc::clone(&exec), &config);

    run_scenario(exec, api, strategy, ProbeConfig::methodology(&config), &config).await
}

/// Run the graceful scenario: clean replacements must leave the feed
/// silent.
pub async fn run_graceful() -> Result<ChurnReport, ScenarioError> {
    let config = HarnessConfig::from_env()?;
    let exec = Arc::new(DockerExec::new());
    let api = Arc::new(Kubectl::from_config(&config));
    let strategy = GracefulReplace::from_config(Arc::clone(&api), &config);

    run_scenario(exec, api, strategy, ProbeConfig::graceful(&config), &config).await
}

/// Enumerate the cluster's nodes with roles and internal IPs.
pub async fn cluster_nodes() -> Result<Vec<ClusterNode>, ScenarioError> {
    let config = HarnessConfig::from_env()?;
    let api = Kubectl::from_config(&config);
    Ok(api.list_nodes().await?)
}

/// Snapshot pod health in the configured agent namespace.
pub async fn agent_pod_health() -> Result<Vec<PodHealth>, ScenarioError> {
    let config = HarnessConfig::from_env()?;
    let api = Kubectl::from_config(&config);
    Ok(api.pods_running(&config.agent_namespace).await?)
}

async fn run_scenario<D: Disruption>(
    exec: Arc<DockerExec>,
    api: Arc<Kubectl>,
    strategy: D,
    probe_config: ProbeConfig,
    config: &HarnessConfig,
) -> Result<ChurnReport, ScenarioError> {
    let diags = DiagsCollector::from_config(config);

    let nodes = api.list_nodes().await?;
    info!(nodes = nodes.len(), "enumerated cluster nodes");

    let report = ChurnProbe::new(exec, api, strategy, probe_config)
        .run(&nodes)
        .await?;

    if report.passed() {
        diags.disarm();
    }

    Ok(report)
}
