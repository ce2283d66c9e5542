//! Churn Harness Scenario Runner
//!
//! Runs one churn-detection scenario against a live cluster and exits
//! non-zero if the scenario fails.
//!
//! # Scenarios
//!
//! - `methodology`: abrupt-kill x3 expecting visible churn. Proves the
//!   capture pipeline detects disruption when disruption is certain.
//! - `graceful`: graceful-replace x8 expecting a silent feed. The actual
//!   graceful-restart assertion.
//!
//! # Flow
//!
//! 1. Parse the scenario argument
//! 2. Load configuration from environment
//! 3. Arm the diagnostics guard (fires on any failure path)
//! 4. Enumerate nodes and run the probe
//! 5. Log the report; disarm diagnostics on pass

use churn_harness::cluster::{ClusterApi, Kubectl};
use churn_harness::config::HarnessConfig;
use churn_harness::diags::DiagsCollector;
use churn_harness::disruption::{AbruptKill, GracefulReplace};
use churn_harness::exec::DockerExec;
use churn_harness::probe::{ChurnProbe, ProbeConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum Scenario {
    Methodology,
    Graceful,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_harness=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scenario = match std::env::args().nth(1).as_deref() {
        Some("methodology") => Scenario::Methodology,
        Some("graceful") => Scenario::Graceful,
        other => {
            let got = other.unwrap_or("<none>");
            error!(scenario = got, "usage: churn-harness <methodology|graceful>");
            return Err(format!(
                "unknown scenario '{}'; expected 'methodology' or 'graceful'",
                got
            )
            .into());
        }
    };

    // Load configuration
    let config = HarnessConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        namespace = %config.agent_namespace,
        selector = %config.agent_selector,
        process = %config.agent_process,
        "configuration loaded"
    );

    let exec = Arc::new(DockerExec::new());
    let api = Arc::new(Kubectl::from_config(&config));

    // Armed from here on: every early return below leaves diagnostics
    // behind, the passing path disarms explicitly.
    let diags = DiagsCollector::from_config(&config);

    let nodes = api.list_nodes().await?;
    info!(nodes = nodes.len(), "enumerated cluster nodes");

    let report = match scenario {
        Scenario::Methodology => {
            let strategy = AbruptKill::from_config(Arc::clone(&exec), &config);
            let probe = ChurnProbe::new(
                exec,
                Arc::clone(&api),
                strategy,
                ProbeConfig::methodology(&config),
            );
            probe.run(&nodes).await?
        }
        Scenario::Graceful => {
            let strategy = GracefulReplace::from_config(Arc::clone(&api), &config);
            let probe = ChurnProbe::new(
                exec,
                Arc::clone(&api),
                strategy,
                ProbeConfig::graceful(&config),
            );
            probe.run(&nodes).await?
        }
    };

    if report.passed() {
        info!(
            strategy = report.strategy,
            cycles = report.cycles,
            "scenario passed"
        );
        diags.disarm();
        Ok(())
    } else {
        error!(strategy = report.strategy, "{}", report.failure_message());
        Err(report.failure_message().into())
    }
}
