//! Harness configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults
//! so the harness runs unmodified against a local kind cluster carrying the
//! default fabric deployment.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default namespace the network agent pods run in.
pub const DEFAULT_AGENT_NAMESPACE: &str = "fabric-system";

/// Default label selector identifying agent pods.
pub const DEFAULT_AGENT_SELECTOR: &str = "k8s-app=fabric-node";

/// Default name of the routing daemon process inside the agent.
pub const DEFAULT_AGENT_PROCESS: &str = "bird";

/// Default exclusion pattern for the route-monitor noise filter.
///
/// Matches IPv6 workload block routes that are known to flap on restart for
/// reasons unrelated to the agent's graceful-restart behavior. Adopted from
/// the deployment this harness was first written against; revisit per
/// cluster rather than assuming it generalizes.
pub const DEFAULT_NOISE_PATTERN: &str = "fd00:10:244";

/// Default readiness retry attempts.
pub const DEFAULT_READY_RETRIES: u32 = 10;

/// Default seconds between readiness retries.
pub const DEFAULT_READY_INTERVAL_SECS: u64 = 1;

/// Default timeout for a replacement pod to reach the ready condition.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;

/// Default settle period after an abrupt kill converges, giving the
/// restarted daemon time to re-establish peerings before the next cycle.
pub const DEFAULT_SETTLE_SECS: u64 = 5;

/// Default directory for failure diagnostics bundles.
pub const DEFAULT_DIAGS_DIR: &str = "diags";

/// Harness configuration, loaded from `CHURN_*` environment variables.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Namespace the agent pods run in.
    pub agent_namespace: String,

    /// Label selector identifying agent pods.
    pub agent_selector: String,

    /// Process name of the routing daemon inside the agent.
    pub agent_process: String,

    /// Exclusion pattern for the route-monitor noise filter.
    pub noise_pattern: String,

    /// Readiness retry attempts (must be > 0).
    pub ready_retries: u32,

    /// Interval between readiness retries.
    pub ready_interval: Duration,

    /// Timeout for a replacement pod to become ready (must be > 0).
    pub ready_timeout: Duration,

    /// Settle period after abrupt-kill convergence.
    pub settle: Duration,

    /// Directory failure diagnostics are bundled into.
    pub diags_dir: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            agent_namespace: DEFAULT_AGENT_NAMESPACE.to_string(),
            agent_selector: DEFAULT_AGENT_SELECTOR.to_string(),
            agent_process: DEFAULT_AGENT_PROCESS.to_string(),
            noise_pattern: DEFAULT_NOISE_PATTERN.to_string(),
            ready_retries: DEFAULT_READY_RETRIES,
            ready_interval: Duration::from_secs(DEFAULT_READY_INTERVAL_SECS),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            settle: Duration::from_secs(DEFAULT_SETTLE_SECS),
            diags_dir: DEFAULT_DIAGS_DIR.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid retry configuration: {0}")]
    InvalidRetries(String),

    #[error("Invalid interval configuration: {0}")]
    InvalidInterval(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let agent_namespace = vars
            .get("CHURN_AGENT_NAMESPACE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AGENT_NAMESPACE.to_string());

        let agent_selector = vars
            .get("CHURN_AGENT_SELECTOR")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AGENT_SELECTOR.to_string());

        let agent_process = vars
            .get("CHURN_AGENT_PROCESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AGENT_PROCESS.to_string());

        let noise_pattern = vars
            .get("CHURN_NOISE_PATTERN")
            .cloned()
            .unwrap_or_else(|| DEFAULT_NOISE_PATTERN.to_string());

        // Parse readiness retries with validation
        let ready_retries = if let Some(value_str) = vars.get("CHURN_READY_RETRIES") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRetries(format!(
                    "CHURN_READY_RETRIES must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRetries(
                    "CHURN_READY_RETRIES must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_READY_RETRIES
        };

        let ready_interval_secs = if let Some(value_str) = vars.get("CHURN_READY_INTERVAL_SECS") {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidInterval(format!(
                    "CHURN_READY_INTERVAL_SECS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_READY_INTERVAL_SECS
        };

        // Parse ready timeout with validation
        let ready_timeout_secs = if let Some(value_str) = vars.get("CHURN_READY_TIMEOUT_SECS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTimeout(format!(
                    "CHURN_READY_TIMEOUT_SECS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidTimeout(
                    "CHURN_READY_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_READY_TIMEOUT_SECS
        };

        let settle_secs = if let Some(value_str) = vars.get("CHURN_SETTLE_SECS") {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidInterval(format!(
                    "CHURN_SETTLE_SECS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_SETTLE_SECS
        };

        let diags_dir = vars
            .get("CHURN_DIAGS_DIR")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DIAGS_DIR.to_string());

        Ok(HarnessConfig {
            agent_namespace,
            agent_selector,
            agent_process,
            noise_pattern,
            ready_retries,
            ready_interval: Duration::from_secs(ready_interval_secs),
            ready_timeout: Duration::from_secs(ready_timeout_secs),
            settle: Duration::from_secs(settle_secs),
            diags_dir,
        })
    }
}
