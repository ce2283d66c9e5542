//! Cluster API access through the kubectl CLI.
//!
//! Node enumeration, agent pod resolution, and agent lifecycle (delete,
//! readiness wait) all sit behind the [`ClusterApi`] trait so the probe can
//! be exercised against the scripted mock. The real implementation shells
//! out to `kubectl` and parses its `-o json` output with typed structs.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::topology::{ClusterNode, NodeRole};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";

/// Identity of the restartable agent pod serving a target node.
///
/// Resolved by the target node's IP and re-resolved after every disruption;
/// name equality is how a replacement pod is distinguished from the one that
/// was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInstance {
    pub name: String,
}

impl AgentInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Phase and readiness snapshot for one pod.
#[derive(Debug, Clone)]
pub struct PodHealth {
    pub name: String,
    pub phase: String,
    pub ready: bool,
}

/// Cluster control-plane operations the harness depends on.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// All cluster nodes in list order, with role and internal IP.
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>>;

    /// Resolve the agent pod whose pod IP matches `node_ip`.
    ///
    /// Returns [`HarnessError::InstanceNotFound`] while no such pod exists;
    /// that condition is transient and owned by the retry poller.
    async fn find_agent(&self, node_ip: &str) -> Result<AgentInstance>;

    /// Delete the agent pod, blocking until the API server confirms it.
    async fn delete_agent(&self, instance: &AgentInstance) -> Result<()>;

    /// Block until the agent pod reports the Ready condition.
    async fn wait_agent_ready(&self, instance: &AgentInstance, timeout: Duration) -> Result<()>;

    /// Name, phase, and readiness of every pod in `namespace`.
    async fn pods_running(&self, namespace: &str) -> Result<Vec<PodHealth>>;
}

/// [`ClusterApi`] implementation backed by the `kubectl` CLI.
pub struct Kubectl {
    namespace: String,
    selector: String,
}

impl Kubectl {
    pub fn new(namespace: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: selector.into(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(&config.agent_namespace, &config.agent_selector)
    }
}

async fn kubectl(args: &[&str]) -> Result<String> {
    debug!(target: "churn.cluster", command = %args.join(" "), "running kubectl");

    let output = Command::new("kubectl").args(args).output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HarnessError::ClusterApi(format!(
            "kubectl {} failed: {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl ClusterApi for Kubectl {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
        let json = kubectl(&["get", "nodes", "-o", "json"]).await?;
        parse_nodes(&json)
    }

    async fn find_agent(&self, node_ip: &str) -> Result<AgentInstance> {
        let json = kubectl(&[
            "get",
            "pods",
            "-n",
            &self.namespace,
            "-l",
            &self.selector,
            "-o",
            "json",
        ])
        .await?;
        parse_agent(&json, node_ip)
    }

    async fn delete_agent(&self, instance: &AgentInstance) -> Result<()> {
        kubectl(&["delete", "pod", "-n", &self.namespace, &instance.name]).await?;
        Ok(())
    }

    async fn wait_agent_ready(&self, instance: &AgentInstance, timeout: Duration) -> Result<()> {
        let pod_ref = format!("pod/{}", instance.name);
        let timeout_arg = format!("--timeout={}s", timeout.as_secs());
        kubectl(&[
            "wait",
            "-n",
            &self.namespace,
            &pod_ref,
            "--for=condition=ready",
            &timeout_arg,
        ])
        .await?;
        Ok(())
    }

    async fn pods_running(&self, namespace: &str) -> Result<Vec<PodHealth>> {
        let json = kubectl(&["get", "pods", "-n", namespace, "-o", "json"]).await?;
        parse_pod_health(&json)
    }
}

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<NodeItem>,
}

#[derive(Debug, Deserialize)]
struct NodeItem {
    metadata: ObjectMeta,
    status: NodeStatus,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    addresses: Vec<NodeAddress>,
}

#[derive(Debug, Deserialize)]
struct NodeAddress {
    #[serde(rename = "type")]
    kind: String,
    address: String,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: ObjectMeta,
    #[serde(default)]
    status: PodStatusBlock,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatusBlock {
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
    phase: Option<String>,
    #[serde(default)]
    conditions: Vec<PodCondition>,
}

#[derive(Debug, Deserialize)]
struct PodCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

fn parse_nodes(json: &str) -> Result<Vec<ClusterNode>> {
    let list: NodeList = serde_json::from_str(json)
        .map_err(|e| HarnessError::ClusterApi(format!("parsing node list: {}", e)))?;

    let mut nodes = Vec::with_capacity(list.items.len());
    for item in list.items {
        let ip = item
            .status
            .addresses
            .iter()
            .find(|a| a.kind == "InternalIP")
            .map(|a| a.address.clone())
            .ok_or_else(|| {
                HarnessError::ClusterApi(format!(
                    "node {} has no InternalIP address",
                    item.metadata.name
                ))
            })?;

        let role = if item.metadata.labels.contains_key(CONTROL_PLANE_LABEL) {
            NodeRole::ControlPlane
        } else {
            NodeRole::Worker
        };

        nodes.push(ClusterNode::new(item.metadata.name, ip, role));
    }

    Ok(nodes)
}

fn parse_agent(json: &str, node_ip: &str) -> Result<AgentInstance> {
    let list: PodList = serde_json::from_str(json)
        .map_err(|e| HarnessError::ClusterApi(format!("parsing pod list: {}", e)))?;

    list.items
        .into_iter()
        .find(|p| p.status.pod_ip.as_deref() == Some(node_ip))
        .map(|p| AgentInstance::new(p.metadata.name))
        .ok_or_else(|| HarnessError::InstanceNotFound {
            node_ip: node_ip.to_string(),
        })
}

fn parse_pod_health(json: &str) -> Result<Vec<PodHealth>> {
    let list: PodList = serde_json::from_str(json)
        .map_err(|e| HarnessError::ClusterApi(format!("parsing pod list: {}", e)))?;

    Ok(list
        .items
        .into_iter()
        .map(|p| {
            let ready = p
                .status
                .conditions
                .iter()
                .any(|c| c.kind == "Ready" && c.status == "True");
            PodHealth {
                name: p.metadata.name,
                phase: p.status.phase.unwrap_or_default(),
                ready,
            }
        })
        .collect())
}

/// Scripted mock cluster API for tests.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum AgentOutcome {
        Found(String),
        Missing,
    }

    /// Mock [`ClusterApi`] with a scripted agent-resolution sequence and
    /// call recording.
    ///
    /// `find_agent` consumes queued outcomes front to back, repeating the
    /// last one once drained; an empty queue resolves to "missing".
    #[derive(Default)]
    pub struct MockClusterApi {
        nodes: Mutex<Vec<ClusterNode>>,
        agent_outcomes: Mutex<VecDeque<AgentOutcome>>,
        pods: Mutex<Vec<PodHealth>>,
        deleted: Mutex<Vec<String>>,
        ready_waits: Mutex<Vec<String>>,
        find_calls: AtomicUsize,
        delete_failure: Mutex<Option<String>>,
    }

    impl MockClusterApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_nodes(self, nodes: Vec<ClusterNode>) -> Self {
            if let Ok(mut guard) = self.nodes.lock() {
                *guard = nodes;
            }
            self
        }

        /// Queue a successful resolution to the named agent pod.
        pub fn queue_agent(&self, name: &str) {
            if let Ok(mut outcomes) = self.agent_outcomes.lock() {
                outcomes.push_back(AgentOutcome::Found(name.to_string()));
            }
        }

        /// Queue a "no pod with that IP yet" resolution.
        pub fn queue_agent_missing(&self) {
            if let Ok(mut outcomes) = self.agent_outcomes.lock() {
                outcomes.push_back(AgentOutcome::Missing);
            }
        }

        pub fn set_pods(&self, pods: Vec<PodHealth>) {
            if let Ok(mut guard) = self.pods.lock() {
                *guard = pods;
            }
        }

        /// All subsequent deletes fail with `detail`.
        pub fn fail_deletes(&self, detail: &str) {
            if let Ok(mut guard) = self.delete_failure.lock() {
                *guard = Some(detail.to_string());
            }
        }

        /// Names deleted, in order.
        pub fn deleted(&self) -> Vec<String> {
            self.deleted
                .lock()
                .map(|names| names.clone())
                .unwrap_or_default()
        }

        /// Names waited on for readiness, in order.
        pub fn ready_waits(&self) -> Vec<String> {
            self.ready_waits
                .lock()
                .map(|names| names.clone())
                .unwrap_or_default()
        }

        pub fn find_calls(&self) -> usize {
            self.find_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClusterApi for MockClusterApi {
        async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
            Ok(self
                .nodes
                .lock()
                .map(|nodes| nodes.clone())
                .unwrap_or_default())
        }

        async fn find_agent(&self, node_ip: &str) -> Result<AgentInstance> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);

            let mut outcomes = match self.agent_outcomes.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    return Err(HarnessError::InstanceNotFound {
                        node_ip: node_ip.to_string(),
                    })
                }
            };

            let outcome = if outcomes.len() > 1 {
                outcomes.pop_front()
            } else {
                outcomes.front().map(|o| match o {
                    AgentOutcome::Found(name) => AgentOutcome::Found(name.clone()),
                    AgentOutcome::Missing => AgentOutcome::Missing,
                })
            };

            match outcome {
                Some(AgentOutcome::Found(name)) => Ok(AgentInstance::new(name)),
                _ => Err(HarnessError::InstanceNotFound {
                    node_ip: node_ip.to_string(),
                }),
            }
        }

        async fn delete_agent(&self, instance: &AgentInstance) -> Result<()> {
            if let Ok(guard) = self.delete_failure.lock() {
                if let Some(detail) = guard.as_ref() {
                    return Err(HarnessError::ClusterApi(detail.clone()));
                }
            }

            if let Ok(mut deleted) = self.deleted.lock() {
                deleted.push(instance.name.clone());
            }
            Ok(())
        }

        async fn wait_agent_ready(
            &self,
            instance: &AgentInstance,
            _timeout: Duration,
        ) -> Result<()> {
            if let Ok(mut waits) = self.ready_waits.lock() {
                waits.push(instance.name.clone());
            }
            Ok(())
        }

        async fn pods_running(&self, _namespace: &str) -> Result<Vec<PodHealth>> {
            Ok(self.pods.lock().map(|pods| pods.clone()).unwrap_or_default())
        }
    }

}
