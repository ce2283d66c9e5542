//! Cluster node model and monitor/target selection.
//!
//! Picks one worker to watch the route table on and a second worker whose
//! agent gets disrupted. Control-plane nodes are never eligible for either
//! role. Selection is deterministic over the input order so a scenario rerun
//! against the same cluster exercises the same pair.

use crate::error::{HarnessError, Result};

/// Role of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Cluster management node; excluded from monitor and target roles.
    ControlPlane,
    /// Schedulable worker node.
    Worker,
}

/// A node discovered from the live cluster, immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    /// Node name as known to the cluster (and to `docker exec`).
    pub name: String,
    /// Internal IP, used to resolve the agent pod on that node.
    pub ip: String,
    /// Control-plane or worker.
    pub role: NodeRole,
}

impl ClusterNode {
    /// Convenience constructor used heavily in tests.
    pub fn new(name: impl Into<String>, ip: impl Into<String>, role: NodeRole) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            role,
        }
    }

    /// True if the node may serve as monitor or target.
    pub fn is_worker(&self) -> bool {
        self.role == NodeRole::Worker
    }
}

/// The selected participants for one probe run.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Node the route-table change feed is captured on.
    pub monitor: ClusterNode,
    /// Node whose agent is disrupted.
    pub target: ClusterNode,
}

impl Topology {
    /// Select a monitor node and a target node from the full ordered node
    /// list (control-plane entries lead the list as the cluster reports
    /// them).
    ///
    /// Takes the first two workers in list order, so the same input always
    /// yields the same selection. Fails with
    /// [`HarnessError::InsufficientTopology`] when fewer than three nodes
    /// exist or fewer than two workers remain after excluding control-plane
    /// nodes.
    pub fn select(nodes: &[ClusterNode]) -> Result<Self> {
        let mut workers = nodes.iter().filter(|n| n.is_worker());

        match (workers.next(), workers.next()) {
            (Some(monitor), Some(target)) if nodes.len() >= 3 => Ok(Self {
                monitor: monitor.clone(),
                target: target.clone(),
            }),
            _ => Err(HarnessError::InsufficientTopology {
                found: nodes.len(),
                workers: nodes.iter().filter(|n| n.is_worker()).count(),
            }),
        }
    }
}
