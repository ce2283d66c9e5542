//! Pluggable agent disruption strategies.
//!
//! A strategy takes the agent down and does not return until the target
//! node's agent is running and ready again, so each orchestrator cycle
//! starts from a converged cluster. The two shipped strategies model the two
//! restart paths under test: an abrupt in-place kill and a graceful pod
//! replacement.

use crate::cluster::{AgentInstance, ClusterApi};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::exec::NodeExec;
use crate::poll::{retry_until_success, RetryPolicy};
use crate::topology::ClusterNode;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// One way of disrupting the agent on the target node.
#[async_trait]
pub trait Disruption: Send + Sync {
    /// Strategy name for logs and reports.
    fn name(&self) -> &'static str;

    /// Disrupt the agent and wait for convergence.
    ///
    /// Returns the instance identity that is serving the target node after
    /// convergence; the caller threads it into the next cycle.
    async fn disrupt(
        &self,
        target: &ClusterNode,
        instance: &AgentInstance,
    ) -> Result<AgentInstance>;
}

/// Kill the agent process in place and wait for its supervisor to restart
/// it.
///
/// The settle pause after the process reappears gives the restarted daemon
/// time to re-establish peerings before the next cycle disrupts it again.
pub struct AbruptKill<E: NodeExec> {
    exec: Arc<E>,
    process: String,
    policy: RetryPolicy,
    settle: Duration,
}

impl<E: NodeExec> AbruptKill<E> {
    pub fn new(
        exec: Arc<E>,
        process: impl Into<String>,
        policy: RetryPolicy,
        settle: Duration,
    ) -> Self {
        Self {
            exec,
            process: process.into(),
            policy,
            settle,
        }
    }

    pub fn from_config(exec: Arc<E>, config: &HarnessConfig) -> Self {
        Self::new(
            exec,
            &config.agent_process,
            RetryPolicy::new(config.ready_retries, config.ready_interval),
            config.settle,
        )
    }
}

#[async_trait]
impl<E: NodeExec> Disruption for AbruptKill<E> {
    fn name(&self) -> &'static str {
        "abrupt-kill"
    }

    async fn disrupt(
        &self,
        target: &ClusterNode,
        instance: &AgentInstance,
    ) -> Result<AgentInstance> {
        info!(
            target: "churn.disrupt",
            node = %target.name,
            process = %self.process,
            "killing agent process"
        );
        self.exec
            .run(&target.name, &format!("pkill {}", self.process))
            .await?;

        let check = format!("pgrep {}", self.process);
        retry_until_success(self.policy, || async {
            self.exec.run(&target.name, &check).await.map(|_| ())
        })
        .await?;

        info!(
            target: "churn.disrupt",
            node = %target.name,
            process = %self.process,
            settle_secs = self.settle.as_secs(),
            "agent process restarted, settling"
        );
        sleep(self.settle).await;

        // An in-place kill never changes the pod identity.
        Ok(instance.clone())
    }
}

/// Delete the agent pod and wait for its replacement to become ready.
pub struct GracefulReplace<A: ClusterApi> {
    api: Arc<A>,
    policy: RetryPolicy,
    ready_timeout: Duration,
}

impl<A: ClusterApi> GracefulReplace<A> {
    pub fn new(api: Arc<A>, policy: RetryPolicy, ready_timeout: Duration) -> Self {
        Self {
            api,
            policy,
            ready_timeout,
        }
    }

    pub fn from_config(api: Arc<A>, config: &HarnessConfig) -> Self {
        Self::new(
            api,
            RetryPolicy::new(config.ready_retries, config.ready_interval),
            config.ready_timeout,
        )
    }
}

#[async_trait]
impl<A: ClusterApi> Disruption for GracefulReplace<A> {
    fn name(&self) -> &'static str {
        "graceful-replace"
    }

    async fn disrupt(
        &self,
        target: &ClusterNode,
        instance: &AgentInstance,
    ) -> Result<AgentInstance> {
        info!(
            target: "churn.disrupt",
            node = %target.name,
            instance = %instance.name,
            "deleting agent pod"
        );
        self.api.delete_agent(instance).await?;

        // The deleted pod can keep resolving briefly; convergence means a
        // replacement identity, not just any resolution.
        let refreshed = retry_until_success(self.policy, || async {
            let found = self.api.find_agent(&target.ip).await?;
            if found == *instance {
                return Err(HarnessError::InstanceNotFound {
                    node_ip: target.ip.clone(),
                });
            }
            Ok(found)
        })
        .await?;

        info!(
            target: "churn.disrupt",
            node = %target.name,
            instance = %refreshed.name,
            timeout_secs = self.ready_timeout.as_secs(),
            "waiting for replacement agent to become ready"
        );
        self.api
            .wait_agent_ready(&refreshed, self.ready_timeout)
            .await?;

        Ok(refreshed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::mock::MockClusterApi;
    use crate::exec::mock::MockNodeExec;
    use crate::topology::NodeRole;

    fn target() -> ClusterNode {
        ClusterNode::new("kind-worker2", "172.18.0.4", NodeRole::Worker)
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_abrupt_kill_waits_for_restart() {
        let exec = Arc::new(MockNodeExec::new());
        let kill = AbruptKill::new(
            exec.clone(),
            "bird",
            fast_policy(10),
            Duration::from_millis(1),
        );
        let instance = AgentInstance::new("fabric-node-7x2kp");

        let refreshed = kill.disrupt(&target(), &instance).await.unwrap();

        assert_eq!(refreshed, instance);
        let pkill = exec.first_index_of("pkill bird").unwrap();
        let pgrep = exec.first_index_of("pgrep bird").unwrap();
        assert!(pkill < pgrep);
    }

    #[tokio::test]
    async fn test_abrupt_kill_retries_until_process_returns() {
        let exec = Arc::new(MockNodeExec::new());
        exec.fail_then_succeed("pgrep bird", 2);
        let kill = AbruptKill::new(
            exec.clone(),
            "bird",
            fast_policy(10),
            Duration::from_millis(1),
        );

        kill.disrupt(&target(), &AgentInstance::new("fabric-node-7x2kp"))
            .await
            .unwrap();

        let pgreps = exec
            .calls()
            .iter()
            .filter(|c| c.command.contains("pgrep bird"))
            .count();
        assert_eq!(pgreps, 3);
    }

    #[tokio::test]
    async fn test_abrupt_kill_exhausts_budget_when_process_never_returns() {
        let exec = Arc::new(MockNodeExec::new());
        exec.fail_with("pgrep bird", "no such process");
        let kill = AbruptKill::new(
            exec.clone(),
            "bird",
            fast_policy(2),
            Duration::from_millis(1),
        );

        let err = kill
            .disrupt(&target(), &AgentInstance::new("fabric-node-7x2kp"))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::RetryExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_abrupt_kill_propagates_kill_failure() {
        let exec = Arc::new(MockNodeExec::new());
        exec.fail_with("pkill bird", "no process matched");
        let kill = AbruptKill::new(
            exec.clone(),
            "bird",
            fast_policy(2),
            Duration::from_millis(1),
        );

        let err = kill
            .disrupt(&target(), &AgentInstance::new("fabric-node-7x2kp"))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::RemoteCommand { .. }));
    }

    #[tokio::test]
    async fn test_graceful_replace_requires_new_identity() {
        let api = Arc::new(MockClusterApi::new());
        // The old pod resolves once more before the replacement appears.
        api.queue_agent("fabric-node-old");
        api.queue_agent("fabric-node-new");
        let replace = GracefulReplace::new(api.clone(), fast_policy(10), Duration::from_secs(120));
        let instance = AgentInstance::new("fabric-node-old");

        let refreshed = replace.disrupt(&target(), &instance).await.unwrap();

        assert_eq!(refreshed.name, "fabric-node-new");
        assert_eq!(api.deleted(), vec!["fabric-node-old".to_string()]);
        assert_eq!(api.ready_waits(), vec!["fabric-node-new".to_string()]);
    }

    #[tokio::test]
    async fn test_graceful_replace_tolerates_resolution_gap() {
        let api = Arc::new(MockClusterApi::new());
        api.queue_agent_missing();
        api.queue_agent("fabric-node-new");
        let replace = GracefulReplace::new(api.clone(), fast_policy(10), Duration::from_secs(120));

        let refreshed = replace
            .disrupt(&target(), &AgentInstance::new("fabric-node-old"))
            .await
            .unwrap();

        assert_eq!(refreshed.name, "fabric-node-new");
    }

    #[tokio::test]
    async fn test_graceful_replace_exhausts_budget_when_old_pod_lingers() {
        let api = Arc::new(MockClusterApi::new());
        api.queue_agent("fabric-node-old");
        let replace = GracefulReplace::new(api.clone(), fast_policy(3), Duration::from_secs(120));

        let err = replace
            .disrupt(&target(), &AgentInstance::new("fabric-node-old"))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::RetryExhausted { attempts: 3, .. }));
        assert!(api.ready_waits().is_empty());
    }

    #[tokio::test]
    async fn test_graceful_replace_propagates_delete_failure() {
        let api = Arc::new(MockClusterApi::new());
        api.fail_deletes("pods \"fabric-node-old\" is forbidden");
        let replace = GracefulReplace::new(api.clone(), fast_policy(3), Duration::from_secs(120));

        let err = replace
            .disrupt(&target(), &AgentInstance::new("fabric-node-old"))
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::ClusterApi(_)));
        assert_eq!(api.find_calls(), 0);
    }
}
