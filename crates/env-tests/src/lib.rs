//! Environment Test Suite
//!
//! This crate provides live-cluster tests for the churn harness. Tests run
//! the real probe (docker exec capture, kubectl disruption) against an
//! actual kind-style cluster and assert on the churn verdicts.
//!
//! # Features
//!
//! - `smoke`: Fast cluster shape and agent health checks (30s)
//! - `churn`: Live disruption scenarios (several minutes, mutates the
//!   cluster's network agents)
//! - `all`: Enable all test categories
//!
//! # Prerequisites
//!
//! 1. A kind-style cluster with one control-plane node and at least two
//!    workers, where each node is a container reachable via `docker exec`
//! 2. The network agent DaemonSet deployed (see `CHURN_AGENT_NAMESPACE` /
//!    `CHURN_AGENT_SELECTOR`, defaults `fabric-system` /
//!    `k8s-app=fabric-node`)
//! 3. kubectl in PATH and pointed at the cluster
//! 4. docker in PATH with access to the node containers
//!
//! # Usage
//!
//! ```bash
//! # From repo root - runs 0 env-tests (no default features)
//! cargo test
//!
//! # Smoke tests only (30s)
//! cargo test -p env-tests --features smoke
//!
//! # Live churn scenarios (restart the agents; keep them serial)
//! cargo test -p env-tests --features churn
//!
//! # Full suite
//! cargo test -p env-tests --features all
//! ```

pub mod scenario;
