//! Route Churn Detection Harness
//!
//! This library probes whether restarting a cluster network agent causes
//! observable route churn on peer nodes. It distinguishes the graceful
//! restart path (agent replaced cleanly, peers keep their routes) from the
//! disruptive path (agent killed abruptly, peers flap routes) by:
//!
//! - Selecting monitor and target worker nodes from the live topology
//! - Capturing the route change feed in the background on the monitor node
//! - Repeatedly disrupting the agent on the target node
//! - Classifying the noise-filtered capture against the scenario's
//!   expectation
//!
//! # Architecture
//!
//! One probe run is a single foreground sequence:
//!
//! ```text
//! probe -> topology            (pick monitor + target workers)
//!       -> observer            (start capture)        -> exec (docker)
//!       -> disruption x cycles (kill or replace agent) -> exec / cluster (kubectl)
//!       -> observer            (stop, filter)
//!       -> classify            (verdict)
//! ```
//!
//! Cluster access and remote execution sit behind traits with scripted
//! mocks, so the whole sequence is testable without a cluster.
//!
//! # Modules
//!
//! - `classify` - Pass/fail verdicts over captured buffers
//! - `cluster` - Cluster API trait, kubectl implementation, mock
//! - `config` - Harness configuration from environment
//! - `diags` - Scoped failure diagnostics guard
//! - `disruption` - Disruption strategies: abrupt kill, graceful replace
//! - `error` - Harness error taxonomy
//! - `exec` - Remote execution trait, docker exec implementation, mock
//! - `observer` - Noise filter and route capture session
//! - `poll` - Bounded fixed-interval retry
//! - `probe` - Orchestrator, probe configuration, churn report
//! - `topology` - Node roles and monitor/target selection

pub mod classify;
pub mod cluster;
pub mod config;
pub mod diags;
pub mod disruption;
pub mod error;
pub mod exec;
pub mod observer;
pub mod poll;
pub mod probe;
pub mod topology;
