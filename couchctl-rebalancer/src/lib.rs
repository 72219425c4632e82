//! couchctl Rebalancer Library
//!
//! Cluster membership operations built on top of [`couchctl_core`]:
//! - Identity resolution (node addresses to OTP handles)
//! - Node removal (trigger a rebalance and wait for the nodes to leave)
//! - Readiness and health probing (wait for a node to come up and settle)

pub mod config;
pub mod orchestrator;
pub mod prober;
pub mod resolver;

// Re-export main types
pub use config::{ConfigError, ProbeConfig, RemovalConfig};
pub use orchestrator::{Rebalancer, RemovalTracker, StatusVerdict, TopologyVerdict};
pub use prober::{check_healthy, poll_every, Prober};
pub use resolver::{resolve, ResolvedNodes, Resolver};
