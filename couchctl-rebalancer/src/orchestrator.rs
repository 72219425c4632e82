//! Rebalance orchestration
//!
//! Removes nodes from the cluster and waits until they are gone:
//! - Resolving: addresses to OTP handles, every address must match
//! - Triggering: one rebalance call with the known and ejected sets
//! - Polling: rebalance status first, membership once the ejected nodes
//!   are no longer rebalancing
//! - Done, or Failed with `StuckRemoval` when ejected nodes stay listed
//!
//! The polling decisions live in [`RemovalTracker`], which performs no I/O.
//! [`Rebalancer`] feeds it poll results and sleeps on the tokio timer, so
//! tests drive it with a paused clock.

use crate::config::RemovalConfig;
use crate::resolver::Resolver;
use couchctl_core::{ClusterClient, ClusterError, NodeInfo, RebalanceStatus, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of feeding a status snapshot to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusVerdict {
    /// An ejected node is still rebalancing
    Running,
    /// None of the ejected nodes is rebalancing; check membership next
    Settled,
}

/// Outcome of feeding a membership snapshot to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyVerdict {
    /// Every ejected node has left
    Done,
    /// Some ejected nodes are still listed; keep polling
    StillPresent(Vec<String>),
    /// Ejected nodes stayed listed for too many consecutive checks
    Stuck(Vec<String>),
}

/// Polling state of one removal run
#[derive(Debug)]
pub struct RemovalTracker {
    eject: Vec<String>,
    config: RemovalConfig,
    delay: Duration,
    still_present: u32,
}

impl RemovalTracker {
    pub fn new(eject: Vec<String>, config: RemovalConfig) -> Self {
        Self {
            eject,
            config,
            delay: Duration::ZERO,
            still_present: 0,
        }
    }

    /// How long to sleep before the next poll
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Consecutive checks that found ejected nodes still listed
    pub fn still_present(&self) -> u32 {
        self.still_present
    }

    pub fn eject(&self) -> &[String] {
        &self.eject
    }

    /// A status poll failed; retry after the short backoff
    pub fn on_status_error(&mut self) {
        self.delay = self.config.status_retry_backoff;
    }

    pub fn on_status(&mut self, status: &RebalanceStatus) -> StatusVerdict {
        self.delay = status.refresh_interval().max(self.config.min_poll_interval);

        let rebalancing = self
            .eject
            .iter()
            .any(|otp| status.nodes.iter().any(|n| n == otp));
        if rebalancing {
            self.still_present = 0;
            StatusVerdict::Running
        } else {
            StatusVerdict::Settled
        }
    }

    pub fn on_topology(&mut self, nodes: &[NodeInfo]) -> TopologyVerdict {
        let present: Vec<String> = self
            .eject
            .iter()
            .filter(|otp| nodes.iter().any(|n| n.otp_node.as_ref() == Some(*otp)))
            .cloned()
            .collect();

        if present.is_empty() {
            return TopologyVerdict::Done;
        }

        self.still_present += 1;
        if self.still_present > self.config.stuck_threshold {
            TopologyVerdict::Stuck(present)
        } else {
            TopologyVerdict::StillPresent(present)
        }
    }
}

/// Drives node removal against one cluster
pub struct Rebalancer {
    client: Arc<ClusterClient>,
    config: RemovalConfig,
}

impl Rebalancer {
    pub fn new(client: Arc<ClusterClient>, config: RemovalConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &ClusterClient {
        &self.client
    }

    /// Remove the nodes at `addrs` and wait for the rebalance to finish
    pub async fn remove_nodes(&self, addrs: &[String]) -> Result<()> {
        self.remove_nodes_with_cancel(addrs, &CancellationToken::new())
            .await
    }

    /// Like [`Rebalancer::remove_nodes`], aborting with `Cancelled` when
    /// `cancel` fires
    ///
    /// Cancellation interrupts any pending admin request as well as the
    /// sleep between polls.
    #[instrument(skip(self, cancel))]
    pub async fn remove_nodes_with_cancel(
        &self,
        addrs: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if addrs.is_empty() {
            info!("No nodes to remove");
            return Ok(());
        }

        let resolver = Resolver::new(&self.client);
        let resolved = until_cancelled(cancel, resolver.resolve_otp_nodes(addrs)).await?;
        resolved.ensure_complete(addrs.len())?;

        until_cancelled(cancel, self.client.rebalance(&resolved.known, &resolved.eject)).await?;
        info!(ejected = ?resolved.eject, "Rebalance started");

        let result = self.wait_for_ejection(&resolved.eject, cancel).await;
        if matches!(result, Err(ClusterError::Cancelled)) {
            warn!(ejected = ?resolved.eject, "Node removal cancelled");
        }
        result
    }

    async fn wait_for_ejection(&self, eject: &[String], cancel: &CancellationToken) -> Result<()> {
        let mut tracker = RemovalTracker::new(eject.to_vec(), self.config.clone());

        loop {
            until_cancelled(cancel, async {
                tokio::time::sleep(tracker.delay()).await;
                Ok(())
            })
            .await?;

            let status = match until_cancelled(cancel, self.client.rebalance_status()).await {
                Ok(status) => status,
                Err(ClusterError::Cancelled) => return Err(ClusterError::Cancelled),
                Err(e) => {
                    warn!(
                        error = %e,
                        transient = e.is_transient(),
                        "Error while checking rebalance status"
                    );
                    tracker.on_status_error();
                    continue;
                }
            };

            if tracker.on_status(&status) == StatusVerdict::Running {
                debug!(active = ?status.nodes, "Rebalance in progress");
                continue;
            }

            let nodes = match until_cancelled(cancel, self.client.list_nodes()).await {
                Ok(nodes) => nodes,
                Err(ClusterError::Cancelled) => return Err(ClusterError::Cancelled),
                Err(e) => {
                    warn!(
                        error = %e,
                        transient = e.is_transient(),
                        "Error while getting nodes"
                    );
                    continue;
                }
            };

            match tracker.on_topology(&nodes) {
                TopologyVerdict::Done => {
                    info!(ejected = ?tracker.eject(), "Rebalance finished");
                    return Ok(());
                }
                TopologyVerdict::StillPresent(present) => {
                    debug!(
                        present = ?present,
                        checks = tracker.still_present(),
                        "Rebalance idle but nodes still in cluster"
                    );
                }
                TopologyVerdict::Stuck(present) => {
                    error!(
                        present = ?present,
                        checks = tracker.still_present(),
                        "Rebalance finished, but node is still in the cluster"
                    );
                    return Err(ClusterError::StuckRemoval {
                        nodes: present,
                        observations: tracker.still_present(),
                    });
                }
            }
        }
    }
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClusterError::Cancelled),
        result = fut => result,
    }
}
