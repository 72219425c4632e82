//! Readiness and health probing
//!
//! Coarse liveness checks: probe on a fixed tick until the check passes or
//! the caller's timeout elapses. The deadline wins over a tick that lands on
//! the same instant and interrupts a probe still in flight, so a timeout is
//! reported exactly when it expires.

use crate::config::ProbeConfig;
use couchctl_core::{find_self, ClusterClient, ClusterError, Result, STATUS_HEALTHY};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, instrument};

/// Minimum membership size before a node counts as joined
const MIN_JOINED_NODES: usize = 2;

/// Shortest accepted probe interval
const MIN_TICK: Duration = Duration::from_millis(1);

/// Stand-in for "no deadline" when `timeout` does not fit on the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Run `check` every `tick` until it succeeds; `None` once `timeout` passes
///
/// A zero `tick` is raised to 1 ms. Timeouts too large for the clock wait
/// for at most 30 years.
pub async fn poll_every<F, Fut, T>(tick: Duration, timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let tick = tick.clamp(MIN_TICK, FAR_FUTURE);
    let start = Instant::now();
    let deadline = start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE);
    let mut ticker = interval_at(start + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => return None,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = sleep_until(deadline) => return None,
            outcome = check() => outcome,
        };

        match outcome {
            Ok(value) => return Some(value),
            Err(e) => debug!(error = %e, "Probe not yet successful"),
        }
    }
}

/// Check that the addressed node has joined and reports healthy
pub async fn check_healthy(client: &ClusterClient) -> Result<()> {
    let nodes = client.list_nodes().await?;

    // TODO: compare cluster UUIDs once joining nodes expose the target cluster's id
    if nodes.len() < MIN_JOINED_NODES {
        return Err(ClusterError::NotReady(format!(
            "node hasn't joined the cluster yet ({} members)",
            nodes.len()
        )));
    }

    let this_node = find_self(&nodes)?;
    if this_node.status != STATUS_HEALTHY {
        return Err(ClusterError::NotReady(format!(
            "status of node is '{}', expected '{}'",
            this_node.status, STATUS_HEALTHY
        )));
    }
    Ok(())
}

/// Waits for nodes to come up and settle
pub struct Prober {
    client: Arc<ClusterClient>,
    config: ProbeConfig,
}

impl Prober {
    pub fn new(client: Arc<ClusterClient>, config: ProbeConfig) -> Self {
        Self { client, config }
    }

    /// Wait until `url` answers the liveness probe
    #[instrument(skip(self))]
    pub async fn wait_ready(&self, url: &str, timeout: Duration) -> Result<bool> {
        let client: &ClusterClient = &self.client;
        poll_every(self.config.tick, timeout, move || client.ping(url))
            .await
            .map(|_| true)
            .ok_or_else(|| ClusterError::WaitTimeout(url.to_string()))
    }

    /// Wait until the addressed node is in a multi-node cluster and healthy
    #[instrument(skip(self))]
    pub async fn wait_healthy(&self, timeout: Duration) -> Result<()> {
        let client: &ClusterClient = &self.client;
        poll_every(self.config.tick, timeout, move || check_healthy(client))
            .await
            .ok_or_else(|| ClusterError::HealthyTimeout(client.url().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchctl_core::{MemoryCluster, NodeInfo};

    fn client_for(cluster: &Arc<MemoryCluster>) -> ClusterClient {
        ClusterClient::new("http://a:8091", cluster.clone())
    }

    #[tokio::test]
    async fn test_check_healthy() {
        let cluster = Arc::new(MemoryCluster::with_nodes(vec![
            NodeInfo::new("a", "ns_1@a").as_this_node(),
            NodeInfo::new("b", "ns_1@b"),
        ]));
        check_healthy(&client_for(&cluster)).await.unwrap();
    }

    #[tokio::test]
    async fn test_single_node_not_healthy() {
        let cluster = Arc::new(MemoryCluster::with_nodes(vec![
            NodeInfo::new("a", "ns_1@a").as_this_node()
        ]));
        assert!(check_healthy(&client_for(&cluster)).await.is_err());
    }

    #[tokio::test]
    async fn test_warmup_not_healthy() {
        let cluster = Arc::new(MemoryCluster::with_nodes(vec![
            NodeInfo::new("a", "ns_1@a").as_this_node().with_status("warmup"),
            NodeInfo::new("b", "ns_1@b"),
        ]));
        let err = check_healthy(&client_for(&cluster)).await.unwrap_err();
        assert!(err.to_string().contains("warmup"));
    }

    #[tokio::test]
    async fn test_missing_self_not_healthy() {
        let cluster = Arc::new(MemoryCluster::with_nodes(vec![
            NodeInfo::new("a", "ns_1@a"),
            NodeInfo::new("b", "ns_1@b"),
        ]));
        assert_eq!(
            check_healthy(&client_for(&cluster)).await.unwrap_err(),
            ClusterError::SelfNotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_every_first_check_after_one_tick() {
        let start = Instant::now();
        let value = poll_every(Duration::from_secs(1), Duration::from_secs(10), || async {
            Ok::<_, ClusterError>(7)
        })
        .await;
        assert_eq!(value, Some(7));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_every_deadline_interrupts_slow_check() {
        let start = Instant::now();
        let value: Option<()> = poll_every(Duration::from_secs(1), Duration::from_secs(3), || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(value, None);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_every_unbounded_timeout() {
        let start = Instant::now();
        let value = poll_every(Duration::from_secs(1), Duration::MAX, || async {
            Ok::<_, ClusterError>("up")
        })
        .await;
        assert_eq!(value, Some("up"));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_every_zero_tick() {
        let start = Instant::now();
        let mut attempts = 0;
        let value = poll_every(Duration::ZERO, Duration::from_secs(1), || {
            attempts += 1;
            let outcome = if attempts < 3 {
                Err(ClusterError::NotReady("starting".to_string()))
            } else {
                Ok(attempts)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(value, Some(3));
        assert_eq!(start.elapsed(), Duration::from_millis(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_with_huge_timeout() {
        let cluster = Arc::new(MemoryCluster::new());
        cluster.set_ready_after("http://b:8091/", 0);
        let prober = Prober::new(
            Arc::new(client_for(&cluster)),
            ProbeConfig { tick: Duration::ZERO },
        );

        let ready = prober
            .wait_ready("http://b:8091/", Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert!(ready);
    }
}
