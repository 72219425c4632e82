//! Remove Command
//!
//! Ejects nodes from the cluster and waits for the rebalance to finish.
//! Ctrl-C stops waiting and exits with an error; the rebalance itself keeps
//! running server-side.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use couchctl_core::ClusterError;
use couchctl_rebalancer::Rebalancer;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Remove configuration
pub struct RemoveConfig {
    pub addrs: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Run remove command
pub async fn run(rebalancer: &Rebalancer, config: RemoveConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let result = run_with_cancel(rebalancer, config, &cancel).await;
    watcher.abort();
    result
}

/// Run remove command, stopping when `cancel` fires
pub async fn run_with_cancel(
    rebalancer: &Rebalancer,
    config: RemoveConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    println!(
        "{} Removing {} from {}",
        style(symbols::INFO).cyan(),
        config.addrs.join(", "),
        rebalancer.client().url()
    );

    let removal = rebalancer.remove_nodes_with_cancel(&config.addrs, cancel);
    let outcome = match config.timeout {
        Some(limit) => tokio::time::timeout(limit, removal).await.ok(),
        None => Some(removal.await),
    };

    match outcome {
        None => {
            anyhow::bail!(
                "Timed out after {}s waiting for the rebalance; it may still be running",
                config.timeout.unwrap_or_default().as_secs()
            );
        }
        Some(Err(ClusterError::Cancelled)) => {
            println!(
                "{} Interrupted. The rebalance keeps running on the cluster.",
                style(symbols::WARN).yellow()
            );
            anyhow::bail!("Removal interrupted before the nodes left the cluster");
        }
        Some(Err(e)) => return Err(e).context("Failed to remove nodes"),
        Some(Ok(())) => {
            println!(
                "{} Removed: {}",
                style(symbols::CHECK).green(),
                config.addrs.join(", ")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchctl_core::{ClusterClient, MemoryCluster, NodeInfo};
    use couchctl_rebalancer::RemovalConfig;
    use std::sync::Arc;

    fn rebalancer() -> (Arc<MemoryCluster>, Rebalancer) {
        let cluster = Arc::new(MemoryCluster::with_nodes(vec![
            NodeInfo::new("a:8091", "ns_1@a").as_this_node(),
            NodeInfo::new("b:8091", "ns_1@b"),
        ]));
        let client = ClusterClient::new("http://a:8091", cluster.clone());
        (cluster, Rebalancer::new(Arc::new(client), RemovalConfig::default()))
    }

    fn remove_b() -> RemoveConfig {
        RemoveConfig {
            addrs: vec!["b".to_string()],
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_interrupted_removal_fails() {
        let (cluster, rebalancer) = rebalancer();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_with_cancel(&rebalancer, remove_b(), &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("interrupted"));
        assert_eq!(cluster.nodes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_removal_succeeds() {
        let (cluster, rebalancer) = rebalancer();
        run_with_cancel(&rebalancer, remove_b(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(cluster.nodes().len(), 1);
    }
}
