//! Wait Commands
//!
//! Block until a node answers its liveness probe, or until the addressed
//! node has joined a cluster and reports healthy.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use couchctl_rebalancer::Prober;
use std::time::Duration;

/// Wait until `url` answers
pub async fn ready(prober: &Prober, url: &str, timeout: Duration) -> Result<()> {
    println!(
        "{} Waiting up to {}s for {}",
        style(symbols::INFO).cyan(),
        timeout.as_secs(),
        url
    );
    prober
        .wait_ready(url, timeout)
        .await
        .context("Node did not become ready")?;
    println!("{} {} is ready", style(symbols::CHECK).green(), url);
    Ok(())
}

/// Wait until the addressed node is healthy in a multi-node cluster
pub async fn healthy(prober: &Prober, timeout: Duration) -> Result<()> {
    println!(
        "{} Waiting up to {}s for the node to join and settle",
        style(symbols::INFO).cyan(),
        timeout.as_secs()
    );
    prober
        .wait_healthy(timeout)
        .await
        .context("Node did not become healthy")?;
    println!("{} Node is healthy", style(symbols::CHECK).green());
    Ok(())
}
