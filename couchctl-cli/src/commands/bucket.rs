//! Bucket Commands
//!
//! Bucket readiness checks and deletion.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use couchctl_core::ClusterClient;

/// Bucket delete configuration
pub struct DeleteConfig {
    pub name: String,
    pub force: bool,
}

/// Report whether a bucket is healthy on every node; fails when it is not
pub async fn ready(client: &ClusterClient, name: &str) -> Result<()> {
    let ready = client
        .bucket_ready(name)
        .await
        .context("Failed to check bucket")?;

    if !ready {
        println!("{} Bucket {} is not ready", style(symbols::CROSS).red(), name);
        anyhow::bail!("Bucket {} is not ready", name);
    }
    println!("{} Bucket {} is ready", style(symbols::CHECK).green(), name);
    Ok(())
}

/// Delete a bucket
pub async fn delete(client: &ClusterClient, config: DeleteConfig) -> Result<()> {
    if !config.force {
        println!(
            "{} About to delete bucket {} on {}",
            style("Warning:").yellow(),
            config.name,
            client.url()
        );
        println!("\nUse --force to delete without confirmation.");
        return Ok(());
    }

    client.delete_bucket(&config.name).await?;

    println!("{} Deleted bucket: {}", style(symbols::CHECK).green(), config.name);
    Ok(())
}
