//! Topology Commands
//!
//! Shows cluster membership, the addressed node and the cluster identity.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use couchctl_core::{ClusterClient, NodeInfo};

/// Nodes configuration
pub struct NodesConfig {
    pub json: bool,
}

/// List cluster members
pub async fn run(client: &ClusterClient, config: NodesConfig) -> Result<()> {
    let nodes = client.list_nodes().await.context("Failed to list nodes")?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    println!("{}", style("Cluster Nodes").bold().underlined());
    println!();
    for node in &nodes {
        let marker = if node.this_node { symbols::SELF_NODE } else { " " };
        let status = if node.is_healthy() {
            style(node.status.as_str()).green()
        } else {
            style(node.status.as_str()).yellow()
        };
        println!("{} {} {}", marker, format_row(node), status);
    }
    println!();
    println!("{} {} node(s)", style(symbols::INFO).cyan(), nodes.len());

    Ok(())
}

/// Show the node behind the configured URL
pub async fn info(client: &ClusterClient) -> Result<()> {
    let node = client.info().await.context("Failed to read node info")?;

    println!("{}", style("Node Info").bold().underlined());
    println!();
    println!("  Hostname:     {}", style(&node.hostname).cyan());
    println!("  OTP node:     {}", node.otp_node.as_deref().unwrap_or("-"));
    println!("  Status:       {}", node.status);
    println!("  Membership:   {}", node.cluster_membership);
    println!("  Services:     {}", format_services(node));
    if !node.version.is_empty() {
        println!("  Version:      {}", node.version);
    }
    if node.memory_quota > 0 {
        println!("  Data quota:   {} MB", node.memory_quota);
    }
    if node.index_memory_quota > 0 {
        println!("  Index quota:  {} MB", node.index_memory_quota);
    }

    Ok(())
}

/// Show the cluster identity
pub async fn cluster(client: &ClusterClient) -> Result<()> {
    let identity = client
        .cluster()
        .await
        .context("Failed to read cluster identity")?;

    println!("{}", style("Cluster").bold().underlined());
    println!();
    println!("  UUID:         {}", style(&identity.uuid).cyan());
    println!("  Enterprise:   {}", identity.is_enterprise);
    println!("  Admin URL:    {}", client.url());
    println!("  Admin port:   {}", client.port());

    let members = client
        .known_otp_nodes()
        .await
        .context("Failed to list members")?;
    println!("  Members:      {}", members.join(", "));

    Ok(())
}

fn format_services(node: &NodeInfo) -> String {
    if node.services.is_empty() {
        "-".to_string()
    } else {
        node.services.join(",")
    }
}

/// One membership line without styling
fn format_row(node: &NodeInfo) -> String {
    format!(
        "{:<24} {:<24} {:<10} {:<14}",
        node.hostname,
        node.otp_node.as_deref().unwrap_or("-"),
        node.cluster_membership,
        format_services(node),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row() {
        let mut node = NodeInfo::new("10.0.0.2:8091", "ns_1@10.0.0.2");
        node.services = vec!["kv".to_string(), "index".to_string()];
        let row = format_row(&node);
        assert!(row.starts_with("10.0.0.2:8091"));
        assert!(row.contains("ns_1@10.0.0.2"));
        assert!(row.contains("active"));
        assert!(row.contains("kv,index"));
    }

    #[test]
    fn test_format_row_joining_node() {
        let node = NodeInfo {
            otp_node: None,
            ..NodeInfo::new("10.0.0.3:8091", "")
        };
        assert!(format_row(&node).contains(" - "));
        assert_eq!(format_services(&node), "-");
    }
}
