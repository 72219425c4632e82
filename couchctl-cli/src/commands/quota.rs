//! Memory Quota Command

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use couchctl_core::{ClusterClient, QuotaKind};

/// Quota configuration, in megabytes
pub struct QuotaConfig {
    pub data: Option<u64>,
    pub index: Option<u64>,
}

impl QuotaConfig {
    fn updates(&self) -> Vec<(QuotaKind, u64)> {
        [(QuotaKind::Data, self.data), (QuotaKind::Index, self.index)]
            .into_iter()
            .filter_map(|(kind, mb)| mb.map(|mb| (kind, mb)))
            .collect()
    }
}

/// Run memory-quota command
pub async fn run(client: &ClusterClient, config: QuotaConfig) -> Result<()> {
    let updates = config.updates();
    if updates.is_empty() {
        anyhow::bail!("Nothing to update: pass --data and/or --index");
    }

    for (kind, mb) in updates {
        client
            .update_memory_quota(kind, mb)
            .await
            .with_context(|| format!("Failed to set {}", kind.form_key()))?;
        println!(
            "{} {} = {} MB",
            style(symbols::CHECK).green(),
            kind.form_key(),
            mb
        );
    }
    Ok(())
}
