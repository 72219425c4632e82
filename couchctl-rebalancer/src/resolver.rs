//! Identity resolution
//!
//! Maps externally known node addresses to the OTP handles the rebalance
//! endpoint expects, splitting the handles to eject from the full known set.

use couchctl_core::address::contains_host;
use couchctl_core::{ClusterClient, ClusterError, NodeInfo, Result};
use tracing::{debug, instrument};

/// Handles produced by one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedNodes {
    /// Handles of the nodes to remove
    pub eject: Vec<String>,
    /// Handles of every current member, ejected ones included
    pub known: Vec<String>,
}

impl ResolvedNodes {
    /// Fail unless every requested address matched a member
    pub fn ensure_complete(&self, requested: usize) -> Result<()> {
        if self.eject.len() != requested {
            return Err(ClusterError::IncompleteMatch {
                requested,
                matched: self.eject.len(),
            });
        }
        Ok(())
    }
}

/// Resolve `addrs` against a topology snapshot
///
/// Aborts with `MissingIdentity` if any member has no OTP handle yet, since
/// the known-node list would otherwise be incomplete.
pub fn resolve(nodes: &[NodeInfo], addrs: &[String]) -> Result<ResolvedNodes> {
    let mut resolved = ResolvedNodes::default();

    for node in nodes {
        let otp = node
            .otp_node
            .as_deref()
            .filter(|otp| !otp.is_empty())
            .ok_or_else(|| ClusterError::MissingIdentity {
                hostname: node.hostname.clone(),
            })?;

        resolved.known.push(otp.to_string());
        if contains_host(addrs, &node.hostname) {
            resolved.eject.push(otp.to_string());
        }
    }

    Ok(resolved)
}

/// Reads topology and resolves addresses to OTP handles
pub struct Resolver<'a> {
    client: &'a ClusterClient,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a ClusterClient) -> Self {
        Self { client }
    }

    /// Resolve `addrs` against a fresh topology read
    #[instrument(skip(self))]
    pub async fn resolve_otp_nodes(&self, addrs: &[String]) -> Result<ResolvedNodes> {
        let nodes = self.client.list_nodes().await?;
        let resolved = resolve(&nodes, addrs)?;
        debug!(
            eject = ?resolved.eject,
            known = resolved.known.len(),
            "Resolved OTP nodes"
        );
        Ok(resolved)
    }
}
