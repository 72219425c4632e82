//! Cluster client
//!
//! Read/parse glue over a [`Transport`]: topology, cluster identity, the
//! rebalance trigger and status, bucket status and memory quotas. None of
//! these calls retry; retry policy belongs to the callers.
//!
//! The self-node and cluster-identity lookups are memoized per handle in a
//! [`OnceCell`], so concurrent first callers wait for a single fetch and the
//! cached value is never replaced afterwards.

use crate::error::{ClusterError, Result};
use crate::models::{
    BucketStatus, ClusterIdentity, NodeInfo, Pool, QuotaKind, RebalanceStatus, TaskEntry,
};
use crate::transport::{check_status, decode_json, RequestBody, Transport};
use reqwest::{Method, Url};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

const POOLS_PATH: &str = "/pools";
const POOL_DEFAULT_PATH: &str = "/pools/default";
const TASKS_PATH: &str = "/pools/default/tasks";
const REBALANCE_PATH: &str = "/controller/rebalance";

/// Default port when the admin URL does not carry one
const DEFAULT_PORT: u16 = 80;

/// Pick the entry flagged as the addressed node
pub fn find_self(nodes: &[NodeInfo]) -> Result<&NodeInfo> {
    nodes
        .iter()
        .find(|n| n.this_node)
        .ok_or(ClusterError::SelfNotFound)
}

/// Handle on one cluster's administrative interface
pub struct ClusterClient {
    transport: Arc<dyn Transport>,
    url: String,
    this_node: OnceCell<NodeInfo>,
    identity: OnceCell<ClusterIdentity>,
}

impl ClusterClient {
    /// Create a client for the cluster at `url`
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            url: url.into(),
            this_node: OnceCell::new(),
            identity: OnceCell::new(),
        }
    }

    /// Admin URL this handle addresses
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Port of the admin URL; the scheme default when none is given, 80
    /// when the URL does not parse
    pub fn port(&self) -> u16 {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.port_or_known_default())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Prime the self-node cache; call before sharing the handle
    pub async fn connect(&self) -> Result<()> {
        self.info().await.map(|_| ())
    }

    /// Read the current membership list
    #[instrument(skip(self))]
    pub async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        debug!("Getting node information");
        let response = self
            .transport
            .request(Method::GET, POOL_DEFAULT_PATH, RequestBody::Empty)
            .await?;

        if response.status == 404 {
            return Err(ClusterError::Uninitialized);
        }
        check_status(&response, &[200])?;

        let pool: Pool = decode_json(&response)?;
        Ok(pool.nodes)
    }

    /// OTP handles of every member; members still joining are skipped
    pub async fn known_otp_nodes(&self) -> Result<Vec<String>> {
        let nodes = self.list_nodes().await?;
        Ok(nodes.into_iter().filter_map(|n| n.otp_node).collect())
    }

    /// The addressed node, fetched once per handle
    pub async fn info(&self) -> Result<&NodeInfo> {
        self.this_node
            .get_or_try_init(|| async {
                let nodes = self.list_nodes().await?;
                find_self(&nodes).cloned()
            })
            .await
    }

    /// Cluster identity, fetched once per handle
    #[instrument(skip(self))]
    pub async fn cluster(&self) -> Result<&ClusterIdentity> {
        self.identity
            .get_or_try_init(|| async {
                let response = self
                    .transport
                    .request(Method::GET, POOLS_PATH, RequestBody::Empty)
                    .await?;
                check_status(&response, &[200])?;
                let identity: ClusterIdentity = decode_json(&response)?;
                debug!(uuid = %identity.uuid, "Cached cluster identity");
                Ok::<_, ClusterError>(identity)
            })
            .await
    }

    pub async fn cluster_id(&self) -> Result<String> {
        Ok(self.cluster().await?.uuid.clone())
    }

    /// Compare an externally observed UUID with the cached identity
    pub async fn verify_cluster_id(&self, observed: &str) -> Result<()> {
        let cached = self.cluster_id().await?;
        if cached != observed {
            return Err(ClusterError::ClusterMismatch {
                cached,
                observed: observed.to_string(),
            });
        }
        Ok(())
    }

    /// Start a rebalance that keeps `known_nodes` and ejects `ejected_nodes`
    #[instrument(skip(self))]
    pub async fn rebalance(&self, known_nodes: &[String], ejected_nodes: &[String]) -> Result<()> {
        debug!(ejected = ?ejected_nodes, known = ?known_nodes, "Triggering rebalance");
        let body = RequestBody::form([
            ("ejectedNodes", ejected_nodes.join(",")),
            ("knownNodes", known_nodes.join(",")),
        ]);
        let response = self
            .transport
            .request(Method::POST, REBALANCE_PATH, body)
            .await?;
        check_status(&response, &[200])
    }

    /// Snapshot of the running rebalance, if any
    pub async fn rebalance_status(&self) -> Result<RebalanceStatus> {
        let response = self
            .transport
            .request(Method::GET, TASKS_PATH, RequestBody::Empty)
            .await?;
        check_status(&response, &[200])?;
        let tasks: Vec<TaskEntry> = decode_json(&response)?;
        Ok(RebalanceStatus::from_tasks(&tasks))
    }

    /// Set a memory quota in megabytes
    #[instrument(skip(self))]
    pub async fn update_memory_quota(&self, kind: QuotaKind, quota_mb: u64) -> Result<()> {
        debug!(key = kind.form_key(), quota_mb, "Updating memory quota");
        let body = RequestBody::form([(kind.form_key(), quota_mb.to_string())]);
        let response = self
            .transport
            .request(Method::POST, POOL_DEFAULT_PATH, body)
            .await?;
        check_status(&response, &[200])
    }

    /// Whether bucket `name` exists and is healthy on every node
    pub async fn bucket_ready(&self, name: &str) -> Result<bool> {
        let response = self
            .transport
            .request(Method::GET, &bucket_path(name)?, RequestBody::Empty)
            .await?;
        if response.status != 200 {
            return Ok(false);
        }
        let status: BucketStatus = decode_json(&response)?;
        Ok(status.is_ready())
    }

    #[instrument(skip(self))]
    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        debug!(bucket = name, "Deleting bucket");
        let path = bucket_path(name)?;
        let response = self
            .transport
            .request(Method::DELETE, &path, RequestBody::Empty)
            .await
            .map_err(|e| ClusterError::DeleteBucket {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        check_status(&response, &[200])
    }

    /// Liveness probe against an arbitrary URL
    pub async fn ping(&self, url: &str) -> Result<()> {
        let response = self.transport.probe(url).await?;
        check_status(&response, &[200])
    }
}

/// Path of bucket `name`, encoded as a single segment
fn bucket_path(name: &str) -> Result<String> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(ClusterError::InvalidBucketName(name.to_string()));
    }
    let mut url = Url::parse("http://localhost")?;
    url.path_segments_mut()
        .map_err(|_| ClusterError::InvalidBucketName(name.to_string()))?
        .extend(["pools", "default", "buckets", name]);
    Ok(url.path().to_string())
}
