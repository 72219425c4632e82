//! Wire models for the cluster administration API
//!
//! Field names follow the JSON the cluster emits (camelCase). All snapshots
//! are immutable; a fresh poll produces fresh values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Node status value reported once a node is fully up
pub const STATUS_HEALTHY: &str = "healthy";

/// Ceiling for a server-suggested poll interval
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// One cluster member as reported by `/pools/default`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// External address (`host:port`)
    #[serde(default)]
    pub hostname: String,
    /// Internal identity, e.g. `ns_1@10.0.0.2`. Absent while joining.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_node: Option<String>,
    #[serde(default)]
    pub cluster_membership: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub this_node: bool,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uptime: String,
    #[serde(default)]
    pub cluster_compatibility: u64,
    #[serde(default)]
    pub memory_quota: u64,
    #[serde(default)]
    pub index_memory_quota: u64,
}

impl NodeInfo {
    /// Build a node record with the fields the control plane relies on
    pub fn new(hostname: impl Into<String>, otp_node: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            otp_node: Some(otp_node.into()),
            cluster_membership: "active".to_string(),
            status: STATUS_HEALTHY.to_string(),
            ..Default::default()
        }
    }

    /// Mark this record as the node the client is addressing
    pub fn as_this_node(mut self) -> Self {
        self.this_node = true;
        self
    }

    /// Override the reported status
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == STATUS_HEALTHY
    }
}

/// Body of `/pools/default`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pool {
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
}

/// Cluster-scoped identity from `/pools`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIdentity {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub is_enterprise: bool,
    #[serde(default)]
    pub is_admin_creds: bool,
}

/// One entry of `/pools/default/tasks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEntry {
    #[serde(rename = "type", default)]
    pub task_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub recommended_refresh_period: f64,
    #[serde(default)]
    pub per_node: BTreeMap<String, serde_json::Value>,
}

/// Snapshot of the rebalance task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebalanceStatus {
    /// Suggested poll interval in seconds
    pub recommended_refresh_period: f64,
    /// OTP handles still taking part in the rebalance
    pub nodes: Vec<String>,
}

impl RebalanceStatus {
    pub const TASK_TYPE: &'static str = "rebalance";
    pub const NOT_RUNNING: &'static str = "notRunning";

    /// Extract the rebalance snapshot from the task list
    pub fn from_tasks(tasks: &[TaskEntry]) -> Self {
        tasks
            .iter()
            .find(|t| t.task_type == Self::TASK_TYPE)
            .map(|t| Self {
                recommended_refresh_period: t.recommended_refresh_period,
                nodes: if t.status == Self::NOT_RUNNING {
                    Vec::new()
                } else {
                    t.per_node.keys().cloned().collect()
                },
            })
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Refresh period as a duration, capped at [`MAX_REFRESH_INTERVAL`];
    /// negative or NaN values map to zero
    pub fn refresh_interval(&self) -> Duration {
        let period = self.recommended_refresh_period;
        if period > 0.0 {
            Duration::from_secs_f64(period.min(MAX_REFRESH_INTERVAL.as_secs_f64()))
        } else {
            Duration::ZERO
        }
    }
}

/// Per-node state of a bucket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketNodeStatus {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub status: String,
}

/// Body of `/pools/default/buckets/{name}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<BucketNodeStatus>,
}

impl BucketStatus {
    /// Ready once present on at least one node and healthy everywhere
    pub fn is_ready(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(|n| n.status == STATUS_HEALTHY)
    }
}

/// Memory quota settings accepted by `/pools/default`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Data,
    Index,
}

impl QuotaKind {
    pub fn form_key(&self) -> &'static str {
        match self {
            QuotaKind::Data => "memoryQuota",
            QuotaKind::Index => "indexMemoryQuota",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pool() {
        let body = r#"{"nodes":[
            {"hostname":"10.0.0.1:8091","otpNode":"ns_1@10.0.0.1","status":"healthy","thisNode":true,"services":["kv"]},
            {"hostname":"10.0.0.2:8091","status":"warmup"}
        ]}"#;
        let pool: Pool = serde_json::from_str(body).unwrap();
        assert_eq!(pool.nodes.len(), 2);
        assert!(pool.nodes[0].this_node);
        assert_eq!(pool.nodes[0].otp_node.as_deref(), Some("ns_1@10.0.0.1"));
        assert_eq!(pool.nodes[1].otp_node, None);
        assert!(!pool.nodes[1].is_healthy());
    }

    #[test]
    fn test_rebalance_status_from_tasks() {
        let body = r#"[
            {"type":"xdcr","status":"running"},
            {"type":"rebalance","status":"running","recommendedRefreshPeriod":0.25,
             "perNode":{"ns_1@b":{"progress":40.0},"ns_1@a":{"progress":10.0}}}
        ]"#;
        let tasks: Vec<TaskEntry> = serde_json::from_str(body).unwrap();
        let status = RebalanceStatus::from_tasks(&tasks);
        assert!(status.is_running());
        assert_eq!(status.nodes, vec!["ns_1@a".to_string(), "ns_1@b".to_string()]);
        assert_eq!(status.refresh_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_rebalance_not_running() {
        let body = r#"[{"type":"rebalance","status":"notRunning","perNode":{"ns_1@a":{}}}]"#;
        let tasks: Vec<TaskEntry> = serde_json::from_str(body).unwrap();
        let status = RebalanceStatus::from_tasks(&tasks);
        assert!(!status.is_running());
        assert_eq!(RebalanceStatus::from_tasks(&[]), RebalanceStatus::default());
    }

    #[test]
    fn test_negative_refresh_period() {
        let status = RebalanceStatus {
            recommended_refresh_period: -1.0,
            nodes: vec![],
        };
        assert_eq!(status.refresh_interval(), Duration::ZERO);
    }

    #[test]
    fn test_oversized_refresh_period_capped() {
        for period in [1e30, 1e300, f64::INFINITY, f64::MAX] {
            let status = RebalanceStatus {
                recommended_refresh_period: period,
                nodes: vec![],
            };
            assert_eq!(status.refresh_interval(), MAX_REFRESH_INTERVAL, "period {}", period);
        }

        let nan = RebalanceStatus {
            recommended_refresh_period: f64::NAN,
            nodes: vec![],
        };
        assert_eq!(nan.refresh_interval(), Duration::ZERO);
    }

    #[test]
    fn test_bucket_ready() {
        let mut bucket = BucketStatus::default();
        assert!(!bucket.is_ready());

        bucket.nodes.push(BucketNodeStatus {
            hostname: "a".into(),
            status: "healthy".into(),
        });
        bucket.nodes.push(BucketNodeStatus {
            hostname: "b".into(),
            status: "warmup".into(),
        });
        assert!(!bucket.is_ready());

        bucket.nodes[1].status = "healthy".into();
        assert!(bucket.is_ready());
    }
}
