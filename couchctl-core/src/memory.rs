//! In-memory cluster
//!
//! A scripted [`Transport`] that answers the admin endpoints from local
//! state. Used for testing and development. Responses are serialized to JSON
//! so the client's decode path runs exactly as against a live cluster.

use crate::error::{ClusterError, Result};
use crate::models::{
    BucketNodeStatus, BucketStatus, ClusterIdentity, NodeInfo, Pool, QuotaKind, RebalanceStatus,
    TaskEntry,
};
use crate::transport::{RawResponse, RequestBody, Transport};
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Method;
use std::collections::{HashMap, VecDeque};

/// One request seen by the in-memory cluster
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

/// Scripted answer for one rebalance status poll
#[derive(Debug, Clone)]
pub enum StatusReply {
    /// Rebalance running with these participants
    Running {
        refresh_period: f64,
        nodes: Vec<String>,
    },
    /// Rebalance finished
    Idle { refresh_period: f64 },
    /// Poll fails with this HTTP status
    Error(u16),
}

struct State {
    nodes: Option<Vec<NodeInfo>>,
    raw_pool_body: Option<Bytes>,
    identity: ClusterIdentity,
    reachable: bool,
    unresponsive: bool,
    failing_node_reads: VecDeque<u16>,
    status_script: VecDeque<StatusReply>,
    rebalance_reject: Option<u16>,
    /// Topology reads after a trigger before ejected nodes leave; `None` never
    eject_after_reads: Option<u32>,
    pending_eject: Option<(Vec<String>, u32)>,
    buckets: HashMap<String, BucketStatus>,
    quotas: HashMap<&'static str, u64>,
    ready_after: HashMap<String, u32>,
    requests: Vec<RecordedRequest>,
    probes: Vec<String>,
}

/// In-memory stand-in for a cluster's admin interface
pub struct MemoryCluster {
    state: Mutex<State>,
}

impl MemoryCluster {
    /// An uninitialized cluster: membership reads answer 404
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                nodes: None,
                raw_pool_body: None,
                identity: ClusterIdentity {
                    uuid: uuid::Uuid::new_v4().simple().to_string(),
                    is_enterprise: false,
                    is_admin_creds: true,
                },
                reachable: true,
                unresponsive: false,
                failing_node_reads: VecDeque::new(),
                status_script: VecDeque::new(),
                rebalance_reject: None,
                eject_after_reads: Some(0),
                pending_eject: None,
                buckets: HashMap::new(),
                quotas: HashMap::new(),
                ready_after: HashMap::new(),
                requests: Vec::new(),
                probes: Vec::new(),
            }),
        }
    }

    /// A bootstrapped cluster with these members
    pub fn with_nodes(nodes: Vec<NodeInfo>) -> Self {
        let cluster = Self::new();
        cluster.set_nodes(nodes);
        cluster
    }

    /// Replace the membership list
    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        self.state.lock().nodes = Some(nodes);
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.state.lock().nodes.clone().unwrap_or_default()
    }

    /// Serve this body verbatim for membership reads
    pub fn set_raw_pool_body(&self, body: impl Into<Bytes>) {
        self.state.lock().raw_pool_body = Some(body.into());
    }

    pub fn set_identity(&self, identity: ClusterIdentity) {
        self.state.lock().identity = identity;
    }

    /// When false every request fails at the transport level
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    /// When true admin requests hang forever without answering
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.lock().unresponsive = unresponsive;
    }

    /// Answer the next `count` membership reads with `status`
    pub fn fail_node_reads(&self, count: usize, status: u16) {
        let mut state = self.state.lock();
        state.failing_node_reads.extend(std::iter::repeat(status).take(count));
    }

    /// Queue an answer for a future rebalance status poll
    pub fn push_status(&self, reply: StatusReply) {
        self.state.lock().status_script.push_back(reply);
    }

    /// Reject rebalance triggers with `status`
    pub fn reject_rebalance(&self, status: u16) {
        self.state.lock().rebalance_reject = Some(status);
    }

    /// Ejected nodes leave the membership after this many membership reads
    /// following the trigger; `None` keeps them forever
    pub fn set_eject_after_reads(&self, reads: Option<u32>) {
        self.state.lock().eject_after_reads = reads;
    }

    /// Create or replace a bucket with one node entry per status
    pub fn set_bucket(&self, name: &str, node_statuses: &[&str]) {
        let nodes = node_statuses
            .iter()
            .enumerate()
            .map(|(i, status)| BucketNodeStatus {
                hostname: format!("node{}", i),
                status: status.to_string(),
            })
            .collect();
        self.state.lock().buckets.insert(
            name.to_string(),
            BucketStatus {
                name: name.to_string(),
                nodes,
            },
        );
    }

    pub fn memory_quota(&self, kind: QuotaKind) -> Option<u64> {
        self.state.lock().quotas.get(kind.form_key()).copied()
    }

    /// `url` answers liveness probes after `failures` unsuccessful attempts
    pub fn set_ready_after(&self, url: &str, failures: u32) {
        self.state.lock().ready_after.insert(url.to_string(), failures);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn count_requests(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Bodies of every rebalance trigger received
    pub fn rebalance_requests(&self) -> Vec<RequestBody> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == Method::POST && r.path == "/controller/rebalance")
            .map(|r| r.body.clone())
            .collect()
    }

    pub fn probe_count(&self, url: &str) -> usize {
        self.state.lock().probes.iter().filter(|p| *p == url).count()
    }

    fn read_pool(state: &mut State) -> Result<RawResponse> {
        if let Some(status) = state.failing_node_reads.pop_front() {
            return Ok(RawResponse::status_only(status));
        }

        if let Some((ejected, remaining)) = state.pending_eject.take() {
            if remaining == 0 {
                if let Some(nodes) = state.nodes.as_mut() {
                    nodes.retain(|n| {
                        n.otp_node
                            .as_ref()
                            .map_or(true, |otp| !ejected.contains(otp))
                    });
                }
            } else {
                state.pending_eject = Some((ejected, remaining - 1));
            }
        }

        if let Some(body) = &state.raw_pool_body {
            return Ok(RawResponse::ok(body.clone()));
        }
        match &state.nodes {
            None => Ok(RawResponse::status_only(404)),
            Some(nodes) => {
                let pool = Pool {
                    nodes: nodes.clone(),
                };
                Ok(RawResponse::ok(serde_json::to_vec(&pool)?))
            }
        }
    }

    fn read_tasks(state: &mut State) -> Result<RawResponse> {
        let task = match state.status_script.pop_front() {
            Some(StatusReply::Error(status)) => return Ok(RawResponse::status_only(status)),
            Some(StatusReply::Running {
                refresh_period,
                nodes,
            }) => TaskEntry {
                task_type: RebalanceStatus::TASK_TYPE.to_string(),
                status: "running".to_string(),
                recommended_refresh_period: refresh_period,
                per_node: nodes
                    .into_iter()
                    .map(|n| (n, serde_json::json!({ "progress": 50.0 })))
                    .collect(),
            },
            Some(StatusReply::Idle { refresh_period }) => TaskEntry {
                task_type: RebalanceStatus::TASK_TYPE.to_string(),
                status: RebalanceStatus::NOT_RUNNING.to_string(),
                recommended_refresh_period: refresh_period,
                per_node: Default::default(),
            },
            None => TaskEntry {
                task_type: RebalanceStatus::TASK_TYPE.to_string(),
                status: RebalanceStatus::NOT_RUNNING.to_string(),
                ..Default::default()
            },
        };
        Ok(RawResponse::ok(serde_json::to_vec(&vec![task])?))
    }

    fn trigger_rebalance(state: &mut State, body: &RequestBody) -> RawResponse {
        if let Some(status) = state.rebalance_reject {
            return RawResponse::new(status, "Rebalance rejected");
        }
        let ejected: Vec<String> = body
            .form_value("ejectedNodes")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(reads) = state.eject_after_reads {
            state.pending_eject = Some((ejected, reads));
        }
        RawResponse::ok(Bytes::new())
    }

    fn update_pool_settings(state: &mut State, body: &RequestBody) -> RawResponse {
        for kind in [QuotaKind::Data, QuotaKind::Index] {
            if let Some(value) = body.form_value(kind.form_key()) {
                match value.parse() {
                    Ok(mb) => {
                        state.quotas.insert(kind.form_key(), mb);
                    }
                    Err(_) => return RawResponse::new(400, "invalid quota"),
                }
            }
        }
        RawResponse::ok(Bytes::new())
    }
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryCluster {
    async fn request(&self, method: Method, path: &str, body: RequestBody) -> Result<RawResponse> {
        let unresponsive = {
            let mut state = self.state.lock();
            state.requests.push(RecordedRequest {
                method: method.clone(),
                path: path.to_string(),
                body: body.clone(),
            });
            state.unresponsive
        };
        if unresponsive {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if !state.reachable {
            return Err(ClusterError::ConnectionFailed("connection refused".to_string()));
        }

        let bucket = path.strip_prefix("/pools/default/buckets/");
        match (method, path, bucket) {
            (Method::GET, "/pools/default", _) => Self::read_pool(&mut state),
            (Method::POST, "/pools/default", _) => Ok(Self::update_pool_settings(&mut state, &body)),
            (Method::GET, "/pools", _) => Ok(RawResponse::ok(serde_json::to_vec(&state.identity)?)),
            (Method::GET, "/pools/default/tasks", _) => Self::read_tasks(&mut state),
            (Method::POST, "/controller/rebalance", _) => {
                Ok(Self::trigger_rebalance(&mut state, &body))
            }
            (Method::GET, _, Some(name)) => match state.buckets.get(name) {
                Some(bucket) => Ok(RawResponse::ok(serde_json::to_vec(bucket)?)),
                None => Ok(RawResponse::new(404, "Requested resource not found.")),
            },
            (Method::DELETE, _, Some(name)) => match state.buckets.remove(name) {
                Some(_) => Ok(RawResponse::ok(Bytes::new())),
                None => Ok(RawResponse::new(404, "Requested resource not found.")),
            },
            _ => Ok(RawResponse::status_only(404)),
        }
    }

    async fn probe(&self, url: &str) -> Result<RawResponse> {
        let mut state = self.state.lock();
        state.probes.push(url.to_string());

        if !state.reachable {
            return Err(ClusterError::ConnectionFailed("connection refused".to_string()));
        }
        match state.ready_after.get_mut(url) {
            None => Err(ClusterError::ConnectionFailed(format!("{}: connection refused", url))),
            Some(0) => Ok(RawResponse::ok("OK")),
            Some(remaining) => {
                *remaining -= 1;
                Ok(RawResponse::status_only(503))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_eject_applied_after_reads() {
        let cluster = MemoryCluster::with_nodes(vec![
            NodeInfo::new("a", "ns_1@a"),
            NodeInfo::new("b", "ns_1@b"),
        ]);
        cluster.set_eject_after_reads(Some(1));

        let body = RequestBody::form([("ejectedNodes", "ns_1@b"), ("knownNodes", "ns_1@a,ns_1@b")]);
        cluster
            .request(Method::POST, "/controller/rebalance", body)
            .await
            .unwrap();

        let first = cluster
            .request(Method::GET, "/pools/default", RequestBody::Empty)
            .await
            .unwrap();
        let pool: Pool = serde_json::from_slice(&first.body).unwrap();
        assert_eq!(pool.nodes.len(), 2);

        cluster
            .request(Method::GET, "/pools/default", RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(cluster.nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_status_script_drains_to_idle() {
        let cluster = MemoryCluster::new();
        cluster.push_status(StatusReply::Error(500));

        let resp = cluster
            .request(Method::GET, "/pools/default/tasks", RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(resp.status, 500);

        let resp = cluster
            .request(Method::GET, "/pools/default/tasks", RequestBody::Empty)
            .await
            .unwrap();
        let tasks: Vec<TaskEntry> = serde_json::from_slice(&resp.body).unwrap();
        assert!(!RebalanceStatus::from_tasks(&tasks).is_running());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let cluster = MemoryCluster::new();
        cluster.set_reachable(false);
        let err = cluster
            .request(Method::GET, "/pools", RequestBody::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::ConnectionFailed(_)));
        assert_eq!(cluster.requests().len(), 1);
    }
}
