//! couchctl core
//!
//! Building blocks for driving a cluster's administrative REST interface:
//! - `ClusterClient` for topology, identity, rebalance and bucket calls
//! - `Transport` trait with the reqwest-backed `HttpTransport`
//! - `MemoryCluster`, a scripted in-memory cluster for tests (`testing` feature)
//! - Wire models and the `ClusterError` taxonomy

pub mod address;
pub mod client;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod models;
pub mod transport;

pub use client::{find_self, ClusterClient};
pub use error::{ClusterError, Result};
pub use http::{Credentials, HttpConfig, HttpTransport, TlsConfig};
#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryCluster, StatusReply};
pub use models::{
    BucketStatus, ClusterIdentity, NodeInfo, QuotaKind, RebalanceStatus, MAX_REFRESH_INTERVAL,
    STATUS_HEALTHY,
};
pub use reqwest::Method;
pub use transport::{check_status, decode_json, RawResponse, RequestBody, Transport};

/// Default admin port of a cluster node
pub const DEFAULT_ADMIN_PORT: u16 = 8091;
