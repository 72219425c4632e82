//! Error types for couchctl
//!
//! Every failure a caller can branch on has its own variant; nothing is
//! reported as a bare string.

use thiserror::Error;

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Unified error type for cluster administration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    // ===== Transport Errors =====
    #[error("Error while connecting: {0}")]
    ConnectionFailed(String),

    #[error("Error authenticating, check user/password")]
    AuthenticationFailed,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // ===== Protocol Errors =====
    #[error("Cluster is not initialized")]
    Uninitialized,

    #[error("expected statusCode '{}', got {got}: {body}", join_codes(.expected))]
    UnexpectedStatus {
        got: u16,
        expected: Vec<u16>,
        body: String,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    // ===== Topology Errors =====
    #[error("No node info found")]
    SelfNotFound,

    #[error("Unable to get OTP name for node {hostname}")]
    MissingIdentity { hostname: String },

    #[error("Some nodes specified to be removed are not part of the cluster: requested {requested}, matched {matched}")]
    IncompleteMatch { requested: usize, matched: usize },

    #[error("Cluster UUID changed: cached {cached}, observed {observed}")]
    ClusterMismatch { cached: String, observed: String },

    // ===== Orchestration Errors =====
    #[error("Rebalance finished, but nodes {nodes:?} are still in the cluster after {observations} checks")]
    StuckRemoval {
        nodes: Vec<String>,
        observations: u32,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // ===== Wait Errors =====
    #[error("Node not ready: {0}")]
    NotReady(String),

    #[error("Timed out waiting for node {0} to become ready")]
    WaitTimeout(String),

    #[error("Timed out waiting for {0} to become healthy")]
    HealthyTimeout(String),

    // ===== Bucket Errors =====
    #[error("Invalid bucket name: '{0}'")]
    InvalidBucketName(String),

    #[error("Error deleting bucket {name}: {reason}")]
    DeleteBucket { name: String, reason: String },
}

impl ClusterError {
    /// True for unexpected status codes and undecodable payloads
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ClusterError::UnexpectedStatus { .. } | ClusterError::MalformedPayload(_)
        )
    }

    /// Errors a polling loop may retry through
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClusterError::ConnectionFailed(_)
                | ClusterError::UnexpectedStatus { .. }
                | ClusterError::MalformedPayload(_)
        )
    }
}

fn join_codes(codes: &[u16]) -> String {
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        ClusterError::MalformedPayload(err.to_string())
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        ClusterError::ConnectionFailed(err.to_string())
    }
}

impl From<url::ParseError> for ClusterError {
    fn from(err: url::ParseError) -> Self {
        ClusterError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClusterError::UnexpectedStatus {
            got: 500,
            expected: vec![200, 202],
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "expected statusCode '200, 202', got 500: boom");

        let err = ClusterError::IncompleteMatch {
            requested: 2,
            matched: 1,
        };
        assert!(err.to_string().contains("requested 2, matched 1"));
    }

    #[test]
    fn test_protocol_classification() {
        assert!(ClusterError::MalformedPayload("x".into()).is_protocol_error());
        assert!(!ClusterError::Uninitialized.is_protocol_error());
        assert!(!ClusterError::SelfNotFound.is_transient());
        assert!(ClusterError::ConnectionFailed("refused".into()).is_transient());
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ClusterError = json_err.into();
        assert!(matches!(err, ClusterError::MalformedPayload(_)));
    }
}
