//! Transport abstraction
//!
//! The client never opens connections itself; it hands a method, a path and
//! an optional form body to a [`Transport`] and gets the raw status and body
//! back. [`crate::http::HttpTransport`] talks to a real cluster,
//! [`crate::memory::MemoryCluster`] stands in for one in tests.

use crate::error::{ClusterError, Result};
use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;

/// Longest body excerpt carried in an error
const BODY_EXCERPT_LEN: usize = 512;

/// Request payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` pairs, in order
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Build a form body from borrowed pairs
    pub fn form<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        RequestBody::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Look up a form field
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }
}

/// Raw status and body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    pub fn status_only(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    /// Body as lossy UTF-8, truncated for error messages
    pub fn excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        match text.char_indices().nth(BODY_EXCERPT_LEN) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.into_owned(),
        }
    }
}

/// Carries requests to the cluster's administrative interface
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request against the configured admin endpoint
    async fn request(&self, method: Method, path: &str, body: RequestBody) -> Result<RawResponse>;

    /// Unauthenticated GET against an arbitrary URL (liveness)
    async fn probe(&self, url: &str) -> Result<RawResponse>;
}

/// Fail unless the response carries one of `expected`
pub fn check_status(response: &RawResponse, expected: &[u16]) -> Result<()> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    Err(ClusterError::UnexpectedStatus {
        got: response.status,
        expected: expected.to_vec(),
        body: response.excerpt(),
    })
}

/// Decode a JSON body
pub fn decode_json<T: DeserializeOwned>(response: &RawResponse) -> Result<T> {
    Ok(serde_json::from_slice(&response.body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pool;

    #[test]
    fn test_check_status() {
        let resp = RawResponse::ok("{}");
        assert!(check_status(&resp, &[200]).is_ok());

        let resp = RawResponse::new(503, "overloaded");
        let err = check_status(&resp, &[200, 202]).unwrap_err();
        assert_eq!(
            err,
            ClusterError::UnexpectedStatus {
                got: 503,
                expected: vec![200, 202],
                body: "overloaded".to_string(),
            }
        );
    }

    #[test]
    fn test_excerpt_truncates() {
        let resp = RawResponse::new(500, "x".repeat(2000));
        let excerpt = resp.excerpt();
        assert!(excerpt.len() < 600);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_decode_json() {
        let pool: Pool = decode_json(&RawResponse::ok(r#"{"nodes":[]}"#)).unwrap();
        assert!(pool.nodes.is_empty());

        let err = decode_json::<Pool>(&RawResponse::ok("<html>")).unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_form_value() {
        let body = RequestBody::form([("ejectedNodes", "a"), ("knownNodes", "a,b")]);
        assert_eq!(body.form_value("knownNodes"), Some("a,b"));
        assert_eq!(body.form_value("missing"), None);
        assert_eq!(RequestBody::Empty.form_value("knownNodes"), None);
    }
}
