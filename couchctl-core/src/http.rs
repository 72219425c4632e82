//! HTTP transport
//!
//! reqwest-backed [`Transport`] for a live cluster. Injects basic
//! credentials on admin requests and supports a custom CA certificate for
//! clusters behind TLS.

use crate::error::{ClusterError, Result};
use crate::transport::{RawResponse, RequestBody, Transport};
use reqwest::{Client, Method, StatusCode, Url};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};

/// Basic-auth credentials for the admin API
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TLS configuration for the admin endpoint
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to CA certificate (PEM format) for verifying the cluster
    pub ca_cert: Option<PathBuf>,
    /// Skip server certificate verification (DANGEROUS - only for development)
    pub danger_accept_invalid_certs: bool,
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for admin requests (zero disables it)
    pub request_timeout: Duration,
    /// Timeout for liveness probes
    pub probe_timeout: Duration,
    pub tls: Option<TlsConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::ZERO,
            probe_timeout: Duration::from_secs(3),
            tls: None,
        }
    }
}

/// Transport talking to a live cluster over HTTP(S)
pub struct HttpTransport {
    client: Client,
    probe_client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    /// Create a transport with default settings
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        Self::with_config(base_url, credentials, HttpConfig::default())
    }

    /// Create a transport with explicit timeouts and TLS settings
    pub fn with_config(
        base_url: &str,
        credentials: Option<Credentials>,
        config: HttpConfig,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        let mut builder = Client::builder();
        if !config.request_timeout.is_zero() {
            builder = builder.timeout(config.request_timeout);
        }
        let mut probe_builder = Client::builder().timeout(config.probe_timeout);

        if let Some(tls) = &config.tls {
            if let Some(ca_path) = &tls.ca_cert {
                let pem = std::fs::read(ca_path).map_err(|e| {
                    ClusterError::ConnectionFailed(format!(
                        "reading CA certificate {}: {}",
                        ca_path.display(),
                        e
                    ))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem)?;
                builder = builder.add_root_certificate(cert.clone());
                probe_builder = probe_builder.add_root_certificate(cert);
            }

            if tls.danger_accept_invalid_certs {
                builder = builder.danger_accept_invalid_certs(true);
                probe_builder = probe_builder.danger_accept_invalid_certs(true);
            }
        }

        Ok(Self {
            client: builder.build()?,
            probe_client: probe_builder.build()?,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(base = %self.base_url))]
    async fn request(&self, method: Method, path: &str, body: RequestBody) -> Result<RawResponse> {
        let url = self.base_url.join(path)?;
        debug!(method = %method, url = %url, "Sending admin request");

        let mut req = self.client.request(method, url);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }
        if let RequestBody::Form(pairs) = &body {
            req = req.form(pairs);
        }

        let response = req.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClusterError::AuthenticationFailed);
        }

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse { status, body })
    }

    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<RawResponse> {
        let url = Url::parse(url)?;
        let response = self.probe_client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse { status, body })
    }
}
