//! S3 client bound to a single endpoint
//!
//! - HTTP/1.1 over hyper-util's pooled client, TCP_NODELAY, 90s keepalive
//! - native-tls when the endpoint is secure
//! - MinIO liveness probe (`/minio/health/live`) for startup and rechecks
//! - Passive online tracking: a transport failure or timeout marks the
//!   endpoint offline, any HTTP response marks it online again

use crate::lb::{ConnectOptions, EndpointFactory, EndpointHandle};
use crate::s3::signer::S3SignerV4;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// MinIO liveness endpoint
pub const HEALTH_PATH: &str = "/minio/health/live";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Client error: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("Endpoint {endpoint} is unhealthy: {status}")]
    Unhealthy { endpoint: String, status: StatusCode },
}

pub type Result<T> = std::result::Result<T, S3Error>;

/// S3 client for one endpoint
///
/// Clone is cheap; clones share the HTTP connection pool and online state.
#[derive(Clone)]
pub struct S3Client {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    signer: S3SignerV4,
    /// Address as configured (`host[:port]`)
    endpoint: String,
    /// Scheme + address, no trailing slash
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
    online: Arc<AtomicBool>,
}

impl S3Client {
    /// Create a client for a bare `host[:port]` address.
    ///
    /// No network traffic happens here; call [`S3Client::probe`] to check
    /// the endpoint.
    pub fn new(endpoint: &str, options: &ConnectOptions) -> Result<Self> {
        let base_url = base_url(endpoint, options.secure)?;

        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = TlsConnector::new()?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            signer: S3SignerV4::new(options.credentials.clone(), options.region.clone()),
            endpoint: endpoint.to_string(),
            base_url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            online: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout used when the pool rechecks this endpoint
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the liveness endpoint, bounded by `timeout`.
    ///
    /// Any 2xx-4xx answer counts as alive; a 5xx or a network failure
    /// marks the endpoint offline.
    pub async fn probe(&self, timeout: Duration) -> Result<()> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("{}{}", self.base_url, HEALTH_PATH))
            .body(Full::new(Bytes::new()))?;

        let result = match tokio::time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_server_error() => Err(S3Error::Unhealthy {
                endpoint: self.endpoint.clone(),
                status: response.status(),
            }),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(S3Error::Timeout {
                endpoint: self.endpoint.clone(),
                timeout,
            }),
        };

        match &result {
            Ok(()) => debug!(endpoint = %self.endpoint, "health probe ok"),
            Err(e) => debug!(endpoint = %self.endpoint, error = %e, "health probe failed"),
        }
        self.set_online(result.is_ok());
        result
    }

    /// Send one signed request to `path` (which must start with `/`).
    ///
    /// Not retried. Returns the status and body as-is; interpreting S3 error
    /// responses is up to the caller.
    pub async fn request(&self, method: Method, path: &str, body: Bytes) -> Result<(StatusCode, Bytes)> {
        let url = format!("{}{}", self.base_url, path);
        let headers = self
            .signer
            .sign(method.as_str(), &url, BTreeMap::new(), &body);

        let mut builder = Request::builder().method(method).uri(&url);
        for (key, value) in headers.iter() {
            builder = builder.header(key, value);
        }
        let request = builder.body(Full::new(body))?;

        let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                // No HTTP response came back, so the exchange itself failed
                self.set_online(false);
                return Err(e.into());
            }
            Err(_) => {
                self.set_online(false);
                return Err(S3Error::Timeout {
                    endpoint: self.endpoint.clone(),
                    timeout: self.timeout,
                });
            }
        };

        self.set_online(true);
        let status = response.status();
        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                self.set_online(false);
                return Err(e.into());
            }
        };
        Ok((status, body))
    }

    fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::Relaxed);
        if was_online && !online {
            warn!(endpoint = %self.endpoint, "endpoint went offline");
        }
    }
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("base_url", &self.base_url)
            .field("online", &self.online.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EndpointHandle for S3Client {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    async fn recheck(&self) -> bool {
        self.probe(self.health_timeout).await.is_ok()
    }
}

/// Build the base URL for a bare `host[:port]` address
fn base_url(endpoint: &str, secure: bool) -> Result<String> {
    if endpoint.is_empty() || endpoint.contains("://") || endpoint.contains('/') {
        return Err(S3Error::InvalidEndpoint(format!(
            "{:?}: expected host[:port] without scheme or path",
            endpoint
        )));
    }

    let scheme = if secure { "https" } else { "http" };
    let base = format!("{}://{}", scheme, endpoint);
    let parsed = url::Url::parse(&base)
        .map_err(|e| S3Error::InvalidEndpoint(format!("{:?}: {}", endpoint, e)))?;
    if parsed.host_str().is_none() {
        return Err(S3Error::InvalidEndpoint(format!("{:?}: missing host", endpoint)));
    }

    Ok(base)
}

/// Builds one [`S3Client`] per endpoint for an [`EndpointPool`](crate::lb::EndpointPool)
#[derive(Debug, Clone)]
pub struct S3ClientFactory {
    request_timeout: Duration,
    health_timeout: Duration,
}

impl S3ClientFactory {
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Timeout for rechecks performed after the pool's cool-down
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}

impl Default for S3ClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointFactory for S3ClientFactory {
    type Handle = S3Client;

    async fn connect(&self, endpoint: &str, options: &ConnectOptions) -> anyhow::Result<S3Client> {
        Ok(S3Client::new(endpoint, options)?
            .with_timeout(self.request_timeout)
            .with_health_timeout(self.health_timeout))
    }

    async fn health_check(&self, handle: &S3Client, timeout: Duration) -> anyhow::Result<()> {
        handle.probe(timeout).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lb::Credentials;

    fn options(secure: bool) -> ConnectOptions {
        ConnectOptions::new(Credentials::new("key", "secret"), secure)
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("s3-1:9000", false).unwrap(), "http://s3-1:9000");
        assert_eq!(base_url("s3.example.com", true).unwrap(), "https://s3.example.com");
        assert_eq!(base_url("10.0.0.5:9000", true).unwrap(), "https://10.0.0.5:9000");
    }

    #[test]
    fn test_base_url_rejects_scheme_and_path() {
        assert!(matches!(
            base_url("http://s3-1:9000", false),
            Err(S3Error::InvalidEndpoint(_))
        ));
        assert!(matches!(
            base_url("s3-1:9000/bucket", false),
            Err(S3Error::InvalidEndpoint(_))
        ));
        assert!(matches!(base_url("", false), Err(S3Error::InvalidEndpoint(_))));
        assert!(matches!(
            base_url("s3-1:notaport", false),
            Err(S3Error::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_client_starts_online() {
        let client = S3Client::new("s3-1:9000", &options(true)).unwrap();
        assert!(client.is_online());
        assert_eq!(client.endpoint(), "s3-1:9000");
        assert_eq!(client.base_url(), "https://s3-1:9000");
    }

    #[tokio::test]
    async fn test_clones_share_online_state() {
        let client = S3Client::new("s3-1:9000", &options(false)).unwrap();
        let clone = client.clone();

        client.set_online(false);
        assert!(!clone.is_online());
    }

    #[tokio::test]
    async fn test_probe_unreachable_marks_offline() {
        // Port 1 on loopback refuses connections
        let client = S3Client::new("127.0.0.1:1", &options(false)).unwrap();

        let result = client.probe(Duration::from_secs(2)).await;
        assert!(result.is_err());
        assert!(!client.is_online());
        assert!(!client.recheck().await);
    }
}
