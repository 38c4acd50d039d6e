//! Hyper-based HTTP transport.
//!
//! This module provides [`HyperTransport`], the default transport, using
//! hyper_util's legacy client over plain HTTP/1.1 with connection pooling.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::{BoxFuture, RawResponse, Transport};
use crate::error::TransportError;

/// Type alias for the hyper client with a plain HTTP connector.
type HyperClient = Client<HttpConnector, Full<Bytes>>;

/// HTTP transport using hyper_util's legacy client.
///
/// # Example
///
/// ```ignore
/// use dbagent_client::transport::HyperTransport;
///
/// let transport = HyperTransport::builder()
///     .pool_max_idle_per_host(4)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Create a new transport with default settings.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    async fn exchange(
        &self,
        endpoint: SocketAddr,
        request: http::Request<Bytes>,
    ) -> Result<RawResponse, TransportError> {
        let (mut parts, body) = request.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        parts.uri = format!("http://{}{}", endpoint, path)
            .parse()
            .map_err(|e| TransportError::InvalidRequest(format!("invalid uri: {}", e)))?;
        let request = http::Request::from_parts(parts, Full::new(body));

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connect(format!("request failed: {}", e)))?;

        let (parts, body) = response.into_parts();
        let body = drain(body).await?;

        Ok(RawResponse::new(parts.status, parts.headers, body))
    }
}

/// Read the body frame by frame until it is exhausted.
async fn drain(mut body: Incoming) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| TransportError::Body(e.to_string()))?;
        // Trailers carry no payload.
        if let Ok(data) = frame.into_data() {
            buf.extend_from_slice(&data);
        }
    }
    Ok(buf.freeze())
}

impl Transport for HyperTransport {
    fn send(
        &self,
        endpoint: SocketAddr,
        request: http::Request<Bytes>,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            tokio::time::timeout(timeout, self.exchange(endpoint, request))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
        })
    }
}

/// Builder for [`HyperTransport`].
///
/// # Example
///
/// ```ignore
/// use dbagent_client::transport::HyperTransportBuilder;
/// use std::time::Duration;
///
/// let transport = HyperTransportBuilder::new()
///     .pool_idle_timeout(Duration::from_secs(90))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct HyperTransportBuilder {
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
    /// TCP connect timeout, independent of the attempt timeout.
    connect_timeout: Option<Duration>,
    /// Set `TCP_NODELAY` on new connections.
    nodelay: bool,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            connect_timeout: None,
            nodelay: true,
        }
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Disable connection pool idle timeout.
    pub fn pool_idle_timeout_none(mut self) -> Self {
        self.pool_idle_timeout = None;
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32. Zero disables pooling.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set a TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set whether `TCP_NODELAY` is enabled. Default: true.
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HyperTransport, TransportError> {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(self.nodelay);
        connector.set_connect_timeout(self.connect_timeout);

        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout to take effect.
        builder.pool_timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        Ok(HyperTransport {
            client: builder.build(connector),
        })
    }
}
