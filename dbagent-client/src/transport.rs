//! HTTP transport layer for the data-agent client.
//!
//! A [`Transport`] sends one attempt to one endpoint and returns the status,
//! headers and the completely drained body. The default implementation is
//! [`HyperTransport`]; tests and embedders can plug in their own.
//!
//! # Example
//!
//! ```ignore
//! use dbagent_client::transport::HyperTransportBuilder;
//! use std::time::Duration;
//!
//! let transport = HyperTransportBuilder::new()
//!     .pool_idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::error::TransportError;

mod hyper;

pub use self::hyper::{HyperTransport, HyperTransportBuilder};

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A fully read response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

/// Sends a single attempt.
///
/// `request` carries a path-only URI; the transport is responsible for
/// addressing `endpoint`. The whole exchange, body drain included, must finish
/// within `timeout`.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        endpoint: SocketAddr,
        request: http::Request<Bytes>,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<RawResponse, TransportError>>;
}
