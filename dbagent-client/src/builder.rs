//! Client builder for the data-agent client.
//!
//! Provides a fluent API for configuring and building a [`Client`].

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use dbagent_core::{Conversion, FieldConversions};
use http::HeaderValue;

use crate::client::Client;
use crate::config::{Credentials, RetryPolicy, Sign, defaults};
use crate::engine::RequestEngine;
use crate::error::TransportError;
use crate::subject::Shared;
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`Client`].
///
/// # Example
///
/// ```ignore
/// use dbagent_client::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new(["10.0.0.1".parse()?, "10.0.0.2".parse()?], 3306)
///     .timeout(Duration::from_secs(2))
///     .convert("user", "age", "to_int")
///     .build()?;
/// ```
pub struct ClientBuilder {
    /// Replica addresses in retry order.
    ips: Vec<IpAddr>,
    /// Port shared by every replica.
    port: u16,
    /// API version segment of the request path.
    api_version: String,
    /// Prefix of the shard response headers.
    shard_header_prefix: String,
    /// `User-Agent` header value.
    user_agent: String,
    /// Timeout escalation and inter-attempt delay.
    policy: RetryPolicy,
    credentials: Option<Credentials>,
    signer: Option<Arc<dyn Sign>>,
    /// Custom transport. Defaults to [`HyperTransport`].
    transport: Option<Arc<dyn Transport>>,
    /// Typed conversions per subject.
    conversions: BTreeMap<String, FieldConversions>,
    /// Conversions given by name, resolved in `build()`.
    named_conversions: Vec<(String, String, String)>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("ips", &self.ips)
            .field("port", &self.port)
            .field("api_version", &self.api_version)
            .field("shard_header_prefix", &self.shard_header_prefix)
            .field("user_agent", &self.user_agent)
            .field("policy", &self.policy)
            .field("credentials", &self.credentials)
            .field("signer", &self.signer.is_some())
            .field("transport", &self.transport.is_some())
            .field("conversions", &self.conversions)
            .field("named_conversions", &self.named_conversions)
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new ClientBuilder for replicas at `ips`, all listening on `port`.
    ///
    /// The order of `ips` is the retry order of every call.
    pub fn new<I>(ips: I, port: u16) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        Self {
            ips: ips.into_iter().collect(),
            port,
            api_version: defaults::API_VERSION.to_string(),
            shard_header_prefix: defaults::SHARD_HEADER_PREFIX.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            policy: RetryPolicy::default(),
            credentials: None,
            signer: None,
            transport: None,
            conversions: BTreeMap::new(),
            named_conversions: Vec::new(),
        }
    }

    /// Set the API version segment of the request path.
    ///
    /// Default: `v1`.
    pub fn api_version<S: Into<String>>(mut self, version: S) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the prefix of the shard response headers.
    ///
    /// Default: `x-acid-`.
    pub fn shard_header_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.shard_header_prefix = prefix.into();
        self
    }

    /// Set the `User-Agent` header value.
    ///
    /// Default: `unknown`.
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the timeout of the first attempt.
    ///
    /// Default: 5 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = timeout;
        self
    }

    /// Set the multiplier applied to the timeout after each failed attempt.
    ///
    /// Default: 1.5. Values below 1.0 are rejected by `build()`.
    pub fn timeout_ratio(mut self, ratio: f64) -> Self {
        self.policy.timeout_ratio = ratio;
        self
    }

    /// Set the delay after each failed attempt.
    ///
    /// Default: 10 milliseconds.
    pub fn retry_sleep(mut self, sleep: Duration) -> Self {
        self.policy.retry_sleep = sleep;
        self
    }

    /// Replace the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sign every attempt with `credentials`.
    ///
    /// A signer must be configured too.
    pub fn credentials<A, S>(mut self, access_key: A, secret_key: S) -> Self
    where
        A: Into<String>,
        S: Into<String>,
    {
        self.credentials = Some(Credentials::new(access_key, secret_key));
        self
    }

    /// Set the signer used when credentials are configured.
    pub fn signer<S: Sign + 'static>(mut self, signer: S) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Use a custom transport instead of [`HyperTransport`].
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Convert `field` of every result row of `subject` with the conversion
    /// called `conversion` (e.g. `to_int`).
    ///
    /// Unknown names are reported by `build()`.
    pub fn convert<S, F, C>(mut self, subject: S, field: F, conversion: C) -> Self
    where
        S: Into<String>,
        F: Into<String>,
        C: Into<String>,
    {
        self.named_conversions
            .push((subject.into(), field.into(), conversion.into()));
        self
    }

    /// Set the field conversions of `subject`, replacing earlier ones.
    pub fn conversions<S: Into<String>>(mut self, subject: S, conversions: FieldConversions) -> Self {
        self.conversions.insert(subject.into(), conversions);
        self
    }

    /// Build the Client.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry policy is invalid, a conversion name is
    /// unknown, the user agent is not a valid header value, credentials are
    /// set without a signer, or the default transport cannot be created.
    pub fn build(self) -> Result<Client, ClientBuildError> {
        self.policy
            .validate()
            .map_err(ClientBuildError::InvalidPolicy)?;

        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|_| ClientBuildError::InvalidUserAgent(self.user_agent.clone()))?;

        let mut conversions = self.conversions;
        for (subject, field, name) in self.named_conversions {
            let conversion: Conversion = match name.parse() {
                Ok(conversion) => conversion,
                Err(_) => {
                    return Err(ClientBuildError::UnknownConversion {
                        subject,
                        field,
                        name,
                    });
                }
            };
            let entry = conversions.entry(subject).or_default();
            *entry = std::mem::take(entry).field(field, conversion);
        }

        let signer = match (self.credentials, self.signer) {
            (Some(credentials), Some(signer)) => Some((signer, credentials)),
            (Some(_), None) => return Err(ClientBuildError::MissingSigner),
            (None, _) => None,
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new().map_err(ClientBuildError::Transport)?),
        };

        let port = self.port;
        let shared = Shared {
            endpoints: self
                .ips
                .into_iter()
                .map(|ip| SocketAddr::new(ip, port))
                .collect(),
            engine: RequestEngine::new(transport, signer, self.policy),
            api_version: self.api_version,
            shard_header_prefix: self.shard_header_prefix,
            user_agent,
        };

        Ok(Client::new(Arc::new(shared), port, conversions))
    }
}

/// Error type for client building failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The retry policy is invalid.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(&'static str),

    /// A conversion name does not match any known conversion.
    #[error("unknown conversion {name:?} for field {field:?} of subject {subject:?}")]
    UnknownConversion {
        subject: String,
        field: String,
        name: String,
    },

    /// The user agent is not a valid header value.
    #[error("invalid user agent: {0:?}")]
    InvalidUserAgent(String),

    /// Credentials were configured without a signer.
    #[error("credentials are configured but no signer is set")]
    MissingSigner,

    /// The default transport could not be created.
    #[error("failed to create transport: {0}")]
    Transport(#[source] TransportError),
}
