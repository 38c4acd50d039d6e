//! The retry/failover loop.
//!
//! One call walks a prefix of the endpoint list in order, always starting from
//! the first endpoint. Every failed attempt is recorded; the call fails with the
//! error of the last attempt once the prefix is exhausted.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;

use crate::ClientError;
use crate::config::{Credentials, RetryPolicy, Sign};
use crate::request::RequestTemplate;
use crate::transport::{RawResponse, Transport};

/// Drives attempts of one request over a [`Transport`].
#[derive(Clone)]
pub(crate) struct RequestEngine {
    transport: Arc<dyn Transport>,
    signer: Option<(Arc<dyn Sign>, Credentials)>,
    policy: RetryPolicy,
}

impl fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEngine")
            .field("signed", &self.signer.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RequestEngine {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        signer: Option<(Arc<dyn Sign>, Credentials)>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            signer,
            policy,
        }
    }

    /// Send `template` to the first `retry_n` endpoints in turn until one
    /// answers with status 200.
    ///
    /// The returned response has status 200 and a fully drained body.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub(crate) async fn send(
        &self,
        endpoints: &[SocketAddr],
        retry_n: usize,
        template: &RequestTemplate,
    ) -> Result<RawResponse, ClientError> {
        let attempts = retry_n.min(endpoints.len());
        let mut timeouts = self.policy.timeouts();
        let mut last_err = None;

        for (attempt, endpoint) in endpoints[..attempts].iter().enumerate() {
            let timeout = timeouts.next_timeout();

            #[cfg(feature = "tracing")]
            tracing::debug!(
                endpoint = %endpoint,
                attempt,
                timeout_ms = timeout.as_millis(),
                "sending request"
            );

            let err = match self.attempt(*endpoint, template, timeout).await? {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            #[cfg(feature = "tracing")]
            tracing::warn!(endpoint = %endpoint, attempt, error = %err, "attempt failed");

            last_err = Some(err);

            if !self.policy.retry_sleep.is_zero() {
                tokio::time::sleep(self.policy.retry_sleep).await;
            }
        }

        match last_err {
            Some(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    request = %template.summary(),
                    attempts,
                    error = %err,
                    "all endpoints failed"
                );
                Err(err)
            }
            None => Err(ClientError::NoAttempts {
                uri: template.uri().to_string(),
            }),
        }
    }

    /// Run one attempt.
    ///
    /// The outer error aborts the loop (request construction or signing
    /// failed); the inner error is a retryable attempt failure.
    async fn attempt(
        &self,
        endpoint: SocketAddr,
        template: &RequestTemplate,
        timeout: std::time::Duration,
    ) -> Result<Result<RawResponse, ClientError>, ClientError> {
        let mut attempt = template.attempt(&endpoint.ip().to_string())?;
        if let Some((signer, credentials)) = &self.signer {
            attempt.sign(signer.as_ref(), credentials)?;
        }
        let request = attempt.to_http()?;

        Ok(match self.transport.send(endpoint, request, timeout).await {
            Ok(response) if response.status == StatusCode::OK => Ok(response),
            Ok(response) => Err(ClientError::invalid_status(
                response.status.as_u16(),
                &response.body,
            )),
            Err(source) => Err(ClientError::Request {
                endpoint,
                request: template.summary(),
                source,
            }),
        })
    }
}
