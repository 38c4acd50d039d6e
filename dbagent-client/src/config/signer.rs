//! Request signing.
//!
//! When credentials are configured, every attempt is passed to a [`Sign`]
//! implementation after its `Host` header has been set. The signer returns the
//! headers to add (e.g. `Authorization`, a date and a payload hash); they are
//! stored as per-attempt overrides and never touch the shared request template.
//!
//! # Example
//!
//! ```
//! use dbagent_client::{Credentials, SignFn, SignRequest};
//! use http::HeaderMap;
//!
//! let signer = SignFn::new(|req: &SignRequest<'_>, creds: &Credentials| {
//!     let mut headers = HeaderMap::new();
//!     let value = format!("KEY {}:{}", creds.access_key(), req.uri);
//!     headers.insert(
//!         http::header::AUTHORIZATION,
//!         value
//!             .parse()
//!             .map_err(|_| dbagent_client::ClientError::Encode("bad header".into()))?,
//!     );
//!     Ok(headers)
//! });
//! ```

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::ClientError;

/// An access/secret key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new<A: Into<String>, S: Into<String>>(access_key: A, secret_key: S) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Get the access key.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Get the secret key.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Read-only view of one attempt handed to a signer.
#[derive(Debug)]
pub struct SignRequest<'a> {
    pub method: &'a Method,
    /// Path of the request (`/api/{version}/{subject}/{action}`).
    pub uri: &'a str,
    /// Full headers of this attempt, `Host` included.
    pub headers: &'a HeaderMap,
    pub body: &'a Bytes,
    /// Whether the payload must be covered by the signature. Always true for
    /// data-agent calls.
    pub sign_payload: bool,
}

/// Trait for signing requests.
///
/// Implementations must be a pure function of the request view and the
/// credentials; the returned headers replace any header of the same name.
pub trait Sign: Send + Sync {
    fn sign(
        &self,
        request: &SignRequest<'_>,
        credentials: &Credentials,
    ) -> Result<HeaderMap, ClientError>;
}

/// The unit type signs nothing.
impl Sign for () {
    #[inline]
    fn sign(
        &self,
        _request: &SignRequest<'_>,
        _credentials: &Credentials,
    ) -> Result<HeaderMap, ClientError> {
        Ok(HeaderMap::new())
    }
}

/// A wrapper that adapts a closure to the [`Sign`] trait.
pub struct SignFn<F> {
    f: F,
}

impl<F> SignFn<F>
where
    F: Fn(&SignRequest<'_>, &Credentials) -> Result<HeaderMap, ClientError> + Send + Sync,
{
    /// Create a new signer from a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for SignFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignFn").finish()
    }
}

impl<F> Sign for SignFn<F>
where
    F: Fn(&SignRequest<'_>, &Credentials) -> Result<HeaderMap, ClientError> + Send + Sync,
{
    fn sign(
        &self,
        request: &SignRequest<'_>,
        credentials: &Credentials,
    ) -> Result<HeaderMap, ClientError> {
        (self.f)(request, credentials)
    }
}
