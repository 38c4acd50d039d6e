//! Response types for data-agent calls.
//!
//! This module provides [`ActionResponse`], which wraps the decoded result of an
//! action together with the shard state and the headers of the response that
//! produced it.

use std::ops::Deref;

use dbagent_core::ShardState;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ClientError;

/// Result of one action call.
///
/// The value is `None` when the response carried no `value` or a `null` one.
///
/// # Example
///
/// ```ignore
/// let response = subject.invoke("get", args).await?;
///
/// // Access the result via Deref
/// if let Some(row) = response.get_ref() {
///     println!("row: {}", row);
/// }
///
/// // Shard state decoded from this response only
/// let next = response.shard().shard_next.clone();
///
/// // Or decode into a typed value
/// let user: ActionResponse<Option<User>> = response.deserialize()?;
/// ```
#[derive(Debug, Clone)]
pub struct ActionResponse<T = Option<Value>> {
    /// The decoded (and converted) result.
    inner: T,
    /// Shard state carried by this response's headers.
    shard: ShardState,
    /// Response metadata (HTTP headers).
    metadata: Metadata,
}

impl<T> ActionResponse<T> {
    /// Create a new response.
    pub fn new(inner: T, shard: ShardState, metadata: Metadata) -> Self {
        Self {
            inner,
            shard,
            metadata,
        }
    }

    /// Extract the inner value, discarding shard state and metadata.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Get the shard state decoded from this response.
    pub fn shard(&self) -> &ShardState {
        &self.shard
    }

    /// Get a reference to the response metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        self.metadata.headers()
    }

    /// Transform the inner value, preserving shard state and metadata.
    pub fn map<U, F>(self, f: F) -> ActionResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        ActionResponse {
            inner: f(self.inner),
            shard: self.shard,
            metadata: self.metadata,
        }
    }

    /// Get a reference to the inner value.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Decompose into inner value, shard state and metadata.
    pub fn into_parts(self) -> (T, ShardState, Metadata) {
        (self.inner, self.shard, self.metadata)
    }
}

impl ActionResponse<Option<Value>> {
    /// Decode the result into a typed value.
    ///
    /// An absent result is presented to `U` as JSON `null`, so `Option<_>`
    /// targets decode it to `None`.
    pub fn deserialize<U: DeserializeOwned>(self) -> Result<ActionResponse<U>, ClientError> {
        let value = self.inner.unwrap_or(Value::Null);
        let inner = U::deserialize(&value).map_err(|e| ClientError::DecodeResponseBody {
            body: value.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ActionResponse {
            inner,
            shard: self.shard,
            metadata: self.metadata,
        })
    }
}

impl<T> Deref for ActionResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> AsRef<T> for ActionResponse<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

/// Response metadata wrapper around HTTP headers.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    headers: HeaderMap,
}

impl Metadata {
    /// Create new metadata from HTTP headers.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Get a header value by name.
    ///
    /// Returns `None` if the header is not present or cannot be converted to a string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Check if a header exists.
    pub fn contains(&self, key: &str) -> bool {
        self.headers.contains_key(key)
    }

    /// Get the underlying HeaderMap.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consume self and return the underlying HeaderMap.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }
}

impl From<HeaderMap> for Metadata {
    fn from(headers: HeaderMap) -> Self {
        Self::new(headers)
    }
}

impl From<Metadata> for HeaderMap {
    fn from(metadata: Metadata) -> Self {
        metadata.headers
    }
}
