//! Request construction.
//!
//! A call builds one immutable [`RequestTemplate`]. Each attempt wraps it in an
//! [`AttemptRequest`] that carries the only things allowed to vary between
//! attempts: the `Host` header and the signer's output.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HOST, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ClientError;
use crate::config::{Credentials, Sign, SignRequest};

/// The argument map of an action.
pub type Args = Map<String, Value>;

/// Build the request path of an action.
pub fn action_uri(api_version: &str, subject: &str, action: &str) -> String {
    format!("/api/{}/{}/{}", api_version, subject, action)
}

/// Serialize a typed argument value into an argument map.
///
/// Fails with [`ClientError::Encode`] if `args` does not serialize to a JSON object.
pub fn to_args<T: Serialize + ?Sized>(args: &T) -> Result<Args, ClientError> {
    match serde_json::to_value(args) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ClientError::Encode(format!(
            "arguments must serialize to a JSON object, got {}",
            other
        ))),
        Err(e) => Err(ClientError::Encode(format!("JSON encoding failed: {}", e))),
    }
}

/// The part of a request shared by every attempt.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestTemplate {
    /// Build the request for `action` on `subject`.
    ///
    /// The body is the compact JSON encoding of `args`; `Content-Length` is its
    /// exact byte length and `Host` is left empty until an endpoint is chosen.
    pub fn new(
        api_version: &str,
        subject: &str,
        action: &str,
        args: &Args,
        user_agent: &HeaderValue,
    ) -> Result<Self, ClientError> {
        let body = serde_json::to_vec(args)
            .map(Bytes::from)
            .map_err(|e| ClientError::Encode(format!("JSON encoding failed: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static(""));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(USER_AGENT, user_agent.clone());

        Ok(Self {
            method: Method::POST,
            uri: action_uri(api_version, subject, action),
            headers,
            body,
        })
    }

    /// Get the request method (always `POST`).
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request path.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the template headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the encoded body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Short description used in errors and logs.
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.uri)
    }

    /// Start an attempt against the endpoint whose address is `host`.
    pub fn attempt(&self, host: &str) -> Result<AttemptRequest<'_>, ClientError> {
        let host = HeaderValue::from_str(host)
            .map_err(|e| ClientError::Encode(format!("invalid host {:?}: {}", host, e)))?;
        let mut overrides = HeaderMap::new();
        overrides.insert(HOST, host);
        Ok(AttemptRequest {
            template: self,
            overrides,
        })
    }
}

/// One attempt: the shared template plus per-attempt header overrides.
#[derive(Debug, Clone)]
pub struct AttemptRequest<'a> {
    template: &'a RequestTemplate,
    overrides: HeaderMap,
}

impl<'a> AttemptRequest<'a> {
    /// Get the template this attempt was created from.
    pub fn template(&self) -> &'a RequestTemplate {
        self.template
    }

    /// Get the per-attempt overrides.
    pub fn overrides(&self) -> &HeaderMap {
        &self.overrides
    }

    /// Get the merged headers; overrides replace template values.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = self.template.headers.clone();
        for (name, value) in self.overrides.iter() {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    /// Sign this attempt, adding the signer's headers to the overrides.
    pub fn sign(&mut self, signer: &dyn Sign, credentials: &Credentials) -> Result<(), ClientError> {
        let headers = self.headers();
        let request = SignRequest {
            method: &self.template.method,
            uri: &self.template.uri,
            headers: &headers,
            body: &self.template.body,
            sign_payload: true,
        };
        let signed = signer.sign(&request, credentials)?;
        for (name, value) in signed.iter() {
            self.overrides.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    /// Materialize the attempt into an HTTP request with a path-only URI.
    pub fn to_http(&self) -> Result<http::Request<Bytes>, ClientError> {
        let mut request = http::Request::builder()
            .method(self.template.method.clone())
            .uri(self.template.uri.as_str())
            .body(self.template.body.clone())
            .map_err(|e| ClientError::Encode(format!("failed to build request: {}", e)))?;
        *request.headers_mut() = self.headers();
        Ok(request)
    }
}
