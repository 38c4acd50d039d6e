//! Client-side error types.
//!
//! This module provides [`ClientError`], the error type for data-agent calls,
//! and [`TransportError`], the failure reported by a [`Transport`](crate::Transport).

use std::net::SocketAddr;
use std::time::Duration;

use dbagent_core::{ConvertError, ResponseError};

/// Transport-level failure of a single attempt.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, reset, or the request could not be sent.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The attempt did not complete within its timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Reading the response body failed.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The HTTP request could not be constructed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The broad class of a [`ClientError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Request,
    InvalidResponse,
    DecodeResponseBody,
    Operation,
    WriteIgnored,
    Conversion,
    Encode,
    NoAttempts,
}

impl ErrorKind {
    /// Get the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Request => "request",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::DecodeResponseBody => "decode_response_body",
            ErrorKind::Operation => "operation",
            ErrorKind::WriteIgnored => "write_ignored",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Encode => "encode",
            ErrorKind::NoAttempts => "no_attempts",
        }
    }
}

/// Data-agent client error variants.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// An attempt failed at the transport level.
    #[error("request to {endpoint} failed: {source} ({request})")]
    Request {
        endpoint: SocketAddr,
        /// Summary of the request that was sent (`POST /api/...`).
        request: String,
        source: TransportError,
    },

    /// Non-200 status, or a decoded body that is not a JSON object.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        reason: String,
        status: Option<u16>,
        body: String,
    },

    /// The response body is not valid JSON.
    #[error("failed to decode response body {body:?}: {reason}")]
    DecodeResponseBody { body: String, reason: String },

    /// The response body carries an `error_code`.
    #[error("operation failed: {body}")]
    Operation {
        body: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },

    /// A single-row write reported zero affected rows.
    #[error("write ignored: {body}")]
    WriteIgnored { body: String },

    /// A configured field conversion rejected a value.
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// The request could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// No attempt could be made (empty endpoint list or retry limit of zero).
    #[error("no attempt made for {uri}: no endpoint available")]
    NoAttempts { uri: String },
}

impl ClientError {
    /// Create an error for a non-200 response.
    pub fn invalid_status(status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        ClientError::InvalidResponse {
            reason: format!("status: {} is not 200, {}", status, body),
            status: Some(status),
            body,
        }
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Request { .. } => ErrorKind::Request,
            ClientError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            ClientError::DecodeResponseBody { .. } => ErrorKind::DecodeResponseBody,
            ClientError::Operation { .. } => ErrorKind::Operation,
            ClientError::WriteIgnored { .. } => ErrorKind::WriteIgnored,
            ClientError::Conversion(_) => ErrorKind::Conversion,
            ClientError::Encode(_) => ErrorKind::Encode,
            ClientError::NoAttempts { .. } => ErrorKind::NoAttempts,
        }
    }

    /// Get the raw response body this error carries, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ClientError::InvalidResponse { body, .. }
            | ClientError::DecodeResponseBody { body, .. }
            | ClientError::Operation { body, .. }
            | ClientError::WriteIgnored { body } => Some(body),
            _ => None,
        }
    }

    /// Get the HTTP status of a non-200 response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::InvalidResponse { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns whether another replica could succeed where this attempt failed.
    ///
    /// Only transport failures and non-200 statuses are retried. An
    /// [`ClientError::InvalidResponse`] without a status comes from a 200
    /// body that is not a JSON object and is not retryable, like every other
    /// body-level error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Request { .. }
                | ClientError::InvalidResponse {
                    status: Some(_),
                    ..
                }
        )
    }
}

impl From<ResponseError> for ClientError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::DecodeBody { body, reason } => {
                ClientError::DecodeResponseBody { body, reason }
            }
            ResponseError::NotAMapping { body } => ClientError::InvalidResponse {
                reason: format!("response: {} is not a mapping", body),
                status: None,
                body,
            },
            ResponseError::Operation {
                body,
                error_code,
                error_message,
            } => ClientError::Operation {
                body,
                error_code,
                error_message,
            },
            ResponseError::WriteIgnored { body } => ClientError::WriteIgnored { body },
            ResponseError::Conversion(err) => ClientError::Conversion(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> SocketAddr {
        "127.0.0.1:3306".parse().unwrap()
    }

    #[test]
    fn test_invalid_status() {
        let err = ClientError::invalid_status(503, b"busy");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.body(), Some("busy"));
        assert_eq!(err.to_string(), "invalid response: status: 503 is not 200, busy");
    }

    #[test]
    fn test_request_error_display() {
        let err = ClientError::Request {
            endpoint: endpoint(),
            request: "POST /api/v1/user/get".to_string(),
            source: TransportError::Timeout(Duration::from_millis(1500)),
        };
        assert_eq!(err.kind(), ErrorKind::Request);
        assert_eq!(
            err.to_string(),
            "request to 127.0.0.1:3306 failed: timed out after 1.5s (POST /api/v1/user/get)"
        );
    }

    #[test]
    fn test_from_response_error() {
        let err: ClientError = ResponseError::DecodeBody {
            body: String::new(),
            reason: "EOF".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DecodeResponseBody);

        let err: ClientError = ResponseError::NotAMapping {
            body: "[]".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), Some("[]"));

        let err: ClientError = ResponseError::Operation {
            body: "{}".to_string(),
            error_code: Some("x".to_string()),
            error_message: None,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Operation);

        let err: ClientError = ResponseError::WriteIgnored {
            body: "{}".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::WriteIgnored);

        let err: ClientError = ResponseError::Conversion(ConvertError {
            field: "foo".to_string(),
            conversion: "to_int",
            value: json!("x"),
            reason: "invalid digit found in string".to_string(),
        })
        .into();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    #[test]
    fn test_is_retryable() {
        assert!(ClientError::invalid_status(500, b"").is_retryable());
        assert!(
            ClientError::Request {
                endpoint: endpoint(),
                request: String::new(),
                source: TransportError::Connect("refused".to_string()),
            }
            .is_retryable()
        );

        // A body that is not an object is decided after a 200 status.
        let not_a_mapping: ClientError = ResponseError::NotAMapping {
            body: "[]".to_string(),
        }
        .into();
        assert!(!not_a_mapping.is_retryable());

        assert!(!ClientError::WriteIgnored { body: String::new() }.is_retryable());
        assert!(!ClientError::Encode("bad".to_string()).is_retryable());
        assert!(
            !ClientError::NoAttempts {
                uri: "/api/v1/a/b".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ErrorKind::WriteIgnored.as_str(), "write_ignored");
        assert_eq!(ErrorKind::NoAttempts.as_str(), "no_attempts");
    }
}
