//! Response body contract.
//!
//! A data-agent response body is a JSON object:
//!
//! ```text
//! {"error_code": ..., "error_message": ...}   operation failed
//! {"value": <row | [row, ...] | null>}         success
//! ```
//!
//! Any other top-level JSON type is an invalid response. A single-row result
//! reporting `"affected_rows": 0` is a write the server ignored; it is an error
//! unless the caller opted in with [`ResponseContract::allow_write_ignored`].

use serde_json::{Map, Value};

use crate::error::ResponseError;

/// Key whose presence marks an operation-level failure.
pub const ERROR_CODE_KEY: &str = "error_code";

/// Human readable companion of [`ERROR_CODE_KEY`].
pub const ERROR_MESSAGE_KEY: &str = "error_message";

/// Key holding the result payload.
pub const VALUE_KEY: &str = "value";

/// Key holding the row count of a write.
pub const AFFECTED_ROWS_KEY: &str = "affected_rows";

/// Interprets decoded response bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResponseContract {
    allow_write_ignored: bool,
}

impl ResponseContract {
    /// Create a contract that rejects ignored writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether a single row with `affected_rows == 0` is returned as-is.
    pub fn allow_write_ignored(mut self, allow: bool) -> Self {
        self.allow_write_ignored = allow;
        self
    }

    /// Returns whether ignored writes are returned instead of rejected.
    pub fn allows_write_ignored(&self) -> bool {
        self.allow_write_ignored
    }

    /// Parse a raw response body.
    ///
    /// Returns `Ok(None)` when the body carries no result (`value` absent or
    /// `null`). Lists and objects are passed through unchanged.
    pub fn parse(&self, body: &[u8]) -> Result<Option<Value>, ResponseError> {
        let parsed: Value =
            serde_json::from_slice(body).map_err(|e| ResponseError::DecodeBody {
                body: lossy(body),
                reason: e.to_string(),
            })?;

        let Value::Object(mut envelope) = parsed else {
            return Err(ResponseError::NotAMapping { body: lossy(body) });
        };

        if envelope.contains_key(ERROR_CODE_KEY) {
            return Err(operation_error(&envelope, body));
        }

        let value = match envelope.remove(VALUE_KEY) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };

        if let Value::Object(row) = &value {
            if !self.allow_write_ignored && is_ignored_write(row) {
                return Err(ResponseError::WriteIgnored { body: lossy(body) });
            }
        }

        Ok(Some(value))
    }
}

/// Parse a response body with the default contract.
pub fn parse_response_body(body: &[u8]) -> Result<Option<Value>, ResponseError> {
    ResponseContract::new().parse(body)
}

fn is_ignored_write(row: &Map<String, Value>) -> bool {
    match row.get(AFFECTED_ROWS_KEY) {
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn operation_error(envelope: &Map<String, Value>, body: &[u8]) -> ResponseError {
    ResponseError::Operation {
        body: lossy(body),
        error_code: envelope.get(ERROR_CODE_KEY).and_then(scalar_to_string),
        error_message: envelope.get(ERROR_MESSAGE_KEY).and_then(scalar_to_string),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn lossy(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}
