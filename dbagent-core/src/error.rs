//! Data-agent response error types.
//!
//! This module provides the error types produced while interpreting a
//! response body:
//! - [`ResponseError`]: Violations of the response contract
//! - [`ConvertError`]: A field value that a [`Conversion`](crate::Conversion) rejected
//! - [`ParseConversionError`]: An unknown conversion name

use serde_json::Value;

/// Errors produced while interpreting a response body.
///
/// Every variant keeps the raw body (lossily decoded as UTF-8) so the error can
/// be logged or re-raised without losing diagnostic information.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ResponseError {
    /// The body is not valid JSON.
    #[error("failed to decode response body {body:?}: {reason}")]
    DecodeBody { body: String, reason: String },

    /// The body is valid JSON but its top level is not an object.
    #[error("response {body} is not a mapping")]
    NotAMapping { body: String },

    /// The remote side reported an application-level failure.
    #[error("operation failed: {body}")]
    Operation {
        body: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },

    /// A write reported zero affected rows and ignoring was not enabled.
    #[error("write ignored: {body}")]
    WriteIgnored { body: String },

    /// A field conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConvertError),
}

impl ResponseError {
    /// Get the raw body this error was produced from, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ResponseError::DecodeBody { body, .. }
            | ResponseError::NotAMapping { body }
            | ResponseError::Operation { body, .. }
            | ResponseError::WriteIgnored { body } => Some(body),
            ResponseError::Conversion(_) => None,
        }
    }
}

/// A field value could not be converted.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("cannot convert field {field:?} with {conversion}: {value} ({reason})")]
pub struct ConvertError {
    pub field: String,
    pub conversion: &'static str,
    pub value: Value,
    pub reason: String,
}

/// Error returned when parsing a [`Conversion`](crate::Conversion) from a string fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown conversion {0:?}")]
pub struct ParseConversionError(pub String);
