//! Core protocol types for the data-agent client.
//!
//! This crate holds the pure, I/O-free parts of the protocol so they can be
//! tested and reused independently of any transport.
//!
//! ## Modules
//!
//! - [`contract`]: Response body contract (errors, empty results, ignored writes)
//! - [`convert`]: Named field conversions applied to result rows
//! - [`shard`]: Shard metadata decoded from response headers
//! - Error types for body-level failures and conversions

pub mod contract;
pub mod convert;
mod error;
pub mod shard;

pub use contract::{ResponseContract, parse_response_body};
pub use convert::{Conversion, FieldConversions};
pub use error::*;
pub use shard::{DEFAULT_SHARD_HEADER_PREFIX, ShardEntry, ShardState};
