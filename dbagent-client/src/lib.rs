//! Client for the data-agent HTTP service.
//!
//! The data agent is replicated on several IP addresses sharing one port.
//! Callers invoke named *actions* on named *subjects* with a JSON argument
//! map; this crate builds the request, optionally signs it, sends it to the
//! replicas in order with escalating timeouts, checks the response contract,
//! converts configured fields and decodes the shard headers.
//!
//! ## Features
//!
//! - Sequential failover over an ordered replica list
//! - Per-attempt timeout escalation and inter-attempt delay
//! - Pluggable request signing
//! - Per-subject field conversions (e.g. `to_int`)
//! - Shard state returned per call and kept per subject
//!
//! ## Example
//!
//! ```ignore
//! use dbagent_client::{Args, Client};
//!
//! let client = Client::builder(["10.0.0.1".parse()?, "10.0.0.2".parse()?], 3306)
//!     .convert("user", "age", "to_int")
//!     .build()?;
//!
//! let mut args = Args::new();
//! args.insert("id".into(), 42.into());
//!
//! let response = client.subject("user").invoke("get", args).await?;
//! println!("row: {:?}", response.into_inner());
//! ```
//!
//! ## Writes
//!
//! A single-row result with `affected_rows == 0` is reported as
//! [`ClientError::WriteIgnored`] unless the subject allows it:
//!
//! ```ignore
//! let user = client.subject("user");
//! user.with_writes_allowed().invoke("update", args).await?;
//! ```
//!
//! ## Retries
//!
//! Each call tries at most [`Subject::retry_limit`] replicas, always starting
//! from the first one. Transport failures and non-200 statuses move on to the
//! next replica; body-level errors are returned immediately.
//!
//! ```ignore
//! // Only ever talk to the first replica.
//! let primary = client.subject("user").with_retry_limit(1);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `tracing` | Spans and events for calls and attempts | yes |

mod builder;
mod client;
pub mod config;
mod engine;
mod error;
pub mod request;
pub mod response;
mod subject;
pub mod transport;

pub use builder::{ClientBuildError, ClientBuilder};
pub use client::Client;
pub use error::{ClientError, ErrorKind, TransportError};
pub use subject::{Action, Subject};

// Re-export from config module
pub use config::{Credentials, RetryPolicy, Sign, SignFn, SignRequest, TimeoutEscalation};

// Re-export from request module
pub use request::{Args, RequestTemplate, to_args};

// Re-export from response module
pub use response::{ActionResponse, Metadata};

// Re-export transport types at the top level for convenience
pub use transport::{HyperTransport, HyperTransportBuilder, RawResponse, Transport};

// Re-export core types that users need
pub use dbagent_core::{
    Conversion, ConvertError, DEFAULT_SHARD_HEADER_PREFIX, FieldConversions, ShardEntry,
    ShardState,
};
