//! Configuration modules for the data-agent client.
//!
//! This module contains call-level configuration:
//! - [`RetryPolicy`]: Timeout escalation and delay after failed attempts
//! - [`Sign`]: Request signing with a [`Credentials`] pair

mod retry;
mod signer;

pub use retry::{RetryPolicy, TimeoutEscalation, defaults};
pub use signer::{Credentials, Sign, SignFn, SignRequest};
