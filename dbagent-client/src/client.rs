//! Data-agent client implementation.
//!
//! This module provides the main [`Client`] type, a factory of [`Subject`]
//! facades sharing one endpoint list and configuration.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use dbagent_core::FieldConversions;
use serde::Serialize;

use crate::ClientError;
use crate::builder::ClientBuilder;
use crate::request::Args;
use crate::response::ActionResponse;
use crate::subject::{Shared, Subject};

/// Data-agent client.
///
/// Use [`ClientBuilder`] or [`Client::builder`] to create an instance. Cloning
/// is cheap and clones share the subject cache.
///
/// # Example
///
/// ```ignore
/// use dbagent_client::Client;
///
/// let client = Client::builder(["10.0.0.1".parse()?, "10.0.0.2".parse()?], 3306)
///     .convert("user", "age", "to_int")
///     .build()?;
///
/// let user = client.subject("user");
/// let response = user.invoke("get", args).await?;
/// println!("row: {:?}", response.into_inner());
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    shared: Arc<Shared>,
    port: u16,
    /// Field conversions registered per subject name.
    conversions: BTreeMap<String, FieldConversions>,
    /// Subjects created so far, by name.
    subjects: Mutex<HashMap<String, Subject>>,
}

impl Client {
    /// Create a new ClientBuilder.
    ///
    /// This is a convenience method equivalent to `ClientBuilder::new(ips, port)`.
    pub fn builder<I>(ips: I, port: u16) -> ClientBuilder
    where
        I: IntoIterator<Item = std::net::IpAddr>,
    {
        ClientBuilder::new(ips, port)
    }

    /// Create a new Client.
    ///
    /// This is called by [`ClientBuilder::build`]. Prefer using the builder API.
    pub(crate) fn new(
        shared: Arc<Shared>,
        port: u16,
        conversions: BTreeMap<String, FieldConversions>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                shared,
                port,
                conversions,
                subjects: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get the replica endpoints in retry order.
    pub fn endpoints(&self) -> &[SocketAddr] {
        &self.inner.shared.endpoints
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Get the subject called `name`.
    ///
    /// The first request for a name creates the subject with the conversions
    /// registered for it; later requests return a handle to the same subject,
    /// sharing its session shard state.
    pub fn subject(&self, name: &str) -> Subject {
        let mut subjects = self
            .inner
            .subjects
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        subjects
            .entry(name.to_string())
            .or_insert_with(|| {
                #[cfg(feature = "tracing")]
                tracing::debug!(subject = %name, "building subject");

                let conversions = self
                    .inner
                    .conversions
                    .get(name)
                    .cloned()
                    .unwrap_or_default();
                Subject::new(name, self.inner.shared.clone(), conversions)
            })
            .clone()
    }

    /// Get the names of the subjects created so far, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let subjects = self
            .inner
            .subjects
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = subjects.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke `action` on `subject`.
    ///
    /// Shorthand for `client.subject(subject).invoke(action, args)`.
    pub async fn invoke(
        &self,
        subject: &str,
        action: &str,
        args: Args,
    ) -> Result<ActionResponse, ClientError> {
        self.subject(subject).invoke(action, args).await
    }

    /// Invoke `action` on `subject` with a serializable argument value.
    pub async fn invoke_with<T>(
        &self,
        subject: &str,
        action: &str,
        args: &T,
    ) -> Result<ActionResponse, ClientError>
    where
        T: Serialize + ?Sized,
    {
        self.subject(subject).invoke_with(action, args).await
    }
}
