//! Subject facade.
//!
//! A [`Subject`] binds a resource name to the client configuration and runs
//! the full pipeline of one call: build the request, drive the retry loop,
//! check the response contract, convert fields and decode shard headers.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use dbagent_core::{FieldConversions, ResponseContract, ShardState};
use http::HeaderValue;
use serde::Serialize;
#[cfg(feature = "tracing")]
use tracing::Instrument;

use crate::ClientError;
use crate::engine::RequestEngine;
use crate::request::{Args, RequestTemplate, to_args};
use crate::response::{ActionResponse, Metadata};

/// Configuration shared by every subject of one client.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) endpoints: Vec<SocketAddr>,
    pub(crate) engine: RequestEngine,
    pub(crate) api_version: String,
    pub(crate) shard_header_prefix: String,
    pub(crate) user_agent: HeaderValue,
}

/// A named remote resource.
///
/// Cloning is cheap. Clones, and the views returned by
/// [`with_retry_limit`](Self::with_retry_limit) and
/// [`with_writes_allowed`](Self::with_writes_allowed), share the session shard
/// state but carry their own retry limit and write-ignored flag.
///
/// # Session shard state
///
/// After every successful call the shard headers of the response are merged
/// into the session state, entry by entry, last write wins. Concurrent calls
/// through clones of one subject race on that state; use
/// [`ActionResponse::shard`] when the state of a specific call matters.
///
/// # Example
///
/// ```ignore
/// let user = client.subject("user");
///
/// let row = user.invoke("get", args).await?;
/// let rows = user.with_retry_limit(1).invoke_with("list", &Filter { age: 30 }).await?;
/// user.with_writes_allowed().action("update").call(args).await?;
/// ```
#[derive(Clone)]
pub struct Subject {
    name: Arc<str>,
    shared: Arc<Shared>,
    conversions: Arc<FieldConversions>,
    retry_n: usize,
    allow_write_ignored: bool,
    session: Arc<RwLock<ShardState>>,
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("name", &self.name)
            .field("retry_n", &self.retry_n)
            .field("allow_write_ignored", &self.allow_write_ignored)
            .field("conversions", &self.conversions)
            .finish_non_exhaustive()
    }
}

impl Subject {
    pub(crate) fn new(name: &str, shared: Arc<Shared>, conversions: FieldConversions) -> Self {
        let retry_n = shared.endpoints.len();
        Self {
            name: Arc::from(name),
            shared,
            conversions: Arc::new(conversions),
            retry_n,
            allow_write_ignored: false,
            session: Arc::default(),
        }
    }

    /// Get the subject name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the maximum number of attempts of a call.
    pub fn retry_limit(&self) -> usize {
        self.retry_n
    }

    pub fn allows_write_ignored(&self) -> bool {
        self.allow_write_ignored
    }

    /// Get the field conversions applied to results.
    pub fn conversions(&self) -> &FieldConversions {
        &self.conversions
    }

    /// Return a view that makes at most `n` attempts per call.
    ///
    /// `n` is clamped to the number of endpoints.
    pub fn with_retry_limit(&self, n: usize) -> Self {
        let mut view = self.clone();
        view.retry_n = n.min(self.shared.endpoints.len());
        view
    }

    /// Return a view that accepts single-row results with zero affected rows.
    pub fn with_writes_allowed(&self) -> Self {
        let mut view = self.clone();
        view.allow_write_ignored = true;
        view
    }

    /// Set whether zero affected rows is an accepted result for this instance.
    pub fn set_allow_write_ignored(&mut self, allow: bool) {
        self.allow_write_ignored = allow;
    }

    /// Get a snapshot of the session shard state.
    pub fn shard_state(&self) -> ShardState {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get a handle that calls `action` on this subject.
    pub fn action(&self, action: &str) -> Action<'_> {
        Action {
            subject: self,
            name: action.to_string(),
        }
    }

    /// Invoke `action` with `args`.
    ///
    /// # Errors
    ///
    /// Transport failures and non-200 statuses are retried on the next
    /// endpoint; the error of the last attempt is returned once the retry
    /// limit is reached. Body-level errors are returned immediately.
    pub async fn invoke(&self, action: &str, args: Args) -> Result<ActionResponse, ClientError> {
        let call = self.call(action, args);

        #[cfg(feature = "tracing")]
        let call = call.instrument(tracing::info_span!(
            "dbagent.invoke",
            subject = %self.name,
            action = %action,
        ));

        call.await
    }

    /// Invoke `action` with any value that serializes to a JSON object.
    pub async fn invoke_with<T>(&self, action: &str, args: &T) -> Result<ActionResponse, ClientError>
    where
        T: Serialize + ?Sized,
    {
        let args = to_args(args)?;
        self.invoke(action, args).await
    }

    async fn call(&self, action: &str, args: Args) -> Result<ActionResponse, ClientError> {
        let shared = &self.shared;
        let template = RequestTemplate::new(
            &shared.api_version,
            &self.name,
            action,
            &args,
            &shared.user_agent,
        )?;

        let response = shared
            .engine
            .send(&shared.endpoints, self.retry_n, &template)
            .await?;

        let mut value = ResponseContract::new()
            .allow_write_ignored(self.allow_write_ignored)
            .parse(&response.body)?;
        self.conversions.apply(&mut value)?;

        let shard = ShardState::from_headers(&response.headers, &shared.shard_header_prefix);
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(shard.clone());

        Ok(ActionResponse::new(
            value,
            shard,
            Metadata::new(response.headers),
        ))
    }
}

/// A single action of a [`Subject`].
#[derive(Debug, Clone)]
pub struct Action<'a> {
    subject: &'a Subject,
    name: String,
}

impl Action<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the action with an argument map.
    pub async fn call(&self, args: Args) -> Result<ActionResponse, ClientError> {
        self.subject.invoke(&self.name, args).await
    }

    /// Call the action with a serializable argument value.
    pub async fn call_with<T>(&self, args: &T) -> Result<ActionResponse, ClientError>
    where
        T: Serialize + ?Sized,
    {
        self.subject.invoke_with(&self.name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::config::RetryPolicy;
    use crate::engine::tests::{ScriptedTransport, endpoints};
    use dbagent_core::Conversion;
    use http::{HeaderMap, StatusCode};
    use serde_json::{Value, json};
    use std::time::Duration;

    fn subject_with(
        transport: Arc<ScriptedTransport>,
        n: u8,
        conversions: FieldConversions,
    ) -> Subject {
        let engine = RequestEngine::new(
            transport,
            None,
            RetryPolicy::new().retry_sleep(Duration::ZERO),
        );
        let shared = Shared {
            endpoints: endpoints(n),
            engine,
            api_version: "v1".to_string(),
            shard_header_prefix: "x-acid-".to_string(),
            user_agent: HeaderValue::from_static("unknown"),
        };
        Subject::new("test_subject", Arc::new(shared), conversions)
    }

    fn subject(transport: Arc<ScriptedTransport>) -> Subject {
        subject_with(transport, 3, FieldConversions::new())
    }

    fn shard_headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[tokio::test]
    async fn test_invoke_sends_request() {
        let transport = Arc::new(ScriptedTransport::new().ok(r#"{"value":{"id":1}}"#));
        let mut args = Args::new();
        args.insert("foo".to_string(), json!("bar"));

        let res = subject(transport.clone())
            .invoke("action_foo", args)
            .await
            .unwrap();
        assert_eq!(*res, Some(json!({"id": 1})));

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].uri, "/api/v1/test_subject/action_foo");
        assert_eq!(&recorded[0].body[..], br#"{"foo":"bar"}"#);
    }

    #[tokio::test]
    async fn test_empty_results() {
        for body in [r#"{"value":null}"#, "{}"] {
            let transport = Arc::new(ScriptedTransport::new().ok(body));
            let res = subject(transport).invoke("get", Args::new()).await.unwrap();
            assert!(res.is_none(), "{body}");
        }

        let transport = Arc::new(ScriptedTransport::new().ok(r#"{"value":[]}"#));
        let res = subject(transport).invoke("list", Args::new()).await.unwrap();
        assert_eq!(*res, Some(json!([])));
    }

    #[tokio::test]
    async fn test_body_errors_are_not_retried() {
        let cases = [
            ("", ErrorKind::DecodeResponseBody),
            ("[]", ErrorKind::InvalidResponse),
            (
                r#"{"error_code":"x","error_message":"y"}"#,
                ErrorKind::Operation,
            ),
            (r#"{"value":{"affected_rows":0}}"#, ErrorKind::WriteIgnored),
        ];

        for (body, kind) in cases {
            let transport = Arc::new(ScriptedTransport::new().ok(body).ok(r#"{"value":1}"#));
            let err = subject(transport.clone())
                .invoke("get", Args::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), kind, "{body:?}");
            assert_eq!(transport.recorded().len(), 1, "{body:?}");
        }
    }

    #[tokio::test]
    async fn test_operation_error_carries_details() {
        let body = r#"{"error_code":"x","error_message":"y"}"#;
        let transport = Arc::new(ScriptedTransport::new().ok(body));
        let err = subject(transport)
            .invoke("get", Args::new())
            .await
            .unwrap_err();

        match err {
            ClientError::Operation {
                body: got,
                error_code,
                error_message,
            } => {
                assert_eq!(got, body);
                assert_eq!(error_code.as_deref(), Some("x"));
                assert_eq!(error_message.as_deref(), Some("y"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_writes_allowed_view() {
        let body = r#"{"value":{"affected_rows":0}}"#;
        let transport = Arc::new(ScriptedTransport::new().ok(body).ok(body));
        let subject = subject(transport);

        let view = subject.with_writes_allowed();
        let res = view.invoke("update", Args::new()).await.unwrap();
        assert_eq!(*res, Some(json!({"affected_rows": 0})));

        // The originating subject is unaffected.
        assert!(!subject.allows_write_ignored());
        let err = subject.invoke("update", Args::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteIgnored);
    }

    #[tokio::test]
    async fn test_set_allow_write_ignored() {
        let body = r#"{"value":{"affected_rows":0}}"#;
        let transport = Arc::new(ScriptedTransport::new().ok(body));
        let mut subject = subject(transport);

        subject.set_allow_write_ignored(true);
        assert!(subject.allows_write_ignored());
        subject.invoke("update", Args::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_limit_is_clamped() {
        let transport = Arc::new(ScriptedTransport::new());
        let subject = subject(transport.clone());
        assert_eq!(subject.retry_limit(), 3);
        assert_eq!(subject.with_retry_limit(10).retry_limit(), 3);

        let view = subject.with_retry_limit(2).with_writes_allowed();
        assert_eq!(view.retry_limit(), 2);
        assert!(view.allows_write_ignored());
        assert_eq!(subject.retry_limit(), 3);

        let err = view.invoke("get", Args::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Request);
        assert_eq!(transport.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_limit_zero_makes_no_attempt() {
        let transport = Arc::new(ScriptedTransport::new().ok("{}"));
        let err = subject(transport.clone())
            .with_retry_limit(0)
            .invoke("get", Args::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAttempts);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_conversions_apply() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .ok(r#"{"value":{"foo":"1234","bar":"1234"}}"#)
                .ok(r#"{"value":[{"foo":"1"},{"bar":"2"}]}"#)
                .ok(r#"{"value":{"foo":"abc"}}"#),
        );
        let conversions = FieldConversions::new().field("foo", Conversion::ToInt);
        let subject = subject_with(transport, 3, conversions);

        let res = subject.invoke("get", Args::new()).await.unwrap();
        assert_eq!(*res, Some(json!({"foo": 1234, "bar": "1234"})));

        let res = subject.invoke("list", Args::new()).await.unwrap();
        assert_eq!(*res, Some(json!([{"foo": 1}, {"bar": "2"}])));

        let err = subject.invoke("get", Args::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    #[tokio::test]
    async fn test_shard_state_session() {
        let good = shard_headers(&[
            ("x-acid-shard-current", r#"["a"]"#),
            ("x-acid-shard-next", r#"["b"]"#),
            ("x-acid-shard-fields", r#"["id"]"#),
        ]);
        let bad = shard_headers(&[
            ("x-acid-shard-current", "not json"),
            ("x-acid-shard-next", r#"["c"]"#),
        ]);
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(StatusCode::OK, good, "{}")
                .respond(StatusCode::OK, bad, "{}"),
        );
        let subject = subject(transport);

        let first = subject.invoke("get", Args::new()).await.unwrap();
        assert_eq!(first.shard().shard_current, Some(json!(["a"])));
        assert_eq!(subject.shard_state(), first.shard().clone());

        let second = subject.invoke("get", Args::new()).await.unwrap();
        // Only what this response carried.
        assert_eq!(second.shard().shard_current, None);
        assert_eq!(second.shard().shard_next, Some(json!(["c"])));

        let session = subject.shard_state();
        assert_eq!(session.shard_current, Some(json!(["a"])));
        assert_eq!(session.shard_next, Some(json!(["c"])));
        assert_eq!(session.shard_fields, Some(json!(["id"])));
    }

    #[tokio::test]
    async fn test_views_share_session() {
        let headers = shard_headers(&[("x-acid-shard-next", "42")]);
        let transport = Arc::new(ScriptedTransport::new().respond(StatusCode::OK, headers, "{}"));
        let subject = subject(transport);

        subject
            .with_retry_limit(1)
            .invoke("get", Args::new())
            .await
            .unwrap();
        assert_eq!(subject.shard_state().shard_next, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_failed_call_keeps_session() {
        let headers = shard_headers(&[("x-acid-shard-next", "1")]);
        let transport = Arc::new(
            ScriptedTransport::new().respond(StatusCode::OK, headers, r#"{"error_code":"e"}"#),
        );
        let subject = subject(transport);

        subject.invoke("get", Args::new()).await.unwrap_err();
        assert!(subject.shard_state().is_empty());
    }

    #[tokio::test]
    async fn test_action_handle_and_typed_args() {
        #[derive(Serialize)]
        struct Get {
            id: u64,
        }

        let transport = Arc::new(ScriptedTransport::new().ok("{}").ok("{}"));
        let subject = subject(transport.clone());

        let get = subject.action("get");
        assert_eq!(get.name(), "get");
        get.call_with(&Get { id: 9 }).await.unwrap();
        get.call(Args::new()).await.unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded[0].uri, "/api/v1/test_subject/get");
        let body: Value = serde_json::from_slice(&recorded[0].body).unwrap();
        assert_eq!(body, json!({"id": 9}));
        assert_eq!(&recorded[1].body[..], b"{}");
    }

    #[tokio::test]
    async fn test_invoke_with_rejects_non_object() {
        let transport = Arc::new(ScriptedTransport::new().ok("{}"));
        let err = subject(transport.clone())
            .invoke_with("get", &[1, 2, 3])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert!(transport.recorded().is_empty());
    }
}
