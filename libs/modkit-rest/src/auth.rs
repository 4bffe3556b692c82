//! Credential plumbing: request interceptors and re-authentication strategies.
//!
//! An interceptor runs before every attempt and may add headers or raise an
//! auth-failure signal. When an attempt fails authorization (401/403 or that
//! signal) the execution loop calls the endpoint's [`AuthStrategy`]
//! synchronously; a successful re-authentication consumes one retry.

use crate::converter::{Converter, JSON_CONTENT_TYPE};
use crate::error::BoxError;
use crate::network::NetworkHelper;
use crate::request::{FORM_CONTENT_TYPE, RunnableRequest, encode_params};
use crate::transport::{Transport, TransportRequest};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

/// Failure raised by a [`RequestInterceptor`].
#[derive(Error, Debug)]
pub enum InterceptError {
    /// Credentials are missing or unusable; routed to the auth strategy.
    #[error("authorization required: {0}")]
    AuthFailure(String),

    /// Any other failure; terminal.
    #[error(transparent)]
    Other(BoxError),
}

/// Mutates a request right before dispatch.
pub trait RequestInterceptor: Send + Sync {
    /// # Errors
    /// [`InterceptError::AuthFailure`] triggers re-authentication; any other
    /// error ends the call.
    fn intercept(&self, request: &mut RunnableRequest) -> Result<(), InterceptError>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut RunnableRequest) -> Result<(), InterceptError> + Send + Sync,
{
    fn intercept(&self, request: &mut RunnableRequest) -> Result<(), InterceptError> {
        self(request)
    }
}

/// Blocking re-authentication.
///
/// Runs on the calling thread inside the execution loop. Implementations
/// report every internal failure as `false`.
pub trait AuthStrategy: Send + Sync {
    fn reauthenticate(
        &self,
        transport: &dyn Transport,
        converter: &dyn Converter,
        helper: &NetworkHelper,
    ) -> bool;
}

impl<F> AuthStrategy for F
where
    F: Fn(&dyn Transport, &dyn Converter, &NetworkHelper) -> bool + Send + Sync,
{
    fn reauthenticate(
        &self,
        transport: &dyn Transport,
        converter: &dyn Converter,
        helper: &NetworkHelper,
    ) -> bool {
        self(transport, converter, helper)
    }
}

/// Shared slot holding the current access token.
///
/// Cloning shares the slot, so a strategy and an interceptor built from
/// clones of one store see the same token.
#[derive(Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(SecretString::from(token.into()));
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.token.read().is_some()
    }

    /// Run `f` with the exposed token, if one is stored.
    pub fn with_token<R>(&self, f: impl FnOnce(&str) -> R) -> Option<R> {
        self.token.read().as_ref().map(|t| f(t.expose_secret()))
    }

    fn replace(&self, token: SecretString) {
        *self.token.write() = Some(token);
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("present", &self.is_present())
            .finish()
    }
}

/// Injects `Authorization: Bearer <token>` from a [`TokenStore`].
///
/// Raises an auth-failure signal when the store is empty so the endpoint's
/// strategy can obtain a first token.
#[derive(Debug, Clone)]
pub struct BearerTokenInterceptor {
    store: TokenStore,
}

impl BearerTokenInterceptor {
    #[must_use]
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }
}

impl RequestInterceptor for BearerTokenInterceptor {
    fn intercept(&self, request: &mut RunnableRequest) -> Result<(), InterceptError> {
        let value = self
            .store
            .with_token(|token| {
                let raw = Zeroizing::new(format!("Bearer {token}"));
                HeaderValue::from_str(&raw)
            })
            .ok_or_else(|| InterceptError::AuthFailure("no access token available".to_owned()))?;

        let mut value = value.map_err(|e| InterceptError::Other(Box::new(e)))?;
        value.set_sensitive(true);
        request.set_header(AUTHORIZATION, value);
        Ok(())
    }
}

/// Default timeout for token requests
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-credentials exchange against a token endpoint.
///
/// POSTs `grant_type=client_credentials` with the client id and secret as
/// form fields, decodes `access_token` from the response with the endpoint's
/// converter and stores it.
pub struct TokenEndpointStrategy {
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: Option<String>,
    store: TokenStore,
    timeout: Duration,
}

impl TokenEndpointStrategy {
    #[must_use]
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        store: TokenStore,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            scope: None,
            store,
            timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn exchange(
        &self,
        transport: &dyn Transport,
        converter: &dyn Converter,
        helper: &NetworkHelper,
    ) -> Result<SecretString, BoxError> {
        let mut fields = vec![
            ("grant_type".to_owned(), "client_credentials".to_owned()),
            ("client_id".to_owned(), self.client_id.clone()),
        ];
        if let Some(scope) = &self.scope {
            fields.push(("scope".to_owned(), scope.clone()));
        }
        let body = Zeroizing::new(format!(
            "{}&client_secret={}",
            encode_params(&fields),
            urlencoding::encode(self.client_secret.expose_secret())
        ));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));

        tracing::debug!(url = %self.token_url, "Requesting access token");
        let mut response = transport.perform(&TransportRequest {
            method: &Method::POST,
            url: &self.token_url,
            headers: &headers,
            body: Some(body.as_bytes()),
            timeout: self.timeout,
        })?;

        if !response.status.is_success() {
            return Err(format!("token endpoint returned HTTP {}", response.status).into());
        }

        let data = helper.read_body(&mut response)?;
        let document = converter.deserialize(&data)?;
        let token = document
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .ok_or("token response carries no access_token")?;
        Ok(SecretString::from(token.to_owned()))
    }
}

impl AuthStrategy for TokenEndpointStrategy {
    fn reauthenticate(
        &self,
        transport: &dyn Transport,
        converter: &dyn Converter,
        helper: &NetworkHelper,
    ) -> bool {
        match self.exchange(transport, converter, helper) {
            Ok(token) => {
                self.store.replace(token);
                tracing::debug!(url = %self.token_url, "Access token refreshed");
                true
            }
            Err(e) => {
                self.store.clear();
                tracing::warn!(url = %self.token_url, error = %e, "Re-authentication failed");
                false
            }
        }
    }
}

impl fmt::Debug for TokenEndpointStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEndpointStrategy")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::converter::JsonConverter;
    use crate::error::{TransportError, TransportErrorKind};
    use crate::transport::TransportResponse;
    use http::StatusCode;
    use parking_lot::Mutex;

    /// Records the last request body and answers with a fixed response.
    struct TokenServer {
        status: StatusCode,
        body: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl TokenServer {
        fn new(status: StatusCode, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for TokenServer {
        fn perform(
            &self,
            request: &TransportRequest<'_>,
        ) -> Result<TransportResponse, TransportError> {
            let body = String::from_utf8_lossy(request.body.unwrap_or_default()).into_owned();
            self.seen.lock().push(body);
            Ok(TransportResponse::new(self.status).with_body(self.body))
        }
    }

    struct Unreachable;

    impl Transport for Unreachable {
        fn perform(
            &self,
            _request: &TransportRequest<'_>,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::new(TransportErrorKind::Connect, "refused"))
        }
    }

    fn strategy(store: &TokenStore) -> TokenEndpointStrategy {
        TokenEndpointStrategy::new(
            "https://auth.example.com/token",
            "client-a",
            SecretString::from("s3cr3t&x".to_owned()),
            store.clone(),
        )
        .scope("read write")
    }

    #[test]
    fn test_token_store_shared_between_clones() {
        let store = TokenStore::new();
        let other = store.clone();
        store.set("abc");
        assert!(other.is_present());
        assert_eq!(other.with_token(str::len), Some(3));
        other.clear();
        assert!(!store.is_present());
    }

    #[test]
    fn test_token_store_debug_redacts() {
        let store = TokenStore::new();
        store.set("very-secret");
        assert!(!format!("{store:?}").contains("very-secret"));
    }

    #[test]
    fn test_strategy_posts_form_and_stores_token() {
        let store = TokenStore::new();
        let server = TokenServer::new(StatusCode::OK, r#"{"access_token":"tok-1","expires_in":60}"#);

        let ok = strategy(&store).reauthenticate(&server, &JsonConverter, &NetworkHelper::default());

        assert!(ok);
        assert_eq!(store.with_token(str::to_owned).as_deref(), Some("tok-1"));
        let seen = server.seen.lock();
        assert_eq!(
            seen[0],
            "grant_type=client_credentials&client_id=client-a&scope=read%20write&client_secret=s3cr3t%26x"
        );
    }

    #[test]
    fn test_strategy_fails_on_error_status() {
        let store = TokenStore::new();
        store.set("stale");
        let server = TokenServer::new(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#);

        let ok = strategy(&store).reauthenticate(&server, &JsonConverter, &NetworkHelper::default());

        assert!(!ok);
        assert!(!store.is_present(), "stale token cleared");
    }

    #[test]
    fn test_strategy_fails_without_access_token() {
        let store = TokenStore::new();
        let server = TokenServer::new(StatusCode::OK, r#"{"token_type":"bearer"}"#);
        assert!(!strategy(&store).reauthenticate(&server, &JsonConverter, &NetworkHelper::default()));
    }

    #[test]
    fn test_strategy_fails_on_transport_error() {
        let store = TokenStore::new();
        assert!(!strategy(&store).reauthenticate(
            &Unreachable,
            &JsonConverter,
            &NetworkHelper::default()
        ));
    }

    #[test]
    fn test_strategy_debug_redacts_secret() {
        let rendered = format!("{:?}", strategy(&TokenStore::new()));
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("REDACTED"));
    }
}
