//! The concrete, single-use request handed to the execution loop.

use crate::cache::CacheSnapshot;
use crate::endpoint::Endpoint;
use crate::retry::RetryPolicy;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::sync::Arc;
use std::time::Duration;

/// `Content-Type` of form-encoded bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Methods whose parameters travel in the query string.
#[must_use]
pub fn is_read_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

/// `k=v` pairs joined by `&`, each component percent-encoded as UTF-8.
#[must_use]
pub fn encode_params(params: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in params.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(&urlencoding::encode(key));
        out.push('=');
        out.push_str(&urlencoding::encode(value));
    }
    out
}

/// Append `params` as a query string.
///
/// A `?` is added unless the URL already ends with one; a URL that already
/// carries a query gets `&` instead.
#[must_use]
pub fn append_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_owned();
    }
    let separator = if url.ends_with('?') || url.ends_with('&') {
        ""
    } else if url.contains('?') {
        "&"
    } else {
        "?"
    };
    format!("{url}{separator}{}", encode_params(params))
}

/// A resolved request: method, URL, headers, body source and policies.
///
/// Owned exclusively by the execution loop for one logical call. Form
/// parameters and a raw body may both be present; the raw body wins.
pub struct RunnableRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) form: Vec<(String, String)>,
    pub(crate) raw_body: Option<Bytes>,
    pub(crate) should_cache: bool,
    pub(crate) cache_ttl: Option<Duration>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) endpoint: Arc<Endpoint>,
    pub(crate) cache_entry: Option<CacheSnapshot>,
    pub(crate) tag: Option<String>,
}

impl RunnableRequest {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers; interceptors add credentials here.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Insert or replace a header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn form_params(&self) -> &[(String, String)] {
        &self.form
    }

    #[must_use]
    pub fn raw_body(&self) -> Option<&Bytes> {
        self.raw_body.as_ref()
    }

    /// Bytes sent on the wire: the raw body if set, else the encoded form
    /// parameters, else nothing.
    #[must_use]
    pub fn body(&self) -> Option<Bytes> {
        if let Some(raw) = &self.raw_body {
            return Some(raw.clone());
        }
        if self.form.is_empty() {
            None
        } else {
            Some(Bytes::from(encode_params(&self.form)))
        }
    }

    /// `Content-Type` implied by the body source, if the caller did not set one.
    #[must_use]
    pub fn body_content_type(&self) -> Option<&str> {
        if self.raw_body.is_some() {
            Some(self.endpoint.converter().content_type())
        } else if self.form.is_empty() {
            None
        } else {
            Some(FORM_CONTENT_TYPE)
        }
    }

    #[must_use]
    pub fn should_cache(&self) -> bool {
        self.should_cache
    }

    /// Per-request cache lifetime; `None` uses the client default.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }

    /// Key under which the response is cached; see [`crate::cache::cache_key`].
    #[must_use]
    pub fn cache_key(&self) -> String {
        crate::cache::cache_key(&self.method, &self.url)
    }

    #[must_use]
    pub fn cache_entry(&self) -> Option<&CacheSnapshot> {
        self.cache_entry.as_ref()
    }

    /// Attach a prior snapshot so the next dispatch sends validators.
    pub fn set_cache_entry(&mut self, entry: Option<CacheSnapshot>) {
        self.cache_entry = entry;
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    #[must_use]
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Headers for one attempt: request headers plus the implied `Content-Type`.
    pub(crate) fn wire_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if !headers.contains_key(CONTENT_TYPE)
            && let Some(content_type) = self.body_content_type()
            && let Ok(value) = HeaderValue::from_str(content_type)
        {
            headers.insert(CONTENT_TYPE, value);
        }
        headers
    }
}

impl std::fmt::Debug for RunnableRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnableRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("form", &self.form.len())
            .field("raw_body", &self.raw_body.as_ref().map(Bytes::len))
            .field("should_cache", &self.should_cache)
            .field("retry_policy", &self.retry_policy)
            .field("endpoint", &self.endpoint.name())
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
