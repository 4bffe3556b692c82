//! Byte-level transport contract.
//!
//! A [`Transport`] performs exactly one blocking request/response exchange.
//! Redirect following, connection reuse and TLS belong to the implementation;
//! retries, re-authentication and caching belong to the execution loop.

mod blocking;

pub use blocking::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT, UreqTransport,
    UreqTransportBuilder,
};

use crate::error::TransportError;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::fmt;
use std::io::{Cursor, Read};
use std::time::Duration;

/// Transport security configuration
///
/// Controls whether the transport enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    AllowInsecureHttp,
}

/// One physical attempt as seen by the transport.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a [u8]>,
    /// Timeout for this attempt; grows between retries.
    pub timeout: Duration,
}

/// Response body stream handed back by a transport.
pub type BodyReader = Box<dyn Read + Send>;

/// Response produced by a transport.
///
/// The body is a stream so that a `304 Not Modified` can be handled without
/// reading a single byte.
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<BodyReader>,
}

impl TransportResponse {
    /// Response without a body (e.g. 204, 304).
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attach an in-memory body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Box::new(Cursor::new(body.into())));
        self
    }

    /// Attach a streaming body.
    #[must_use]
    pub fn with_reader(mut self, reader: BodyReader) -> Self {
        self.body = Some(reader);
        self
    }

    /// Add a response header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// `Content-Length` if present and parseable.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Blocking request/response exchange.
///
/// Implementations must classify failures with
/// [`TransportErrorKind`](crate::TransportErrorKind): timeouts are retried by
/// the execution loop, `MalformedUrl` is a programming error, everything else
/// is a terminal connectivity failure. Any HTTP status, including 4xx/5xx, is
/// a successful exchange and must be returned as `Ok`.
pub trait Transport: Send + Sync {
    /// Perform one exchange.
    ///
    /// # Errors
    /// Returns [`TransportError`] when no response could be obtained.
    fn perform(&self, request: &TransportRequest<'_>) -> Result<TransportResponse, TransportError>;
}
