use crate::network::NetworkResponse;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error source used across transport and interceptor boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of a [`RestError`] into the failure taxonomy that drives
/// caller decisions.
///
/// Every variant except [`ErrorKind::Timeout`] is produced only after the
/// execution loop has stopped retrying; `Timeout` itself is terminal once it
/// reaches the caller (the retry budget is already spent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bad descriptor, unknown endpoint, bad parameter name. Raised before dispatch.
    Configuration,
    /// Transport timeouts that exhausted the retry budget.
    Timeout,
    /// 401/403 or an interceptor auth signal that re-authentication could not fix.
    Authorization,
    /// Non-2xx response with a body.
    Server,
    /// No response object at all (DNS, refused connection, broken body stream).
    Connectivity,
    /// Response or request payload conversion failed.
    Conversion,
    /// Malformed URL or invalid header material. Never retried.
    Programming,
}

/// Configuration errors.
///
/// Always terminal and always raised before any transport round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("no endpoints registered")]
    EmptyRegistry,

    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("endpoint '{0}' registered more than once")]
    DuplicateEndpoint(String),

    #[error("endpoint base URL must not be empty")]
    MissingBaseUrl,

    #[error("call '{0}' declared more than once")]
    DuplicateCall(String),

    #[error("invalid path '{path}' for call '{call}': must be non-empty and start with '/'")]
    InvalidPath { call: String, path: String },

    #[error("path parameter must match pattern {pattern}, found '{name}'")]
    InvalidParameterName { name: String, pattern: &'static str },

    #[error("path '{path}' does not contain '{{{name}}}'")]
    UnknownParameter { path: String, name: String },

    #[error("path '{path}' declares {expected} parameter(s) {declared:?} but {supplied} were supplied")]
    ParameterCountMismatch {
        path: String,
        declared: Vec<String>,
        expected: usize,
        supplied: usize,
    },

    #[error("call '{call}' is a {actual} call and cannot be resolved as {requested}")]
    WrongCallShape {
        call: String,
        actual: &'static str,
        requested: &'static str,
    },

    #[error("dynamic URL for call '{0}' must not be empty")]
    MissingUrl(String),

    #[error("hypermedia link for call '{0}' carries no method")]
    MissingLinkMethod(String),

    #[error("failed to load configuration: {0}")]
    Load(String),
}

/// Classified transport failure.
///
/// [`Transport`](crate::Transport) implementations report every failure
/// through this kind so the execution loop can branch without inspecting
/// concrete error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// Read timed out after the connection was established.
    SocketTimeout,
    /// Connection could not be established within the timeout.
    ConnectTimeout,
    /// URL could not be parsed or its scheme is not allowed.
    MalformedUrl,
    /// DNS failure, refused or reset connection.
    Connect,
    /// Any other I/O failure.
    Io,
}

impl TransportErrorKind {
    #[must_use]
    pub fn is_timeout(self) -> bool {
        matches!(self, Self::SocketTimeout | Self::ConnectTimeout)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::SocketTimeout => "socket timeout",
            Self::ConnectTimeout => "connect timeout",
            Self::MalformedUrl => "malformed URL",
            Self::Connect => "connection failed",
            Self::Io => "I/O error",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by a [`Transport`](crate::Transport).
#[derive(Error, Debug)]
#[error("{kind}: {source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: BoxError,
}

impl TransportError {
    #[must_use]
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

/// Payload conversion failure.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ConversionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<serde_json::Error> for ConversionError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("JSON conversion failed", err)
    }
}

/// Terminal error of one logical call.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport kept timing out until the retry budget was spent.
    #[error("request timed out after {attempts} attempt(s), last timeout {timeout:?}")]
    Timeout {
        attempts: u32,
        timeout: Duration,
        #[source]
        source: TransportError,
    },

    /// Authorization failure the auth strategy could not recover from.
    ///
    /// `response` is set when the failure came from a 401/403 response and is
    /// `None` when the interceptor raised the signal.
    #[error("authorization failed: {reason}")]
    Auth {
        reason: String,
        response: Option<Box<NetworkResponse>>,
    },

    /// Non-2xx response carrying a body.
    #[error("server error: HTTP {}", .response.status)]
    Server { response: Box<NetworkResponse> },

    #[error("no connection: {0}")]
    NoConnection(#[source] TransportError),

    /// A response started but its body could not be read.
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    #[error("failed to parse response: {0}")]
    Parse(#[source] ConversionError),

    #[error("failed to serialize request body: {0}")]
    Serialize(#[source] ConversionError),

    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Interceptor failed with something other than an auth signal.
    #[error("request interceptor failed: {0}")]
    Interceptor(#[source] BoxError),
}

impl RestError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Auth { .. } => ErrorKind::Authorization,
            Self::Server { .. } => ErrorKind::Server,
            Self::NoConnection(_) | Self::Network(_) | Self::Interceptor(_) => {
                ErrorKind::Connectivity
            }
            Self::Parse(_) | Self::Serialize(_) => ErrorKind::Conversion,
            Self::MalformedUrl { .. } | Self::InvalidHeaderName(_) | Self::InvalidHeaderValue(_) => {
                ErrorKind::Programming
            }
        }
    }

    /// Transient condition: issuing the same call again later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::NoConnection(_) | Self::Network(_) => true,
            Self::Server { response } => response.status.is_server_error(),
            _ => false,
        }
    }

    /// Repeating the call unchanged can never succeed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Programming | ErrorKind::Conversion
        )
    }

    /// Response attached to the error, if the server produced one.
    #[must_use]
    pub fn response(&self) -> Option<&NetworkResponse> {
        match self {
            Self::Server { response } => Some(response),
            Self::Auth { response, .. } => response.as_deref(),
            _ => None,
        }
    }
}
