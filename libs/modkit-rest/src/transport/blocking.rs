use super::{Transport, TransportRequest, TransportResponse, TransportSecurity};
use crate::error::{TransportError, TransportErrorKind};
use http::header::COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::io;
use std::time::Duration;

/// Default User-Agent string for outbound requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-rest/", env!("CARGO_PKG_VERSION"));

/// Default connect timeout of the blocking transport
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of redirects followed by the transport
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Default blocking transport backed by a pooled `ureq` agent with rustls.
///
/// HTTPS only unless built with `AllowInsecureHttp`. Every HTTP status is
/// returned as a response; only failures without a response become errors.
pub struct UreqTransport {
    agent: ureq::Agent,
    security: TransportSecurity,
}

impl UreqTransport {
    /// Create a transport with default settings (TLS only).
    #[must_use]
    pub fn new() -> Self {
        UreqTransportBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> UreqTransportBuilder {
        UreqTransportBuilder::new()
    }

    /// Validate URL and scheme against the transport security mode.
    fn validate_url(&self, url: &str) -> Result<(), TransportError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| malformed(format!("'{url}': {e}")))?;

        if uri.authority().is_none() {
            return Err(malformed(format!("'{url}': missing host/authority")));
        }

        match uri.scheme_str() {
            Some("https") => Ok(()),
            Some("http") => match self.security {
                TransportSecurity::AllowInsecureHttp => Ok(()),
                TransportSecurity::TlsOnly => Err(malformed(format!(
                    "'{url}': HTTPS required (transport security is TlsOnly)"
                ))),
            },
            Some(scheme) => Err(malformed(format!(
                "'{url}': scheme '{scheme}' not supported, only http:// and https://"
            ))),
            None => Err(malformed(format!("'{url}': missing scheme"))),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn perform(&self, request: &TransportRequest<'_>) -> Result<TransportResponse, TransportError> {
        self.validate_url(request.url)?;

        let mut req = self
            .agent
            .request(request.method.as_str(), request.url)
            .timeout(request.timeout);
        for (name, value) in joined_headers(request.headers) {
            req = req.set(name, &value);
        }

        let result = match request.body {
            Some(body) => req.send_bytes(body),
            None => req.call(),
        };

        match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => convert_response(response),
            Err(ureq::Error::Transport(transport)) => Err(classify(transport)),
        }
    }
}

/// Builder for [`UreqTransport`].
#[derive(Debug, Clone)]
pub struct UreqTransportBuilder {
    connect_timeout: Duration,
    max_redirects: u32,
    user_agent: String,
    security: TransportSecurity,
}

impl UreqTransportBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            security: TransportSecurity::TlsOnly,
        }
    }

    /// Set the connect timeout. Per-attempt read timeouts come from the retry policy.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum number of redirects (0 disables redirect following)
    #[must_use]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set transport security mode
    ///
    /// Use `TransportSecurity::AllowInsecureHttp` only for testing with mock servers.
    #[must_use]
    pub fn transport(mut self, security: TransportSecurity) -> Self {
        self.security = security;
        self
    }

    /// Allow insecure HTTP connections (for testing only)
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "modkit_rest::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.security = TransportSecurity::AllowInsecureHttp;
        self
    }

    #[must_use]
    pub fn build(self) -> UreqTransport {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.connect_timeout)
            .redirects(self.max_redirects)
            .user_agent(&self.user_agent)
            .https_only(self.security == TransportSecurity::TlsOnly)
            .build();
        UreqTransport {
            agent,
            security: self.security,
        }
    }
}

impl Default for UreqTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One value per header name: `ureq` keeps only the last `set` per name.
fn joined_headers(headers: &HeaderMap) -> Vec<(&str, String)> {
    headers
        .keys()
        .map(|name| {
            let separator = if name == COOKIE { "; " } else { ", " };
            let value = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>()
                .join(separator);
            (name.as_str(), value)
        })
        .collect()
}

fn malformed(reason: String) -> TransportError {
    TransportError::new(TransportErrorKind::MalformedUrl, reason)
}

fn convert_response(response: ureq::Response) -> Result<TransportResponse, TransportError> {
    let status = StatusCode::from_u16(response.status())
        .map_err(|e| TransportError::new(TransportErrorKind::Io, e))?;

    let mut headers = HeaderMap::new();
    for name in response.headers_names() {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(header = %name, "Dropping response header with invalid name");
            continue;
        };
        for value in response.all(&name) {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(header_name.clone(), value);
            }
        }
    }

    Ok(TransportResponse {
        status,
        headers,
        body: Some(Box::new(response.into_reader())),
    })
}

fn classify(transport: ureq::Transport) -> TransportError {
    let timed_out = std::error::Error::source(&transport)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .is_some_and(|err| {
            matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        });

    let kind = match transport.kind() {
        ureq::ErrorKind::InvalidUrl
        | ureq::ErrorKind::UnknownScheme
        | ureq::ErrorKind::InsecureRequestHttpsOnly => TransportErrorKind::MalformedUrl,
        ureq::ErrorKind::ConnectionFailed if timed_out => TransportErrorKind::ConnectTimeout,
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::ProxyConnect => {
            TransportErrorKind::Connect
        }
        _ if timed_out => TransportErrorKind::SocketTimeout,
        _ => TransportErrorKind::Io,
    };
    TransportError::new(kind, transport)
}
