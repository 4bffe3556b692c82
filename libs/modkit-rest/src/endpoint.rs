use crate::auth::{AuthStrategy, RequestInterceptor};
use crate::converter::{Converter, JsonConverter};
use crate::error::{ConfigError, RestError};
use crate::transport::{Transport, UreqTransport};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;

/// A named remote API: base URL plus the capabilities used to talk to it.
///
/// Immutable once built and shared behind `Arc` for the process lifetime.
pub struct Endpoint {
    name: String,
    base_url: String,
    transport: Arc<dyn Transport>,
    converter: Arc<dyn Converter>,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
    auth_strategy: Option<Arc<dyn AuthStrategy>>,
    default_headers: HeaderMap,
}

impl Endpoint {
    /// Start building an endpoint.
    ///
    /// The transport defaults to [`UreqTransport`] (TLS only) and the
    /// converter to [`JsonConverter`].
    pub fn builder(name: impl Into<String>, base_url: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            name: name.into(),
            base_url: base_url.into(),
            transport: None,
            converter: None,
            interceptor: None,
            auth_strategy: None,
            default_headers: HeaderMap::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL without a trailing `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    #[must_use]
    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    #[must_use]
    pub fn interceptor(&self) -> Option<&dyn RequestInterceptor> {
        self.interceptor.as_deref()
    }

    #[must_use]
    pub fn auth_strategy(&self) -> Option<&dyn AuthStrategy> {
        self.auth_strategy.as_deref()
    }

    /// Headers applied to every request, under caller headers.
    #[must_use]
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("has_interceptor", &self.interceptor.is_some())
            .field("has_auth_strategy", &self.auth_strategy.is_some())
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Endpoint`].
///
/// Header errors are captured and reported by [`build`](EndpointBuilder::build).
#[must_use = "EndpointBuilder does nothing until .build() is called"]
pub struct EndpointBuilder {
    name: String,
    base_url: String,
    transport: Option<Arc<dyn Transport>>,
    converter: Option<Arc<dyn Converter>>,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
    auth_strategy: Option<Arc<dyn AuthStrategy>>,
    default_headers: HeaderMap,
    error: Option<RestError>,
}

impl EndpointBuilder {
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Share one transport (and its connection pool) between endpoints.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    pub fn interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.interceptor = Some(Arc::new(interceptor));
        self
    }

    pub fn auth_strategy(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.auth_strategy = Some(Arc::new(strategy));
        self
    }

    /// Add a default header. A later value for the same name replaces the earlier one.
    pub fn default_header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: Into<RestError>,
        V: TryInto<HeaderValue>,
        V::Error: Into<RestError>,
    {
        if self.error.is_some() {
            return self;
        }
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => {
                self.default_headers.insert(name, value);
            }
            (Err(e), _) => self.error = Some(e.into()),
            (_, Err(e)) => self.error = Some(e.into()),
        }
        self
    }

    /// Build the endpoint.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingBaseUrl`] for a blank base URL, or the
    /// first header error recorded while building.
    pub fn build(self) -> Result<Endpoint, RestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let base_url = self.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl.into());
        }

        Ok(Endpoint {
            name: self.name,
            base_url: base_url.to_owned(),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(UreqTransport::new())),
            converter: self.converter.unwrap_or_else(|| Arc::new(JsonConverter)),
            interceptor: self.interceptor,
            auth_strategy: self.auth_strategy,
            default_headers: self.default_headers,
        })
    }
}
