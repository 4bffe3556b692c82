//! Declarative request resolution.
//!
//! A [`CallBuilder`] collects runtime parameters for one [`CallDescriptor`]
//! and turns them into a [`RunnableRequest`] before any network activity.
//! Every configuration problem (unknown endpoint, bad parameter name,
//! parameter count mismatch, wrong descriptor shape) surfaces from
//! [`CallBuilder::build`].

use crate::client::{CallResponse, RestClient};
use crate::converter::FromBody;
use crate::descriptor::{
    CallDescriptor, CallShape, substitute_placeholders, validate_param_name,
};
use crate::error::{ConfigError, ConversionError, RestError};
use crate::link::HypermediaLink;
use crate::listener::Callback;
use crate::request::{RunnableRequest, append_query, is_read_method};
use crate::retry::{RetryOverrides, RetryPolicy};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Where the final URL of a call comes from.
///
/// Exactly one variant is active per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestInfo<'a> {
    /// Endpoint base URL plus the descriptor's path template.
    Templated {
        path: &'a str,
        placeholders: &'a [String],
    },
    /// Full URL supplied by the caller.
    Dynamic { url: String },
    /// URL and method from a hypermedia link.
    LinkDerived { href: String, method: Method },
}

impl<'a> RequestInfo<'a> {
    /// Select the variant for a templated call.
    ///
    /// # Errors
    /// Returns [`ConfigError::WrongCallShape`] if the descriptor is not templated.
    pub fn templated<T>(descriptor: &'a CallDescriptor<T>) -> Result<Self, ConfigError> {
        match descriptor.shape() {
            CallShape::Templated { path, placeholders } => Ok(Self::Templated { path, placeholders }),
            other => Err(wrong_shape(descriptor.name(), other, "templated")),
        }
    }

    /// Select the variant for a caller-supplied URL.
    ///
    /// # Errors
    /// Returns [`ConfigError::WrongCallShape`] for a non-dynamic descriptor
    /// and [`ConfigError::MissingUrl`] for a blank URL.
    pub fn dynamic<T>(descriptor: &CallDescriptor<T>, url: String) -> Result<Self, ConfigError> {
        if !matches!(descriptor.shape(), CallShape::Dynamic) {
            return Err(wrong_shape(descriptor.name(), descriptor.shape(), "dynamic"));
        }
        if url.trim().is_empty() {
            return Err(ConfigError::MissingUrl(descriptor.name().to_owned()));
        }
        Ok(Self::Dynamic { url })
    }

    /// Select the variant for a hypermedia link.
    ///
    /// # Errors
    /// Returns [`ConfigError::WrongCallShape`] for a non-hypermedia
    /// descriptor, [`ConfigError::MissingUrl`] for an empty `href` and
    /// [`ConfigError::MissingLinkMethod`] when the link has no usable method.
    pub fn link<T>(
        descriptor: &CallDescriptor<T>,
        link: &dyn HypermediaLink,
    ) -> Result<Self, ConfigError> {
        if !matches!(descriptor.shape(), CallShape::Hypermedia) {
            return Err(wrong_shape(descriptor.name(), descriptor.shape(), "hypermedia"));
        }
        if link.href().trim().is_empty() {
            return Err(ConfigError::MissingUrl(descriptor.name().to_owned()));
        }
        let method = link
            .method()
            .ok_or_else(|| ConfigError::MissingLinkMethod(descriptor.name().to_owned()))?;
        Ok(Self::LinkDerived {
            href: link.href().to_owned(),
            method,
        })
    }

    /// Placeholders runtime path parameters are validated against.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        match self {
            Self::Templated { placeholders, .. } => placeholders,
            Self::Dynamic { .. } | Self::LinkDerived { .. } => &[],
        }
    }

    /// Template or URL, for error messages.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Templated { path, .. } => path,
            Self::Dynamic { url } => url,
            Self::LinkDerived { href, .. } => href,
        }
    }

    /// Method of the call: the link's own for link-derived calls.
    #[must_use]
    pub fn method(&self, declared: Option<&Method>) -> Option<Method> {
        match self {
            Self::LinkDerived { method, .. } => Some(method.clone()),
            Self::Templated { .. } | Self::Dynamic { .. } => declared.cloned(),
        }
    }

    /// Final URL with path parameters substituted verbatim.
    ///
    /// # Errors
    /// Returns [`ConfigError::ParameterCountMismatch`] unless exactly one
    /// value per placeholder is supplied.
    pub fn resolve_url(
        &self,
        base_url: &str,
        replacements: &[(String, String)],
    ) -> Result<String, ConfigError> {
        let placeholders = self.placeholders();
        if replacements.len() != placeholders.len() {
            return Err(ConfigError::ParameterCountMismatch {
                path: self.path().to_owned(),
                declared: placeholders.to_vec(),
                expected: placeholders.len(),
                supplied: replacements.len(),
            });
        }
        match self {
            Self::Templated { path, .. } => Ok(format!(
                "{base_url}{}",
                substitute_placeholders(path, replacements)
            )),
            Self::Dynamic { url } => Ok(url.clone()),
            Self::LinkDerived { href, .. } => Ok(href.clone()),
        }
    }
}

fn wrong_shape(call: &str, actual: &CallShape, requested: &'static str) -> ConfigError {
    ConfigError::WrongCallShape {
        call: call.to_owned(),
        actual: actual.label(),
        requested,
    }
}

/// Collects runtime parameters for one call.
///
/// Errors are captured as they happen and reported by
/// [`build`](CallBuilder::build); the first one wins.
#[must_use = "CallBuilder does nothing until .build() or .execute() is called"]
pub struct CallBuilder<'a, T> {
    client: &'a RestClient,
    descriptor: &'a CallDescriptor<T>,
    info: Result<RequestInfo<'a>, ConfigError>,
    path_params: Vec<(String, String)>,
    params: Vec<(String, String)>,
    headers: HeaderMap,
    raw_body: Option<Bytes>,
    typed_body: Option<serde_json::Value>,
    should_cache: Option<bool>,
    cache_ttl: Option<Duration>,
    retry: RetryOverrides,
    tag: Option<String>,
    error: Option<RestError>,
}

impl<'a, T> CallBuilder<'a, T> {
    pub(crate) fn new(
        client: &'a RestClient,
        descriptor: &'a CallDescriptor<T>,
        info: Result<RequestInfo<'a>, ConfigError>,
    ) -> Self {
        Self {
            client,
            descriptor,
            info,
            path_params: Vec::new(),
            params: Vec::new(),
            headers: HeaderMap::new(),
            raw_body: None,
            typed_body: None,
            should_cache: None,
            cache_ttl: None,
            retry: RetryOverrides::default(),
            tag: None,
            error: None,
        }
    }

    fn fail(&mut self, error: impl Into<RestError>) {
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }

    /// Substitute `{name}` in the path template with `value` verbatim.
    ///
    /// The name must match the parameter pattern and appear in the template.
    /// Supplying the same name twice replaces the earlier value.
    pub fn path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        if let Err(e) = validate_param_name(name) {
            self.fail(e);
            return self;
        }
        if let Ok(info) = &self.info
            && !info.placeholders().iter().any(|p| p == name)
        {
            let err = ConfigError::UnknownParameter {
                path: info.path().to_owned(),
                name: name.to_owned(),
            };
            self.fail(err);
            return self;
        }
        let value = value.into();
        match self.path_params.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.path_params.push((name.to_owned(), value)),
        }
        self
    }

    /// Add a parameter: query string for read methods, form body otherwise.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Add a header. Caller headers replace endpoint defaults of the same name.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: Into<RestError>,
        V: TryInto<HeaderValue>,
        V::Error: Into<RestError>,
    {
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => self.fail(e),
            (_, Err(e)) => self.fail(e),
        }
        self
    }

    /// Send `body` verbatim. Suppresses form parameters.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some(body.into());
        self.typed_body = None;
        self
    }

    /// Serialize `value` with the endpoint's converter and send it as the body.
    pub fn json_body<B: Serialize + ?Sized>(mut self, value: &B) -> Self {
        match serde_json::to_value(value) {
            Ok(tree) => {
                self.typed_body = Some(tree);
                self.raw_body = None;
            }
            Err(e) => self.fail(RestError::Serialize(ConversionError::from(e))),
        }
        self
    }

    /// Enable or disable response caching (off unless enabled here).
    pub fn should_cache(mut self, should_cache: bool) -> Self {
        self.should_cache = Some(should_cache);
        self
    }

    /// Cache lifetime for this call's response.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Initial per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.retry.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = Some(max_retries);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.retry.backoff_multiplier = Some(multiplier);
        self
    }

    /// Opaque tag used to cancel queued calls as a group.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Resolve into a runnable request.
    ///
    /// # Errors
    /// Returns the first error recorded while building, or a
    /// [`ConfigError`] for an unknown endpoint or parameter count mismatch,
    /// or [`RestError::Serialize`] if a typed body cannot be encoded.
    pub fn build(self) -> Result<RunnableRequest, RestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let info = self.info?;
        let endpoint = Arc::clone(self.client.registry().get(self.descriptor.endpoint())?);
        let Some(method) = info.method(self.descriptor.method()) else {
            return Err(ConfigError::MissingLinkMethod(self.descriptor.name().to_owned()).into());
        };

        let mut url = info.resolve_url(endpoint.base_url(), &self.path_params)?;
        let form = if is_read_method(&method) {
            url = append_query(&url, &self.params);
            Vec::new()
        } else {
            self.params
        };

        let raw_body = match (self.raw_body, self.typed_body) {
            (Some(raw), _) => Some(raw),
            (None, Some(tree)) => Some(
                endpoint
                    .converter()
                    .serialize(&tree)
                    .map_err(RestError::Serialize)?,
            ),
            (None, None) => None,
        };

        let mut headers = endpoint.default_headers().clone();
        for name in self.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }

        let mut retry = self.client.retry_defaults();
        if let Some(max_retries) = self.descriptor.retry_override() {
            retry.max_retries = max_retries;
        }
        let retry_policy = RetryPolicy::from(self.retry.apply(retry));

        Ok(RunnableRequest {
            should_cache: self.should_cache.unwrap_or(false),
            method,
            url,
            headers,
            form,
            raw_body,
            cache_ttl: self.cache_ttl,
            retry_policy,
            endpoint,
            cache_entry: None,
            tag: self.tag,
        })
    }
}

impl<T: FromBody> CallBuilder<'_, T> {
    /// Build and execute on the calling thread.
    ///
    /// # Errors
    /// Returns any resolution error or the terminal error of the call.
    pub fn execute(self) -> Result<CallResponse<T>, RestError> {
        let client = self.client;
        let request = self.build()?;
        client.execute(request)
    }

    /// Build and execute on the calling thread, delivering through `callback`.
    ///
    /// Resolution errors go to [`Callback::failure`] without `before`.
    pub fn execute_with<C: Callback<T>>(self, callback: C) {
        let client = self.client;
        match self.build() {
            Ok(request) => client.execute_with(request, callback),
            Err(e) => callback.failure(e),
        }
    }
}
