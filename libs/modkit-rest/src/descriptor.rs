//! Call declarations.
//!
//! A [`CallDescriptor`] is the static description of one API operation. The
//! set of calls an application makes is closed, so descriptors are built as
//! plain values (usually `LazyLock` statics or fields of a client struct)
//! and validated once at startup through a [`CallCatalog`].

use crate::error::ConfigError;
use crate::registry::EndpointRegistry;
use http::Method;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::LazyLock;

/// Pattern every path parameter name must match.
pub const PARAM_NAME_PATTERN: &str = "[a-zA-Z][a-zA-Z0-9_-]*";

#[allow(clippy::expect_used)] // good regex, it doesn't panic
static PARAM_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{PARAM_NAME_PATTERN}$")).expect("static regex should not panic")
});

#[allow(clippy::expect_used)] // good regex, it doesn't panic
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\{{({PARAM_NAME_PATTERN})\}}")).expect("static regex should not panic")
});

/// Check a runtime parameter name against [`PARAM_NAME_PATTERN`].
///
/// # Errors
/// Returns [`ConfigError::InvalidParameterName`] if the name does not match.
pub fn validate_param_name(name: &str) -> Result<(), ConfigError> {
    if PARAM_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameterName {
            name: name.to_owned(),
            pattern: PARAM_NAME_PATTERN,
        })
    }
}

/// Distinct `{name}` placeholders of `path`, in order of first appearance.
#[must_use]
pub fn parse_placeholders(path: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER_REGEX
        .captures_iter(path)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| seen.insert(*name))
        .map(str::to_owned)
        .collect()
}

/// Replace every `{name}` in `path` with its value in one pass.
///
/// Values are inserted verbatim and never re-scanned; placeholders without
/// a value are left untouched.
#[must_use]
pub fn substitute_placeholders(path: &str, values: &[(String, String)]) -> String {
    PLACEHOLDER_REGEX
        .replace_all(path, |caps: &regex::Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            values
                .iter()
                .find(|(n, _)| n == name)
                .map_or_else(|| caps[0].to_owned(), |(_, v)| v.clone())
        })
        .into_owned()
}

/// How a call obtains its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallShape {
    /// Endpoint base URL plus a path template.
    Templated {
        path: String,
        placeholders: Vec<String>,
    },
    /// Full URL supplied by the caller.
    Dynamic,
    /// URL and method taken from a hypermedia link.
    Hypermedia,
}

impl CallShape {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Templated { .. } => "templated",
            Self::Dynamic => "dynamic",
            Self::Hypermedia => "hypermedia",
        }
    }
}

/// Declaration of one API operation returning `T`.
///
/// `T` defaults to `String`: the raw body, with no converter involved.
pub struct CallDescriptor<T = String> {
    name: String,
    method: Option<Method>,
    shape: CallShape,
    endpoint: Option<String>,
    max_retries: Option<u32>,
    _response: PhantomData<fn() -> T>,
}

impl CallDescriptor<String> {
    /// Declare a call against a path template such as `/users/{id}`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPath`] if `path` is empty or does not
    /// start with `/`.
    pub fn templated(
        name: impl Into<String>,
        method: Method,
        path: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let path = path.into();
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidPath { call: name, path });
        }
        let placeholders = parse_placeholders(&path);
        Ok(Self::with_shape(
            name,
            Some(method),
            CallShape::Templated { path, placeholders },
        ))
    }

    /// Declare a call whose full URL is supplied at call time.
    #[must_use]
    pub fn dynamic(name: impl Into<String>, method: Method) -> Self {
        Self::with_shape(name.into(), Some(method), CallShape::Dynamic)
    }

    /// Declare a call whose URL and method come from a hypermedia link.
    #[must_use]
    pub fn hypermedia(name: impl Into<String>) -> Self {
        Self::with_shape(name.into(), None, CallShape::Hypermedia)
    }

    fn with_shape(name: String, method: Option<Method>, shape: CallShape) -> Self {
        Self {
            name,
            method,
            shape,
            endpoint: None,
            max_retries: None,
            _response: PhantomData,
        }
    }
}

impl<T> CallDescriptor<T> {
    /// Route the call to a named endpoint instead of the first registered one.
    #[must_use]
    pub fn on_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Override the process-wide retry count for this call.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Change the response payload type.
    #[must_use]
    pub fn returning<U>(self) -> CallDescriptor<U> {
        CallDescriptor {
            name: self.name,
            method: self.method,
            shape: self.shape,
            endpoint: self.endpoint,
            max_retries: self.max_retries,
            _response: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared method; `None` for hypermedia calls.
    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    #[must_use]
    pub fn shape(&self) -> &CallShape {
        &self.shape
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    #[must_use]
    pub fn retry_override(&self) -> Option<u32> {
        self.max_retries
    }

    /// Path placeholders of a templated call; empty otherwise.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        match &self.shape {
            CallShape::Templated { placeholders, .. } => placeholders,
            CallShape::Dynamic | CallShape::Hypermedia => &[],
        }
    }
}

impl<T> Clone for CallDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            method: self.method.clone(),
            shape: self.shape.clone(),
            endpoint: self.endpoint.clone(),
            max_retries: self.max_retries,
            _response: PhantomData,
        }
    }
}

impl<T> fmt::Debug for CallDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallDescriptor")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("shape", &self.shape)
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .field("response", &std::any::type_name::<T>())
            .finish()
    }
}

/// Summary of one declared call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEntry {
    pub name: String,
    pub method: Option<Method>,
    pub kind: &'static str,
    pub endpoint: Option<String>,
}

/// Startup-validated table of every call an application declares.
///
/// Call names are unique and every endpoint-qualified call names a
/// registered endpoint.
#[derive(Debug, Clone, Default)]
pub struct CallCatalog {
    entries: Vec<CallEntry>,
}

impl CallCatalog {
    #[must_use]
    pub fn builder() -> CallCatalogBuilder {
        CallCatalogBuilder::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CallEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`CallCatalog`].
///
/// Duplicate names are recorded and reported by
/// [`validate`](CallCatalogBuilder::validate).
#[derive(Debug, Default)]
#[must_use]
pub struct CallCatalogBuilder {
    entries: Vec<CallEntry>,
    error: Option<ConfigError>,
}

impl CallCatalogBuilder {
    pub fn declare<T>(mut self, descriptor: &CallDescriptor<T>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.entries.iter().any(|e| e.name == descriptor.name) {
            self.error = Some(ConfigError::DuplicateCall(descriptor.name.clone()));
            return self;
        }
        self.entries.push(CallEntry {
            name: descriptor.name.clone(),
            method: descriptor.method.clone(),
            kind: descriptor.shape.label(),
            endpoint: descriptor.endpoint.clone(),
        });
        self
    }

    /// Check every declaration against `registry`.
    ///
    /// # Errors
    /// Returns the first duplicate call name or unknown endpoint.
    pub fn validate(self, registry: &EndpointRegistry) -> Result<CallCatalog, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for entry in &self.entries {
            if let Some(endpoint) = &entry.endpoint {
                registry.get(Some(endpoint))?;
            }
        }
        Ok(CallCatalog {
            entries: self.entries,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::Endpoint;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::builder()
            .register(Endpoint::builder("api", "https://api.example.com").build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_placeholders_distinct_in_order() {
        assert_eq!(
            parse_placeholders("/users/{id}/posts/{postId}/{id}"),
            vec!["id".to_owned(), "postId".to_owned()]
        );
        assert!(parse_placeholders("/users").is_empty());
    }

    #[test]
    fn test_placeholder_names_follow_pattern() {
        assert_eq!(parse_placeholders("/a/{9bad}/{ok_1-x}"), vec!["ok_1-x".to_owned()]);
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let values = vec![
            ("a".to_owned(), "{b}".to_owned()),
            ("b".to_owned(), "2".to_owned()),
        ];
        assert_eq!(substitute_placeholders("/x/{a}/{b}/{c}", &values), "/x/{b}/2/{c}");
    }

    #[test]
    fn test_param_name_validation() {
        assert!(validate_param_name("postId").is_ok());
        assert!(validate_param_name("a-b_c9").is_ok());
        assert!(matches!(
            validate_param_name("1id"),
            Err(ConfigError::InvalidParameterName { .. })
        ));
        assert!(validate_param_name("").is_err());
        assert!(validate_param_name("id}").is_err());
    }

    #[test]
    fn test_templated_requires_leading_slash() {
        let err = CallDescriptor::templated("users", Method::GET, "users/{id}").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
        assert!(CallDescriptor::templated("users", Method::GET, "").is_err());
    }

    #[test]
    fn test_descriptor_accessors() {
        let d = CallDescriptor::templated("post", Method::GET, "/users/{id}/posts/{postId}")
            .unwrap()
            .on_endpoint("api")
            .max_retries(3)
            .returning::<serde_json::Value>();
        assert_eq!(d.name(), "post");
        assert_eq!(d.method(), Some(&Method::GET));
        assert_eq!(d.endpoint(), Some("api"));
        assert_eq!(d.retry_override(), Some(3));
        assert_eq!(d.placeholders().len(), 2);
        assert_eq!(d.shape().label(), "templated");

        let link = CallDescriptor::hypermedia("follow");
        assert!(link.method().is_none());
        assert!(link.placeholders().is_empty());
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let a = CallDescriptor::dynamic("fetch", Method::GET);
        let b = CallDescriptor::dynamic("fetch", Method::POST);
        let err = CallCatalog::builder()
            .declare(&a)
            .declare(&b)
            .validate(&registry())
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateCall("fetch".to_owned()));
    }

    #[test]
    fn test_catalog_rejects_unknown_endpoint() {
        let d = CallDescriptor::dynamic("fetch", Method::GET).on_endpoint("billing");
        let err = CallCatalog::builder()
            .declare(&d)
            .validate(&registry())
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownEndpoint("billing".to_owned()));
    }

    #[test]
    fn test_catalog_lists_calls() {
        let users = CallDescriptor::templated("users", Method::GET, "/users").unwrap();
        let follow = CallDescriptor::hypermedia("follow").on_endpoint("api");
        let catalog = CallCatalog::builder()
            .declare(&users)
            .declare(&follow)
            .validate(&registry())
            .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("follow").unwrap().kind, "hypermedia");
        assert_eq!(catalog.iter().count(), 2);
    }
}
