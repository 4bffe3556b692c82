use http::Method;
use serde::{Deserialize, Serialize};

/// A hypermedia link returned by a server: where to go and how.
pub trait HypermediaLink {
    /// Absolute target URL.
    fn href(&self) -> &str;

    /// Method to use, if the link declares one.
    fn method(&self) -> Option<Method>;
}

/// Plain link value as commonly embedded in JSON resources.
///
/// ```json
/// { "rel": "next", "href": "https://api.example.com/items?page=2", "method": "GET" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

impl Link {
    #[must_use]
    pub fn new(href: impl Into<String>, method: Method) -> Self {
        Self {
            href: href.into(),
            method: Some(method.as_str().to_owned()),
            rel: None,
        }
    }
}

impl HypermediaLink for Link {
    fn href(&self) -> &str {
        &self.href
    }

    /// Unparseable method names count as absent.
    fn method(&self) -> Option<Method> {
        self.method
            .as_deref()
            .and_then(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
    }
}
