//! Serde configuration and layered loading.
//!
//! Sources are merged in order, later ones winning:
//! defaults -> YAML file -> environment (`MODKIT_REST__` prefix, `__` nesting).
//!
//! ```yaml
//! endpoints:
//!   - name: api
//!     base_url: https://api.example.com/v1
//!     default_headers:
//!       accept: application/json
//! retry:
//!   timeout: 2500ms
//!   max_retries: 1
//!   backoff_multiplier: 1.0
//! cache:
//!   ttl: 8h
//!   max_entries: 1024
//! ```

use crate::cache::{DEFAULT_CACHE_TTL, DEFAULT_MAX_CACHE_ENTRIES, MemoryCacheStore};
use crate::client::{RestClient, RestClientBuilder};
use crate::endpoint::Endpoint;
use crate::error::{ConfigError, RestError};
use crate::registry::EndpointRegistry;
use crate::transport::{TransportSecurity, UreqTransport};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "MODKIT_REST__";

/// Durations written in human form (`"2500ms"`, `"8h"`).
mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de};
        use std::time::Duration;

        #[allow(clippy::ref_option)] // signature required by `serde(with)`
        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| humantime::parse_duration(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}

/// Process-wide retry defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Initial per-attempt timeout.
    #[serde(with = "human_duration")]
    pub timeout: Duration,
    pub max_retries: u32,
    /// Each retry adds `timeout * backoff_multiplier` to the timeout.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2500),
            max_retries: 1,
            backoff_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Uniform client-side cache window; origin cache directives are ignored.
    #[serde(with = "human_duration")]
    pub ttl: Duration,
    /// Snapshots kept by the in-memory store.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_in_flight: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_in_flight: 4 }
    }
}

/// One endpoint served by the default transport and JSON converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(
        default,
        with = "human_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub connect_timeout: Option<Duration>,
    /// Permit plain `http://` URLs (mock servers only).
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl EndpointConfig {
    /// Build the endpoint with a `ureq` transport configured from this entry.
    ///
    /// # Errors
    /// Returns [`RestError`] for a blank base URL or an invalid default header.
    pub fn build(&self) -> Result<Endpoint, RestError> {
        let mut transport = UreqTransport::builder();
        if let Some(timeout) = self.connect_timeout {
            transport = transport.connect_timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            transport = transport.user_agent(user_agent.as_str());
        }
        if self.allow_insecure_http {
            tracing::warn!(
                target: "modkit_rest::security",
                endpoint = %self.name,
                "allow_insecure_http enabled - HTTP traffic will NOT be encrypted"
            );
            transport = transport.transport(TransportSecurity::AllowInsecureHttp);
        }

        let mut builder =
            Endpoint::builder(self.name.as_str(), self.base_url.as_str()).transport(transport.build());
        for (name, value) in &self.default_headers {
            builder = builder.default_header(name.as_str(), value.as_str());
        }
        builder.build()
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestClientConfig {
    /// Registration order decides the default endpoint.
    pub endpoints: Vec<EndpointConfig>,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
}

impl RestClientConfig {
    /// Load defaults, then `path` (if given), then environment overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] if the file does not exist or any
    /// source holds an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::Load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        tracing::debug!(
            endpoints = config.endpoints.len(),
            max_retries = config.retry.max_retries,
            "Loaded REST client configuration"
        );
        Ok(config)
    }

    /// Register every configured endpoint, in order.
    ///
    /// # Errors
    /// Returns [`RestError`] for an invalid endpoint entry, a duplicate name
    /// or an empty endpoint list.
    pub fn build_registry(&self) -> Result<EndpointRegistry, RestError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::EmptyRegistry.into());
        }
        let mut builder = EndpointRegistry::builder();
        for endpoint in &self.endpoints {
            builder = builder.register(endpoint.build()?);
        }
        Ok(builder.build()?)
    }

    /// Client builder carrying the registry, retry and cache settings.
    ///
    /// # Errors
    /// See [`RestClientConfig::build_registry`].
    pub fn client_builder(&self) -> Result<RestClientBuilder, RestError> {
        Ok(RestClient::builder(self.build_registry()?)
            .retry(self.retry)
            .cache_ttl(self.cache.ttl)
            .cache_store(Arc::new(MemoryCacheStore::with_max_entries(
                self.cache.max_entries,
            ))))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r"
endpoints:
  - name: api
    base_url: https://api.example.com/v1/
    default_headers:
      accept: application/json
  - name: files
    base_url: https://files.example.com
    connect_timeout: 3s
retry:
  timeout: 500ms
  max_retries: 3
cache:
  ttl: 30m
  max_entries: 16
";

    const ENV_KEYS: [&str; 3] = [
        "MODKIT_REST__RETRY__MAX_RETRIES",
        "MODKIT_REST__RETRY__TIMEOUT",
        "MODKIT_REST__CACHE__TTL",
    ];

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        temp_env::with_vars_unset(ENV_KEYS, || {
            let config = RestClientConfig::load(None).unwrap();
            assert!(config.endpoints.is_empty());
            assert_eq!(config.retry, RetryConfig::default());
            assert_eq!(config.cache.ttl, DEFAULT_CACHE_TTL);
            assert_eq!(config.cache.max_entries, DEFAULT_MAX_CACHE_ENTRIES);
            assert_eq!(config.queue.max_in_flight, 4);
        });
    }

    #[test]
    fn test_yaml_layer() {
        let file = yaml_file(YAML);
        let config =
            temp_env::with_vars_unset(ENV_KEYS, || RestClientConfig::load(Some(file.path())))
                .unwrap();

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].name, "api");
        assert_eq!(
            config.endpoints[1].connect_timeout,
            Some(Duration::from_secs(3))
        );
        assert_eq!(config.retry.timeout, Duration::from_millis(500));
        assert_eq!(config.retry.max_retries, 3);
        assert!((config.retry.backoff_multiplier - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.cache.ttl, Duration::from_secs(30 * 60));
        assert_eq!(config.cache.max_entries, 16);
    }

    #[test]
    fn test_env_overrides_yaml() {
        let file = yaml_file(YAML);
        temp_env::with_vars(
            [
                ("MODKIT_REST__RETRY__MAX_RETRIES", Some("7")),
                ("MODKIT_REST__RETRY__TIMEOUT", Some("2s")),
            ],
            || {
                let config = RestClientConfig::load(Some(file.path())).unwrap();
                assert_eq!(config.retry.max_retries, 7);
                assert_eq!(config.retry.timeout, Duration::from_secs(2));
                assert_eq!(config.endpoints.len(), 2, "file layer kept");
            },
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = RestClientConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_invalid_duration_is_error() {
        let file = yaml_file("retry:\n  timeout: soon\n");
        let err = RestClientConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_build_registry_preserves_order() {
        let file = yaml_file(YAML);
        let config =
            temp_env::with_vars_unset(ENV_KEYS, || RestClientConfig::load(Some(file.path())))
                .unwrap();
        let registry = config.build_registry().unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["api", "files"]);
        let api = registry.get(None).unwrap();
        assert_eq!(api.base_url(), "https://api.example.com/v1");
        assert_eq!(api.default_headers()["accept"], "application/json");
    }

    #[test]
    fn test_empty_endpoint_list_rejected() {
        let err = RestClientConfig::default().build_registry().unwrap_err();
        assert!(matches!(err, RestError::Config(ConfigError::EmptyRegistry)));
    }

    /// Run `f` under a subscriber that records WARN messages.
    fn captured_warnings(f: impl FnOnce()) -> Vec<String> {
        use parking_lot::Mutex;
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct WarningCapture {
            warnings: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::WARN {
                    let mut visitor = MessageVisitor(String::new());
                    event.record(&mut visitor);
                    self.warnings.lock().push(visitor.0);
                }
            }
        }

        struct MessageVisitor(String);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                }
            }
        }

        let capture = WarningCapture::default();
        let warnings = Arc::clone(&capture.warnings);
        tracing::subscriber::with_default(tracing_subscriber::registry().with(capture), f);
        warnings.lock().clone()
    }

    fn endpoint(allow_insecure_http: bool) -> EndpointConfig {
        EndpointConfig {
            name: "mock".to_owned(),
            base_url: "http://127.0.0.1:8080".to_owned(),
            default_headers: BTreeMap::new(),
            user_agent: Some("tests/1.0".to_owned()),
            connect_timeout: Some(Duration::from_secs(1)),
            allow_insecure_http,
        }
    }

    #[test]
    fn test_insecure_endpoint_warns() {
        let warnings = captured_warnings(|| {
            endpoint(true).build().unwrap();
        });
        assert!(
            warnings.iter().any(|w| w.contains("HTTP traffic")),
            "warning should mention insecure HTTP: {warnings:?}"
        );
    }

    #[test]
    fn test_tls_only_endpoint_does_not_warn() {
        let warnings = captured_warnings(|| {
            endpoint(false).build().unwrap();
        });
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_durations_serialize_in_human_form() {
        let json = serde_json::to_value(RetryConfig::default()).unwrap();
        assert_eq!(json["timeout"], "2s 500ms");
    }
}
