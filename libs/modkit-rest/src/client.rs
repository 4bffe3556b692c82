use crate::cache::{CacheNegotiator, CacheStore, MemoryCacheStore};
use crate::config::RetryConfig;
use crate::converter::FromBody;
use crate::descriptor::CallDescriptor;
use crate::error::RestError;
use crate::execute::{DEFAULT_SLOW_REQUEST_THRESHOLD, NetworkExecutor};
use crate::link::HypermediaLink;
use crate::listener::Callback;
use crate::network::{DEFAULT_MAX_BODY_SIZE, NetworkHelper, NetworkResponse};
use crate::pool::{BufferPool, DEFAULT_POOL_SIZE};
use crate::registry::EndpointRegistry;
use crate::request::RunnableRequest;
use crate::resolver::{CallBuilder, RequestInfo};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Decoded payload together with the response it came from.
#[derive(Debug, Clone)]
pub struct CallResponse<T> {
    pub payload: T,
    pub response: NetworkResponse,
}

/// Entry point for declared calls.
///
/// Owns the endpoint registry, the cache store and the execution loop.
/// Cloning is cheap and every clone shares the same state.
///
/// # Example
///
/// ```no_run
/// use modkit_rest::{CallDescriptor, Endpoint, EndpointRegistry, Json, RestClient};
/// use http::Method;
///
/// #[derive(serde::Deserialize)]
/// struct User { id: u64, name: String }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = EndpointRegistry::builder()
///     .register(Endpoint::builder("api", "https://api.example.com").build()?)
///     .build()?;
/// let client = RestClient::builder(registry).build();
///
/// let get_user = CallDescriptor::templated("get_user", Method::GET, "/users/{id}")?
///     .returning::<Json<User>>();
/// let user = client.call(&get_user).path_param("id", "42").execute()?.payload.into_inner();
/// # let _ = user;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    registry: EndpointRegistry,
    retry: RetryConfig,
    negotiator: CacheNegotiator,
    cache: Arc<dyn CacheStore>,
    executor: NetworkExecutor,
}

impl RestClient {
    #[must_use]
    pub fn builder(registry: EndpointRegistry) -> RestClientBuilder {
        RestClientBuilder::new(registry)
    }

    #[must_use]
    pub fn registry(&self) -> &EndpointRegistry {
        &self.inner.registry
    }

    /// Retry settings applied when neither descriptor nor caller override them.
    #[must_use]
    pub fn retry_defaults(&self) -> RetryConfig {
        self.inner.retry
    }

    #[must_use]
    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        &self.inner.cache
    }

    #[must_use]
    pub fn cache_negotiator(&self) -> CacheNegotiator {
        self.inner.negotiator
    }

    /// Start a templated call.
    pub fn call<'a, T>(&'a self, descriptor: &'a CallDescriptor<T>) -> CallBuilder<'a, T> {
        CallBuilder::new(self, descriptor, RequestInfo::templated(descriptor))
    }

    /// Start a call against a caller-supplied URL.
    pub fn call_dynamic<'a, T>(
        &'a self,
        descriptor: &'a CallDescriptor<T>,
        url: impl Into<String>,
    ) -> CallBuilder<'a, T> {
        CallBuilder::new(self, descriptor, RequestInfo::dynamic(descriptor, url.into()))
    }

    /// Start a call that follows a hypermedia link.
    pub fn call_link<'a, T>(
        &'a self,
        descriptor: &'a CallDescriptor<T>,
        link: &dyn HypermediaLink,
    ) -> CallBuilder<'a, T> {
        CallBuilder::new(self, descriptor, RequestInfo::link(descriptor, link))
    }

    /// Execute a resolved request on the calling thread.
    ///
    /// Cacheable requests are answered from a fresh snapshot when one exists;
    /// an expired snapshot is revalidated with conditional headers.
    ///
    /// # Errors
    /// Returns the terminal error of the execution loop, or
    /// [`RestError::Parse`] if the body cannot be decoded as `T`.
    pub fn execute<T: FromBody>(
        &self,
        mut request: RunnableRequest,
    ) -> Result<CallResponse<T>, RestError> {
        let response = self.fetch(&mut request)?;
        let payload =
            T::from_body(&response.data, request.endpoint.converter()).map_err(RestError::Parse)?;
        Ok(CallResponse { payload, response })
    }

    /// Execute and deliver the outcome to `callback` exactly once.
    pub fn execute_with<T: FromBody, C: Callback<T>>(
        &self,
        request: RunnableRequest,
        mut callback: C,
    ) {
        callback.before();
        self.deliver(request, callback);
    }

    /// Execute and deliver without the `before` event.
    pub(crate) fn deliver<T: FromBody, C: Callback<T>>(&self, request: RunnableRequest, callback: C) {
        match self.execute(request) {
            Ok(CallResponse { payload, response }) => callback.success(payload, response),
            Err(e) => {
                tracing::debug!(error = %e, kind = ?e.kind(), "Call failed");
                callback.failure(e);
            }
        }
    }

    fn fetch(&self, request: &mut RunnableRequest) -> Result<NetworkResponse, RestError> {
        let cache = &self.inner.cache;
        let key = request.cache_key();
        if request.should_cache
            && request.cache_entry.is_none()
            && let Some(entry) = cache.get(&key)
        {
            if !entry.is_expired(SystemTime::now()) {
                tracing::trace!(url = %request.url, "Cache hit");
                return Ok(NetworkResponse::from_snapshot(&entry));
            }
            tracing::trace!(url = %request.url, "Cache entry expired, revalidating");
            request.cache_entry = Some(entry);
        }

        let response = self.inner.executor.perform(request)?;

        let storable = if response.not_modified {
            request.cache_entry.is_some()
        } else {
            response.status.is_success()
        };
        if request.should_cache && storable {
            let negotiator = request
                .cache_ttl
                .map_or(self.inner.negotiator, CacheNegotiator::new);
            cache.put(
                &key,
                negotiator.snapshot_from(&response, SystemTime::now()),
            );
        }
        Ok(response)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("registry", &self.inner.registry)
            .field("retry", &self.inner.retry)
            .field("negotiator", &self.inner.negotiator)
            .field("executor", &self.inner.executor)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RestClient`].
#[must_use = "RestClientBuilder does nothing until .build() is called"]
pub struct RestClientBuilder {
    registry: EndpointRegistry,
    retry: RetryConfig,
    cache_ttl: Duration,
    cache_store: Option<Arc<dyn CacheStore>>,
    max_body_size: usize,
    pool_size: usize,
    slow_request_threshold: Duration,
}

impl RestClientBuilder {
    fn new(registry: EndpointRegistry) -> Self {
        Self {
            registry,
            retry: RetryConfig::default(),
            cache_ttl: CacheNegotiator::default().ttl(),
            cache_store: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            slow_request_threshold: DEFAULT_SLOW_REQUEST_THRESHOLD,
        }
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Default cache window; zero falls back to one hour.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Replace the in-memory store (e.g. with a disk-backed one or [`NoCache`](crate::NoCache)).
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Upper bound in bytes of scratch buffers retained for reuse.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn slow_request_threshold(mut self, threshold: Duration) -> Self {
        self.slow_request_threshold = threshold;
        self
    }

    #[must_use]
    pub fn build(self) -> RestClient {
        let helper = NetworkHelper::new(BufferPool::new(self.pool_size), self.max_body_size);
        RestClient {
            inner: Arc::new(ClientInner {
                registry: self.registry,
                retry: self.retry,
                negotiator: CacheNegotiator::new(self.cache_ttl),
                cache: self
                    .cache_store
                    .unwrap_or_else(|| Arc::new(MemoryCacheStore::new())),
                executor: NetworkExecutor::new(helper, self.slow_request_threshold),
            }),
        }
    }
}
