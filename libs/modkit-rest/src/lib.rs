#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Declarative REST call execution for `ModKit`
//!
//! Calls are declared once as [`CallDescriptor`]s and executed against named
//! [`Endpoint`]s held by an [`EndpointRegistry`]. Each execution goes through
//! the same pipeline:
//! - URL resolution (templated path, dynamic URL or hypermedia link)
//! - Query or form encoding of parameters depending on the method
//! - Conditional revalidation against the response cache (`ETag`, `Last-Modified`)
//! - Per-attempt timeouts with linear backoff and re-authentication on 401/403
//! - Body decoding through the endpoint's [`Converter`]
//!
//! Execution is blocking. [`RequestQueue`] runs calls on tokio's blocking pool
//! with a bounded number in flight and tag-based cancellation.
//!
//! # Example
//!
//! ```ignore
//! use modkit_rest::{CallDescriptor, RestClientConfig};
//! use http::Method;
//!
//! let config = RestClientConfig::load(Some("rest.yaml".as_ref()))?;
//! let client = config.client_builder()?.build();
//!
//! let search = CallDescriptor::templated("search", Method::GET, "/search")?;
//! let body: String = client
//!     .call(&search)
//!     .param("q", "a b")
//!     .execute()?
//!     .payload;
//! ```

mod auth;
mod cache;
mod client;
mod config;
mod converter;
mod descriptor;
mod endpoint;
mod error;
mod execute;
mod link;
mod listener;
mod network;
mod pool;
mod queue;
mod registry;
mod request;
mod resolver;
mod retry;
mod transport;

pub use auth::{
    AuthStrategy, BearerTokenInterceptor, DEFAULT_TOKEN_TIMEOUT, InterceptError,
    RequestInterceptor, TokenEndpointStrategy, TokenStore,
};
pub use cache::{
    CacheNegotiator, CacheSnapshot, CacheStore, DEFAULT_CACHE_TTL, DEFAULT_MAX_CACHE_ENTRIES,
    FALLBACK_CACHE_TTL, MemoryCacheStore, NoCache, cache_key,
};
pub use client::{CallResponse, RestClient, RestClientBuilder};
pub use config::{
    CacheConfig, ENV_PREFIX, EndpointConfig, QueueConfig, RestClientConfig, RetryConfig,
};
pub use converter::{Converter, FromBody, JSON_CONTENT_TYPE, Json, JsonConverter, encode};
pub use descriptor::{
    CallCatalog, CallCatalogBuilder, CallDescriptor, CallEntry, CallShape, PARAM_NAME_PATTERN,
    parse_placeholders, substitute_placeholders, validate_param_name,
};
pub use endpoint::{Endpoint, EndpointBuilder};
pub use error::{
    BoxError, ConfigError, ConversionError, ErrorKind, RestError, TransportError,
    TransportErrorKind,
};
pub use execute::{DEFAULT_SLOW_REQUEST_THRESHOLD, NetworkExecutor};
pub use link::{HypermediaLink, Link};
pub use listener::{Callback, FnCallback, callback_fn};
pub use network::{DEFAULT_MAX_BODY_SIZE, NetworkHelper, NetworkResponse};
pub use pool::{BufferPool, COPY_BUFFER_SIZE, DEFAULT_POOL_SIZE, PooledBuffer};
pub use queue::RequestQueue;
pub use registry::{EndpointRegistry, EndpointRegistryBuilder};
pub use request::{
    FORM_CONTENT_TYPE, RunnableRequest, append_query, encode_params, is_read_method,
};
pub use resolver::{CallBuilder, RequestInfo};
pub use retry::{RetryOverrides, RetryPolicy};
pub use transport::{
    BodyReader, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT, Transport,
    TransportRequest, TransportResponse, TransportSecurity, UreqTransport, UreqTransportBuilder,
};
