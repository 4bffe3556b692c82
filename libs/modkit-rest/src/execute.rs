//! The execution loop.
//!
//! [`NetworkExecutor::perform`] drives one [`RunnableRequest`] to a terminal
//! outcome on the calling thread. Per attempt:
//!
//! 1. conditional headers from the attached cache snapshot
//! 2. the endpoint interceptor
//! 3. one blocking transport exchange with the policy's current timeout
//!
//! Timeouts and successful re-authentications both consume the request's
//! [`RetryPolicy`](crate::RetryPolicy), so a call makes at most
//! `max_retries + 1` attempts whatever the failure mix.

use crate::auth::InterceptError;
use crate::cache::CacheNegotiator;
use crate::endpoint::Endpoint;
use crate::error::{RestError, TransportError, TransportErrorKind};
use crate::network::{NetworkHelper, NetworkResponse};
use crate::request::RunnableRequest;
use crate::transport::TransportRequest;
use http::StatusCode;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Requests slower than this are logged at `warn`.
pub const DEFAULT_SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(3);

enum Attempt {
    Done(NetworkResponse),
    Retry,
}

/// Runs the retry / re-authentication / cache-validation loop.
#[derive(Debug)]
pub struct NetworkExecutor {
    helper: NetworkHelper,
    slow_request_threshold: Duration,
}

impl NetworkExecutor {
    #[must_use]
    pub fn new(helper: NetworkHelper, slow_request_threshold: Duration) -> Self {
        Self {
            helper,
            slow_request_threshold,
        }
    }

    #[must_use]
    pub fn helper(&self) -> &NetworkHelper {
        &self.helper
    }

    /// Execute `request` until it succeeds or fails terminally.
    ///
    /// A `304 Not Modified` is a success carrying the attached snapshot's
    /// payload (empty without a snapshot); its body is never read.
    ///
    /// # Errors
    /// - [`RestError::Timeout`] once timeouts exhausted the retry budget
    /// - [`RestError::Auth`] when 401/403 or an interceptor auth signal could
    ///   not be fixed by the endpoint's auth strategy
    /// - [`RestError::Server`] for any other non-2xx status
    /// - [`RestError::NoConnection`], [`RestError::Network`],
    ///   [`RestError::MalformedUrl`] and [`RestError::Interceptor`] as classified
    pub fn perform(&self, request: &mut RunnableRequest) -> Result<NetworkResponse, RestError> {
        let endpoint = Arc::clone(&request.endpoint);
        loop {
            if let Attempt::Done(response) = self.attempt(&endpoint, request)? {
                return Ok(response);
            }
        }
    }

    fn attempt(
        &self,
        endpoint: &Endpoint,
        request: &mut RunnableRequest,
    ) -> Result<Attempt, RestError> {
        let conditional = CacheNegotiator::conditional_headers(request.cache_entry.as_ref());
        for (name, value) in &conditional {
            request.headers.insert(name.clone(), value.clone());
        }

        if let Some(attempt) = self.run_interceptor(endpoint, request)? {
            return Ok(attempt);
        }

        let headers = request.wire_headers();
        let body = request.body();
        let timeout = request.retry_policy.current_timeout();
        tracing::trace!(
            method = %request.method,
            url = %request.url,
            attempt = request.retry_policy.attempt(),
            timeout_ms = millis(timeout),
            "Dispatching request"
        );

        let started = Instant::now();
        let result = endpoint.transport().perform(&TransportRequest {
            method: &request.method,
            url: &request.url,
            headers: &headers,
            body: body.as_deref(),
            timeout,
        });

        let mut response = match result {
            Ok(response) => response,
            Err(e) if e.kind().is_timeout() => {
                Self::retry_after_timeout(request, e)?;
                return Ok(Attempt::Retry);
            }
            Err(e) if e.kind() == TransportErrorKind::MalformedUrl => {
                return Err(RestError::MalformedUrl {
                    url: request.url.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "No connection");
                return Err(RestError::NoConnection(e));
            }
        };

        if response.status == StatusCode::NOT_MODIFIED {
            tracing::trace!(url = %request.url, "Not modified, reusing cached payload");
            return Ok(Attempt::Done(NetworkResponse::not_modified(
                request.cache_entry.as_ref(),
                response.headers,
                started.elapsed(),
            )));
        }

        let data = match self.helper.read_body(&mut response) {
            Ok(data) => data,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                let err = TransportError::new(TransportErrorKind::SocketTimeout, e);
                Self::retry_after_timeout(request, err)?;
                return Ok(Attempt::Retry);
            }
            Err(e) => return Err(RestError::Network(Box::new(e))),
        };
        let elapsed = started.elapsed();
        self.log_slow_request(request, response.status, data.len(), elapsed);

        let mut network = NetworkResponse::new(response.status, data, response.headers);
        network.network_time = elapsed;

        if network.status.is_success() {
            return Ok(Attempt::Done(network));
        }
        if matches!(
            network.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            let original = RestError::Auth {
                reason: format!("HTTP {}", network.status),
                response: Some(Box::new(network)),
            };
            self.reauthenticate(endpoint, request, original)?;
            return Ok(Attempt::Retry);
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = network.status.as_u16(),
            "Server returned error status"
        );
        Err(RestError::Server {
            response: Box::new(network),
        })
    }

    /// `Some(Attempt::Retry)` when the interceptor raised an auth signal that
    /// re-authentication fixed.
    fn run_interceptor(
        &self,
        endpoint: &Endpoint,
        request: &mut RunnableRequest,
    ) -> Result<Option<Attempt>, RestError> {
        let Some(interceptor) = endpoint.interceptor() else {
            return Ok(None);
        };
        match interceptor.intercept(request) {
            Ok(()) => Ok(None),
            Err(InterceptError::AuthFailure(reason)) => {
                let original = RestError::Auth {
                    reason,
                    response: None,
                };
                self.reauthenticate(endpoint, request, original)?;
                Ok(Some(Attempt::Retry))
            }
            Err(InterceptError::Other(e)) => Err(RestError::Interceptor(e)),
        }
    }

    /// Consume one retry after a timeout, or fail with [`RestError::Timeout`].
    fn retry_after_timeout(
        request: &mut RunnableRequest,
        error: TransportError,
    ) -> Result<(), RestError> {
        let attempts = request.retry_policy.attempt();
        let timeout = request.retry_policy.current_timeout();
        if request.retry_policy.retry() {
            tracing::debug!(
                url = %request.url,
                attempt = attempts,
                timeout_ms = millis(timeout),
                next_timeout_ms = millis(request.retry_policy.current_timeout()),
                error = %error,
                "Request timed out, retrying"
            );
            Ok(())
        } else {
            tracing::debug!(
                url = %request.url,
                attempts,
                timeout_ms = millis(timeout),
                "Request timed out, retry budget exhausted"
            );
            Err(RestError::Timeout {
                attempts,
                timeout,
                source: error,
            })
        }
    }

    /// Run the auth strategy; on success consume one retry.
    ///
    /// Returns `original` when there is no strategy, the strategy fails, or
    /// the retry budget is spent.
    fn reauthenticate(
        &self,
        endpoint: &Endpoint,
        request: &mut RunnableRequest,
        original: RestError,
    ) -> Result<(), RestError> {
        let Some(strategy) = endpoint.auth_strategy() else {
            tracing::debug!(endpoint = %endpoint.name(), "Authorization failed, no auth strategy");
            return Err(original);
        };

        tracing::debug!(
            endpoint = %endpoint.name(),
            attempt = request.retry_policy.attempt(),
            "Authorization failed, re-authenticating"
        );
        if !strategy.reauthenticate(endpoint.transport(), endpoint.converter(), &self.helper) {
            tracing::debug!(endpoint = %endpoint.name(), "Re-authentication unsuccessful");
            return Err(original);
        }
        if !request.retry_policy.retry() {
            tracing::debug!(
                endpoint = %endpoint.name(),
                attempts = request.retry_policy.current_retry_count(),
                "Re-authenticated but retry budget exhausted"
            );
            return Err(original);
        }
        Ok(())
    }

    fn log_slow_request(
        &self,
        request: &RunnableRequest,
        status: StatusCode,
        body_len: usize,
        elapsed: Duration,
    ) {
        if elapsed > self.slow_request_threshold {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                status = status.as_u16(),
                elapsed_ms = millis(elapsed),
                body_len,
                retries = request.retry_policy.current_retry_count(),
                "Slow request"
            );
        }
    }
}

impl Default for NetworkExecutor {
    fn default() -> Self {
        Self::new(NetworkHelper::default(), DEFAULT_SLOW_REQUEST_THRESHOLD)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::cache::CacheSnapshot;
    use crate::converter::Converter;
    use crate::error::ErrorKind;
    use crate::retry::RetryPolicy;
    use crate::transport::{Transport, TransportResponse};
    use bytes::Bytes;
    use http::header::{ETAG, IF_NONE_MATCH};
    use http::{HeaderMap, HeaderValue, Method};
    use parking_lot::Mutex;
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

    type Reply = Box<dyn Fn(u32) -> Result<TransportResponse, TransportError> + Send + Sync>;

    /// Answers attempt `n` (1-based) with `reply(n)` and records what it saw.
    struct Scripted {
        calls: AtomicU32,
        timeouts: Mutex<Vec<Duration>>,
        headers: Mutex<Vec<HeaderMap>>,
        reply: Reply,
    }

    impl Scripted {
        fn new(
            reply: impl Fn(u32) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                timeouts: Mutex::new(Vec::new()),
                headers: Mutex::new(Vec::new()),
                reply: Box::new(reply),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for Scripted {
        fn perform(
            &self,
            request: &TransportRequest<'_>,
        ) -> Result<TransportResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.timeouts.lock().push(request.timeout);
            self.headers.lock().push(request.headers.clone());
            (self.reply)(n)
        }
    }

    /// Counts read calls; yields nothing.
    struct CountingReader(Arc<AtomicUsize>);

    impl Read for CountingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    struct StalledReader;

    impl Read for StalledReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
        }
    }

    fn timeout_error() -> TransportError {
        TransportError::new(TransportErrorKind::SocketTimeout, "timed out")
    }

    fn request_for(endpoint: Endpoint, max_retries: u32) -> RunnableRequest {
        RunnableRequest {
            method: Method::GET,
            url: "https://api.example.com/items".to_owned(),
            headers: HeaderMap::new(),
            form: Vec::new(),
            raw_body: None,
            should_cache: true,
            cache_ttl: None,
            retry_policy: RetryPolicy::new(Duration::from_millis(100), max_retries, 1.0),
            endpoint: Arc::new(endpoint),
            cache_entry: None,
            tag: None,
        }
    }

    fn endpoint(transport: &Arc<Scripted>) -> crate::endpoint::EndpointBuilder {
        let shared: Arc<dyn Transport> = transport.clone();
        Endpoint::builder("api", "https://api.example.com").shared_transport(shared)
    }

    fn counting_strategy(
        count: &Arc<AtomicU32>,
        outcome: bool,
    ) -> impl Fn(&dyn Transport, &dyn Converter, &NetworkHelper) -> bool + Send + Sync + 'static {
        let count = Arc::clone(count);
        move |_t: &dyn Transport, _c: &dyn Converter, _h: &NetworkHelper| {
            count.fetch_add(1, Ordering::SeqCst);
            outcome
        }
    }

    #[test]
    fn test_timeouts_exhaust_after_n_plus_one_attempts() {
        let transport = Scripted::new(|_| Err(timeout_error()));
        let mut request = request_for(endpoint(&transport).build().unwrap(), 3);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 4);
        match err {
            RestError::Timeout {
                attempts, timeout, ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(timeout, Duration::from_millis(800));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(
            *transport.timeouts.lock(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn test_timeout_then_success() {
        let transport = Scripted::new(|n| {
            if n == 1 {
                Err(timeout_error())
            } else {
                Ok(TransportResponse::new(StatusCode::OK).with_body("done"))
            }
        });
        let mut request = request_for(endpoint(&transport).build().unwrap(), 1);

        let response = NetworkExecutor::default().perform(&mut request).unwrap();

        assert_eq!(response.data.as_ref(), b"done");
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let transport = Scripted::new(|_| Err(timeout_error()));
        let mut request = request_for(endpoint(&transport).build().unwrap(), 0);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_auth_retries_share_budget() {
        let transport = Scripted::new(|_| {
            Ok(TransportResponse::new(StatusCode::UNAUTHORIZED).with_body("expired"))
        });
        let reauths = Arc::new(AtomicU32::new(0));
        let ep = endpoint(&transport)
            .auth_strategy(counting_strategy(&reauths, true))
            .build()
            .unwrap();
        let mut request = request_for(ep, 2);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 3);
        assert_eq!(reauths.load(Ordering::SeqCst), 3);
        match err {
            RestError::Auth {
                response: Some(response),
                ..
            } => {
                assert_eq!(response.status, StatusCode::UNAUTHORIZED);
                assert_eq!(response.data.as_ref(), b"expired");
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_timeouts_and_auth_share_budget() {
        let transport = Scripted::new(|n| {
            if n % 2 == 1 {
                Err(timeout_error())
            } else {
                Ok(TransportResponse::new(StatusCode::FORBIDDEN))
            }
        });
        let reauths = Arc::new(AtomicU32::new(0));
        let ep = endpoint(&transport)
            .auth_strategy(counting_strategy(&reauths, true))
            .build()
            .unwrap();
        let mut request = request_for(ep, 3);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 4);
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_successful_reauth_retries_with_fresh_credentials() {
        let transport = Scripted::new(|n| {
            if n == 1 {
                Ok(TransportResponse::new(StatusCode::UNAUTHORIZED))
            } else {
                Ok(TransportResponse::new(StatusCode::OK).with_body("ok"))
            }
        });
        let reauths = Arc::new(AtomicU32::new(0));
        let ep = endpoint(&transport)
            .auth_strategy(counting_strategy(&reauths, true))
            .build()
            .unwrap();
        let mut request = request_for(ep, 1);

        let response = NetworkExecutor::default().perform(&mut request).unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(reauths.load(Ordering::SeqCst), 1);
        assert_eq!(request.retry_policy().current_retry_count(), 1);
    }

    #[test]
    fn test_auth_without_strategy_is_terminal() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::FORBIDDEN)));
        let mut request = request_for(endpoint(&transport).build().unwrap(), 5);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(err.response().unwrap().status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_failed_reauth_is_terminal() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::UNAUTHORIZED)));
        let reauths = Arc::new(AtomicU32::new(0));
        let ep = endpoint(&transport)
            .auth_strategy(counting_strategy(&reauths, false))
            .build()
            .unwrap();
        let mut request = request_for(ep, 5);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(reauths.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_not_modified_serves_snapshot_without_reading_body() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader_reads = Arc::clone(&reads);
        let transport = Scripted::new(move |_| {
            Ok(TransportResponse::new(StatusCode::NOT_MODIFIED)
                .with_reader(Box::new(CountingReader(Arc::clone(&reader_reads)))))
        });
        let mut request = request_for(endpoint(&transport).build().unwrap(), 1);
        let mut cached_headers = HeaderMap::new();
        cached_headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        request.set_cache_entry(Some(CacheSnapshot {
            data: Bytes::from_static(b"cached payload"),
            etag: Some("\"abc\"".to_owned()),
            response_headers: cached_headers,
            ..CacheSnapshot::default()
        }));

        let response = NetworkExecutor::default().perform(&mut request).unwrap();

        assert!(response.not_modified);
        assert!(response.is_success());
        assert_eq!(response.data.as_ref(), b"cached payload");
        assert_eq!(reads.load(Ordering::SeqCst), 0, "no body bytes read");
        assert_eq!(transport.headers.lock()[0][IF_NONE_MATCH], "\"abc\"");
    }

    #[test]
    fn test_not_modified_without_snapshot_is_empty() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::NOT_MODIFIED)));
        let mut request = request_for(endpoint(&transport).build().unwrap(), 1);

        let response = NetworkExecutor::default().perform(&mut request).unwrap();

        assert!(response.not_modified);
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_server_error_not_retried() {
        let transport = Scripted::new(|_| {
            Ok(TransportResponse::new(StatusCode::SERVICE_UNAVAILABLE).with_body("busy"))
        });
        let mut request = request_for(endpoint(&transport).build().unwrap(), 3);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.response().unwrap().data.as_ref(), b"busy");
    }

    #[test]
    fn test_connect_failure_not_retried() {
        let transport = Scripted::new(|_| {
            Err(TransportError::new(TransportErrorKind::Connect, "refused"))
        });
        let mut request = request_for(endpoint(&transport).build().unwrap(), 3);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, RestError::NoConnection(_)));
    }

    #[test]
    fn test_malformed_url_is_programming_error() {
        let transport = Scripted::new(|_| {
            Err(TransportError::new(TransportErrorKind::MalformedUrl, "missing scheme"))
        });
        let mut request = request_for(endpoint(&transport).build().unwrap(), 3);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(err.kind(), ErrorKind::Programming);
    }

    #[test]
    fn test_stalled_body_read_is_retried_as_timeout() {
        let transport = Scripted::new(|_| {
            Ok(TransportResponse::new(StatusCode::OK).with_reader(Box::new(StalledReader)))
        });
        let mut request = request_for(endpoint(&transport).build().unwrap(), 2);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 3);
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_interceptor_auth_signal_without_strategy_is_terminal() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::OK)));
        let ep = endpoint(&transport)
            .interceptor(|_req: &mut RunnableRequest| -> Result<(), InterceptError> {
                Err(InterceptError::AuthFailure("no token".to_owned()))
            })
            .build()
            .unwrap();
        let mut request = request_for(ep, 2);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 0);
        assert!(matches!(err, RestError::Auth { response: None, .. }));
    }

    #[test]
    fn test_interceptor_auth_signal_routes_to_strategy() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::OK)));
        let has_token = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&has_token);
        let reauths = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&reauths);
        let ep = endpoint(&transport)
            .interceptor(
                move |_req: &mut RunnableRequest| -> Result<(), InterceptError> {
                    if seen.load(Ordering::SeqCst) {
                        Ok(())
                    } else {
                        Err(InterceptError::AuthFailure("no token".to_owned()))
                    }
                },
            )
            .auth_strategy(
                move |_t: &dyn Transport, _c: &dyn Converter, _h: &NetworkHelper| {
                    count.fetch_add(1, Ordering::SeqCst);
                    has_token.store(true, Ordering::SeqCst);
                    true
                },
            )
            .build()
            .unwrap();
        let mut request = request_for(ep, 2);

        let response = NetworkExecutor::default().perform(&mut request).unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(reauths.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls(), 1);
        assert_eq!(request.retry_policy().current_retry_count(), 1);
    }

    #[test]
    fn test_interceptor_other_failure_is_terminal() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::OK)));
        let ep = endpoint(&transport)
            .interceptor(|_req: &mut RunnableRequest| -> Result<(), InterceptError> {
                Err(InterceptError::Other("signing key unavailable".into()))
            })
            .build()
            .unwrap();
        let mut request = request_for(ep, 2);

        let err = NetworkExecutor::default().perform(&mut request).unwrap_err();

        assert_eq!(transport.calls(), 0);
        assert!(matches!(err, RestError::Interceptor(_)));
    }

    #[test]
    fn test_interceptor_headers_reach_transport() {
        let transport = Scripted::new(|_| Ok(TransportResponse::new(StatusCode::NO_CONTENT)));
        let ep = endpoint(&transport)
            .interceptor(|req: &mut RunnableRequest| -> Result<(), InterceptError> {
                req.headers_mut()
                    .insert("x-signature", HeaderValue::from_static("sig"));
                Ok(())
            })
            .build()
            .unwrap();
        let mut request = request_for(ep, 0);

        NetworkExecutor::default().perform(&mut request).unwrap();

        assert_eq!(transport.headers.lock()[0]["x-signature"], "sig");
    }
}
