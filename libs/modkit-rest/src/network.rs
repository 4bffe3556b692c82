//! Response values and body reading.

use crate::cache::CacheSnapshot;
use crate::pool::{BufferPool, COPY_BUFFER_SIZE};
use crate::transport::TransportResponse;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::io::{self, Read};
use std::time::Duration;

/// Default maximum response body size (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Fully read response of one logical call.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub status: StatusCode,
    pub data: Bytes,
    pub headers: HeaderMap,
    /// Server answered `304 Not Modified`; `data` holds the cached payload.
    pub not_modified: bool,
    /// Delivered from the cache store without dispatching.
    pub from_cache: bool,
    /// Wall time spent on the network for the final attempt.
    pub network_time: Duration,
}

impl NetworkResponse {
    #[must_use]
    pub fn new(status: StatusCode, data: Bytes, headers: HeaderMap) -> Self {
        Self {
            status,
            data,
            headers,
            not_modified: false,
            from_cache: false,
            network_time: Duration::ZERO,
        }
    }

    /// `304` answer resolved against an optional prior snapshot.
    ///
    /// Without a snapshot the payload is empty. Response headers from the
    /// server are layered over the cached ones.
    #[must_use]
    pub(crate) fn not_modified(
        snapshot: Option<&CacheSnapshot>,
        headers: HeaderMap,
        network_time: Duration,
    ) -> Self {
        let (data, mut merged) = match snapshot {
            Some(entry) => (entry.data.clone(), entry.response_headers.clone()),
            None => (Bytes::new(), HeaderMap::new()),
        };
        for (name, value) in &headers {
            merged.insert(name.clone(), value.clone());
        }
        Self {
            status: StatusCode::NOT_MODIFIED,
            data,
            headers: merged,
            not_modified: true,
            from_cache: false,
            network_time,
        }
    }

    /// Response served from a fresh snapshot without touching the network.
    #[must_use]
    pub(crate) fn from_snapshot(snapshot: &CacheSnapshot) -> Self {
        Self {
            status: StatusCode::OK,
            data: snapshot.data.clone(),
            headers: snapshot.response_headers.clone(),
            not_modified: false,
            from_cache: true,
            network_time: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success() || self.not_modified
    }
}

/// Shared body-reading helper.
///
/// Copies response streams through pooled scratch buffers and enforces a
/// body size limit. Also handed to [`AuthStrategy`](crate::AuthStrategy)
/// implementations so their token exchanges read bodies the same way.
#[derive(Debug)]
pub struct NetworkHelper {
    pool: BufferPool,
    max_body_size: usize,
}

impl NetworkHelper {
    #[must_use]
    pub fn new(pool: BufferPool, max_body_size: usize) -> Self {
        Self {
            pool,
            max_body_size,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Read the whole body of `response`. A missing body reads as empty.
    ///
    /// # Errors
    /// Returns an I/O error if the stream breaks or exceeds the size limit.
    pub fn read_body(&self, response: &mut TransportResponse) -> io::Result<Bytes> {
        let Some(reader) = response.body.as_mut() else {
            return Ok(Bytes::new());
        };

        let capacity = response
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0)
            .min(self.max_body_size);
        let mut out = Vec::with_capacity(capacity);
        let mut scratch = self.pool.acquire(COPY_BUFFER_SIZE);

        loop {
            let n = match reader.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if out.len() + n > self.max_body_size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("response body exceeds limit of {} bytes", self.max_body_size),
                ));
            }
            out.extend_from_slice(&scratch[..n]);
        }

        Ok(Bytes::from(out))
    }
}

impl Default for NetworkHelper {
    fn default() -> Self {
        Self::new(BufferPool::default(), DEFAULT_MAX_BODY_SIZE)
    }
}
