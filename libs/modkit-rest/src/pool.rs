//! Byte-buffer pool for response body copies.
//!
//! Buffers are handed out as [`PooledBuffer`] guards and go back to the pool
//! when the guard drops, so every exit path of a body read (success, early
//! `?` return, panic unwinding) returns the buffer.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

/// Default pool capacity in bytes.
pub const DEFAULT_POOL_SIZE: usize = 4096;

/// Size of the scratch buffer used when copying a body stream.
pub const COPY_BUFFER_SIZE: usize = 1024;

/// Pool of reusable byte buffers bounded by total retained capacity.
///
/// Retained buffers are kept in least-recently-returned order; when the pool
/// grows past its limit the oldest buffers are dropped first.
#[derive(Debug)]
pub struct BufferPool {
    size_limit: usize,
    state: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    buffers: VecDeque<Vec<u8>>,
    retained: usize,
}

impl BufferPool {
    #[must_use]
    pub fn new(size_limit: usize) -> Self {
        Self {
            size_limit,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Take a buffer of at least `len` bytes.
    ///
    /// Reuses the smallest retained buffer that is large enough, otherwise
    /// allocates a fresh one.
    #[must_use]
    pub fn acquire(&self, len: usize) -> PooledBuffer<'_> {
        let reused = {
            let mut state = self.state.lock();
            let best = state
                .buffers
                .iter()
                .enumerate()
                .filter(|(_, buf)| buf.len() >= len)
                .min_by_key(|(_, buf)| buf.len())
                .map(|(idx, _)| idx);
            best.and_then(|idx| state.buffers.remove(idx)).inspect(|buf| {
                state.retained -= buf.len();
            })
        };

        PooledBuffer {
            pool: self,
            buf: Some(reused.unwrap_or_else(|| vec![0; len])),
        }
    }

    /// Bytes currently retained by the pool.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.state.lock().retained
    }

    /// Number of buffers currently retained by the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.is_empty() || buf.len() > self.size_limit {
            return;
        }
        let mut state = self.state.lock();
        state.retained += buf.len();
        state.buffers.push_back(buf);
        while state.retained > self.size_limit {
            match state.buffers.pop_front() {
                Some(old) => state.retained -= old.len(),
                None => break,
            }
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

/// Scoped buffer borrowed from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
