//! Bounded work queue for fire-and-forget calls.
//!
//! Calls run on tokio's blocking pool; a semaphore bounds how many execute at
//! once. Cancellation only affects calls that have not started: an in-flight
//! transport exchange is never preempted, and a cancelled call never reaches
//! its callback's `success` or `failure`.

use crate::client::RestClient;
use crate::converter::FromBody;
use crate::listener::Callback;
use crate::request::RunnableRequest;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct RequestQueue {
    client: RestClient,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    root: Mutex<CancellationToken>,
    tags: DashMap<String, CancellationToken>,
    pending: Arc<AtomicUsize>,
    tracker: TaskTracker,
}

impl RequestQueue {
    /// `max_in_flight` is clamped to at least one.
    #[must_use]
    pub fn new(client: RestClient, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            root: Mutex::new(CancellationToken::new()),
            tags: DashMap::new(),
            pending: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
        }
    }

    #[must_use]
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Queue `request`; `callback.before()` fires immediately.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn enqueue<T, C>(&self, request: RunnableRequest, mut callback: C)
    where
        T: FromBody + 'static,
        C: Callback<T> + 'static,
    {
        callback.before();

        let token = self.token_for(request.tag());
        let permits = Arc::clone(&self.permits);
        let pending = Arc::clone(&self.pending);
        let client = self.client.clone();
        pending.fetch_add(1, Ordering::SeqCst);

        self.tracker.spawn(async move {
            let acquired = tokio::select! {
                biased;
                () = token.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            pending.fetch_sub(1, Ordering::SeqCst);
            let Some(permit) = acquired else {
                tracing::trace!(url = %request.url(), "Queued call cancelled");
                return;
            };

            let url = request.url().to_owned();
            let outcome = tokio::task::spawn_blocking(move || {
                client.deliver(request, callback);
                drop(permit);
            })
            .await;
            if let Err(e) = outcome {
                tracing::warn!(url = %url, error = %e, "Queued call aborted");
            }
        });
    }

    /// Cancel every queued call carrying `tag`.
    pub fn cancel_tag(&self, tag: &str) {
        if let Some((_, token)) = self.tags.remove(tag) {
            tracing::debug!(tag, "Cancelling queued calls");
            token.cancel();
        }
    }

    /// Cancel every queued call. Calls enqueued afterwards run normally.
    pub fn cancel_all(&self) {
        let previous = std::mem::replace(&mut *self.root.lock(), CancellationToken::new());
        self.tags.clear();
        tracing::debug!("Cancelling all queued calls");
        previous.cancel();
    }

    /// Calls currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_in_flight
            .saturating_sub(self.permits.available_permits())
    }

    /// Calls waiting for a slot.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every call enqueued so far has finished or been cancelled.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn token_for(&self, tag: Option<&str>) -> CancellationToken {
        let root = self.root.lock();
        match tag {
            Some(tag) => self
                .tags
                .entry(tag.to_owned())
                .or_insert_with(|| root.child_token())
                .clone(),
            None => root.child_token(),
        }
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("max_in_flight", &self.max_in_flight)
            .field("in_flight", &self.in_flight())
            .field("pending", &self.pending())
            .field("tags", &self.tags.len())
            .finish_non_exhaustive()
    }
}
