//! Result delivery.
//!
//! `success` and `failure` take `self` by value, so a callback can observe at
//! most one terminal event.

use crate::client::CallResponse;
use crate::error::RestError;
use crate::network::NetworkResponse;
use tokio::sync::oneshot;

/// Receives the outcome of one logical call.
pub trait Callback<T>: Send {
    /// Called once before the call is dispatched.
    fn before(&mut self) {}

    fn success(self, payload: T, response: NetworkResponse);

    fn failure(self, error: RestError);
}

/// Callback assembled from two closures.
pub struct FnCallback<S, F> {
    on_success: S,
    on_failure: F,
}

/// Build a [`Callback`] from a success and a failure closure.
#[must_use]
pub fn callback_fn<T, S, F>(on_success: S, on_failure: F) -> FnCallback<S, F>
where
    S: FnOnce(T, NetworkResponse) + Send,
    F: FnOnce(RestError) + Send,
{
    FnCallback {
        on_success,
        on_failure,
    }
}

impl<T, S, F> Callback<T> for FnCallback<S, F>
where
    S: FnOnce(T, NetworkResponse) + Send,
    F: FnOnce(RestError) + Send,
{
    fn success(self, payload: T, response: NetworkResponse) {
        (self.on_success)(payload, response);
    }

    fn failure(self, error: RestError) {
        (self.on_failure)(error);
    }
}

/// Forward the outcome to an awaiting task. A dropped receiver is ignored.
impl<T: Send> Callback<T> for oneshot::Sender<Result<CallResponse<T>, RestError>> {
    fn success(self, payload: T, response: NetworkResponse) {
        if self.send(Ok(CallResponse { payload, response })).is_err() {
            tracing::trace!("Call result receiver dropped");
        }
    }

    fn failure(self, error: RestError) {
        if self.send(Err(error)).is_err() {
            tracing::trace!("Call result receiver dropped");
        }
    }
}
