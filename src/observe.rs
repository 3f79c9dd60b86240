use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::response::Response;
use crate::wire::WireRequest;

/// Side-effect-only hooks invoked around every attempt.
///
/// Hooks cannot change an outcome. A panicking hook is caught and ignored.
pub trait RequestLogger: Send + Sync {
    fn on_request(&self, _request: &WireRequest, _attempt: usize) {}

    fn on_response(&self, _request: &WireRequest, _response: &Response, _elapsed: Duration) {}

    fn on_error(&self, _error: &Error, _request: Option<&WireRequest>, _elapsed: Option<Duration>) {
    }

    fn on_retry(&self, _request: &WireRequest, _error: &Error, _attempt: usize, _delay: Duration) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl RequestLogger for NoopLogger {}

/// Forwards the hooks to `tracing` events under the `reqkit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn on_request(&self, request: &WireRequest, attempt: usize) {
        debug!(
            target: "reqkit",
            method = %request.method(),
            uri = %request.redacted_uri(),
            attempt,
            body_bytes = request.body().map_or(0, |body| body.len()),
            "request"
        );
    }

    fn on_response(&self, request: &WireRequest, response: &Response, elapsed: Duration) {
        info!(
            target: "reqkit",
            method = %request.method(),
            uri = %request.redacted_uri(),
            status = response.status().as_u16(),
            body_bytes = response.body().len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "response"
        );
    }

    fn on_error(&self, error: &Error, request: Option<&WireRequest>, elapsed: Option<Duration>) {
        let uri = request.map(WireRequest::redacted_uri).unwrap_or_default();
        warn!(
            target: "reqkit",
            code = error.code().as_str(),
            uri = %uri,
            elapsed_ms = elapsed.map(|elapsed| elapsed.as_millis() as u64),
            error = %error,
            "request failed"
        );
    }

    fn on_retry(&self, request: &WireRequest, error: &Error, attempt: usize, delay: Duration) {
        info!(
            target: "reqkit",
            method = %request.method(),
            uri = %request.redacted_uri(),
            code = error.code().as_str(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retry scheduled"
        );
    }
}

pub(crate) fn notify(hook: impl FnOnce()) {
    let _ = catch_unwind(AssertUnwindSafe(hook));
}
