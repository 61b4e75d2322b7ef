//! Runtime support invoked by generated wrappers.
//!
//! Every emitted code path funnels its completion through
//! [`record_completion`] and [`record_panic`]; the fast and slow paths of an
//! optimized-future wrapper therefore record identical status, tags and
//! values for the same underlying outcome. Panics are re-raised unmodified
//! after telemetry is recorded.

use crate::telemetry::{self, SpanHandle, SpanStatus};
use futures::task::noop_waker_ref;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Classification outcome of one completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Error => "error",
        }
    }
}

/// Scoped span: starts on construction, ends exactly once on drop, on every
/// exit path including panic and cancellation.
pub struct SpanGuard {
    handle: Option<Box<dyn SpanHandle>>,
}

impl SpanGuard {
    fn mark_error(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_status(SpanStatus::Error);
        }
    }

    fn add_event(&mut self, name: &str, tags: &[(String, String)]) {
        if let Some(handle) = self.handle.as_mut() {
            handle.add_event(name, tags);
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.end();
        }
    }
}

/// Start a span through the installed backend.
pub fn start_span(name: &str) -> SpanGuard {
    SpanGuard {
        handle: Some(telemetry::backend().start_span(name)),
    }
}

/// Scoped in-flight tracking: increments the up-down counter on
/// construction and decrements on drop, unconditionally. Net movement over
/// one call is zero on every completion path.
pub struct InFlightGuard {
    name: String,
    tags: Vec<(String, String)>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        telemetry::backend().up_down_add(&self.name, -1, &self.tags);
    }
}

/// Acquire the in-flight guard for a metric base name; the instrument is
/// `{metric_base}.inflight`.
pub fn in_flight_guard(metric_base: &str, tags: &[(&str, &str)]) -> InFlightGuard {
    let name = format!("{metric_base}.inflight");
    let tags = owned_tags(tags);
    telemetry::backend().up_down_add(&name, 1, &tags);
    InFlightGuard { name, tags }
}

/// Map a classification predicate over the success value:
/// `true` means failure.
pub fn classify_with<T: ?Sized>(predicate: impl FnOnce(&T) -> bool, value: &T) -> Status {
    if predicate(value) {
        Status::Error
    } else {
        Status::Ok
    }
}

/// Record one completed call: span status (error only when classified so;
/// the default ok leaves the span status unset), `.calls` counter and
/// `.duration` histogram, each gated by its emit flag and tagged with
/// `status` plus the merged custom tags.
pub fn record_completion(
    span: Option<&mut SpanGuard>,
    metric_base: &str,
    status: Status,
    elapsed: Duration,
    emit_calls: bool,
    emit_duration: bool,
    tags: &[(&str, &str)],
) {
    if let Some(span) = span {
        if status == Status::Error {
            span.mark_error();
        }
    }
    if !emit_calls && !emit_duration {
        return;
    }
    let mut recorded = owned_tags(tags);
    recorded.push(("status".to_string(), status.as_str().to_string()));
    let backend = telemetry::backend();
    if emit_calls {
        backend.counter_add(&format!("{metric_base}.calls"), 1, &recorded);
    }
    if emit_duration {
        backend.histogram_record(&format!("{metric_base}.duration"), elapsed.as_secs_f64(), &recorded);
    }
}

/// Record a panic escaping the wrapped call: always status error, with a
/// structured exception event on the span. The caller re-raises the payload
/// afterwards; telemetry never suppresses it.
pub fn record_panic(
    mut span: Option<&mut SpanGuard>,
    metric_base: &str,
    payload: &(dyn Any + Send),
    elapsed: Duration,
    emit_calls: bool,
    emit_duration: bool,
    tags: &[(&str, &str)],
) {
    if let Some(span) = span.as_deref_mut() {
        span.add_event(
            "exception",
            &[
                ("exception.type".to_string(), "panic".to_string()),
                ("exception.message".to_string(), panic_message(payload)),
                (
                    "exception.stacktrace".to_string(),
                    Backtrace::force_capture().to_string(),
                ),
            ],
        );
    }
    record_completion(
        span,
        metric_base,
        Status::Error,
        elapsed,
        emit_calls,
        emit_duration,
        tags,
    );
}

/// Re-raise a captured panic payload unchanged.
pub fn resume(payload: Box<dyn Any + Send>) -> ! {
    std::panic::resume_unwind(payload)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

fn owned_tags(tags: &[(&str, &str)]) -> Vec<(String, String)> {
    tags.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Outcome of polling a wrapped future once without scheduling.
pub enum FirstPoll<F: Future> {
    /// Completed synchronously (or panicked while doing so); the wrapper
    /// takes the fast path.
    Ready(std::thread::Result<F::Output>),
    /// Still pending; the wrapper awaits it on the slow path.
    Pending(Pin<Box<F>>),
}

/// Poll a future exactly once with a no-op waker. Suspension is introduced
/// only by the wrapped operation itself; if it is already complete the
/// wrapper never schedules.
pub fn first_poll<F: Future>(future: F) -> FirstPoll<F> {
    let mut future = Box::pin(future);
    let mut cx = Context::from_waker(noop_waker_ref());
    let polled = std::panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)));
    match polled {
        Ok(Poll::Ready(output)) => FirstPoll::Ready(Ok(output)),
        Ok(Poll::Pending) => FirstPoll::Pending(future),
        Err(payload) => FirstPoll::Ready(Err(payload)),
    }
}

/// Await a pending future, converting a panic during completion into a
/// captured payload so the slow path can record it before re-raising.
pub async fn await_caught<F: Future>(future: Pin<Box<F>>) -> std::thread::Result<F::Output> {
    use futures::FutureExt;
    AssertUnwindSafe(future).catch_unwind().await
}
