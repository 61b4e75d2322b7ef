//! The consumed telemetry primitives: spans, counters, histograms and
//! up-down counters.
//!
//! The weaver does not implement a telemetry backend; it emits code against
//! this trait surface. Hosts install their backend once at startup with
//! [`install_backend`]. The default is a no-op. [`RecordingBackend`] is an
//! in-memory reference backend used by the test suite and by dry runs.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Explicit span status. A span that never gets a status set stays unset,
/// which readers treat as ok.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error,
}

/// One live span.
pub trait SpanHandle: Send {
    fn set_status(&mut self, status: SpanStatus);
    fn add_event(&mut self, name: &str, tags: &[(String, String)]);
    fn end(&mut self);
}

/// The instrument surface generated wrappers record through.
///
/// The up-down counter must be atomically safe: it is the only
/// concurrently-shared mutable resource generated code touches.
pub trait TelemetryBackend: Send + Sync {
    fn start_span(&self, name: &str) -> Box<dyn SpanHandle>;
    fn counter_add(&self, name: &str, delta: u64, tags: &[(String, String)]);
    fn histogram_record(&self, name: &str, value: f64, tags: &[(String, String)]);
    fn up_down_add(&self, name: &str, delta: i64, tags: &[(String, String)]);
}

/// Backend that drops everything on the floor.
pub struct NoopBackend;

struct NoopSpan;

impl SpanHandle for NoopSpan {
    fn set_status(&mut self, _status: SpanStatus) {}
    fn add_event(&mut self, _name: &str, _tags: &[(String, String)]) {}
    fn end(&mut self) {}
}

impl TelemetryBackend for NoopBackend {
    fn start_span(&self, _name: &str) -> Box<dyn SpanHandle> {
        Box::new(NoopSpan)
    }
    fn counter_add(&self, _name: &str, _delta: u64, _tags: &[(String, String)]) {}
    fn histogram_record(&self, _name: &str, _value: f64, _tags: &[(String, String)]) {}
    fn up_down_add(&self, _name: &str, _delta: i64, _tags: &[(String, String)]) {}
}

static BACKEND: Lazy<RwLock<Arc<dyn TelemetryBackend>>> =
    Lazy::new(|| RwLock::new(Arc::new(NoopBackend)));

/// Install the process-wide backend. Called once by the host at startup.
pub fn install_backend(backend: Arc<dyn TelemetryBackend>) {
    *BACKEND.write() = backend;
}

/// The currently installed backend.
pub fn backend() -> Arc<dyn TelemetryBackend> {
    BACKEND.read().clone()
}

/// Everything a [`RecordingBackend`] saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    SpanStarted {
        name: String,
    },
    SpanStatusSet {
        name: String,
        status: SpanStatus,
    },
    SpanEvent {
        name: String,
        event: String,
        tags: Vec<(String, String)>,
    },
    SpanEnded {
        name: String,
    },
    CounterAdd {
        name: String,
        delta: u64,
        tags: Vec<(String, String)>,
    },
    HistogramRecord {
        name: String,
        value: f64,
        tags: Vec<(String, String)>,
    },
    UpDownAdd {
        name: String,
        delta: i64,
        tags: Vec<(String, String)>,
    },
}

/// In-memory backend recording every primitive call.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Net up-down movement for one instrument name.
    pub fn net_up_down(&self, name: &str) -> i64 {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::UpDownAdd {
                    name: event_name,
                    delta,
                    ..
                } if event_name == name => Some(*delta),
                _ => None,
            })
            .sum()
    }

    /// Counter totals grouped by the `status` tag value.
    pub fn counter_total(&self, name: &str, status: &str) -> u64 {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::CounterAdd {
                    name: event_name,
                    delta,
                    tags,
                } if event_name == name
                    && tags.iter().any(|(k, v)| k == "status" && v == status) =>
                {
                    Some(*delta)
                }
                _ => None,
            })
            .sum()
    }
}

struct RecordingSpan {
    name: String,
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl SpanHandle for RecordingSpan {
    fn set_status(&mut self, status: SpanStatus) {
        self.events.lock().push(TelemetryEvent::SpanStatusSet {
            name: self.name.clone(),
            status,
        });
    }

    fn add_event(&mut self, name: &str, tags: &[(String, String)]) {
        self.events.lock().push(TelemetryEvent::SpanEvent {
            name: self.name.clone(),
            event: name.to_string(),
            tags: tags.to_vec(),
        });
    }

    fn end(&mut self) {
        self.events
            .lock()
            .push(TelemetryEvent::SpanEnded {
                name: self.name.clone(),
            });
    }
}

impl TelemetryBackend for RecordingBackend {
    fn start_span(&self, name: &str) -> Box<dyn SpanHandle> {
        self.events.lock().push(TelemetryEvent::SpanStarted {
            name: name.to_string(),
        });
        Box::new(RecordingSpan {
            name: name.to_string(),
            events: self.events.clone(),
        })
    }

    fn counter_add(&self, name: &str, delta: u64, tags: &[(String, String)]) {
        self.events.lock().push(TelemetryEvent::CounterAdd {
            name: name.to_string(),
            delta,
            tags: tags.to_vec(),
        });
    }

    fn histogram_record(&self, name: &str, value: f64, tags: &[(String, String)]) {
        self.events.lock().push(TelemetryEvent::HistogramRecord {
            name: name.to_string(),
            value,
            tags: tags.to_vec(),
        });
    }

    fn up_down_add(&self, name: &str, delta: i64, tags: &[(String, String)]) {
        self.events.lock().push(TelemetryEvent::UpDownAdd {
            name: name.to_string(),
            delta,
            tags: tags.to_vec(),
        });
    }
}
