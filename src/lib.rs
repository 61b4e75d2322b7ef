//! spanweave: a build-time weaver that instruments annotated call sites
//! with tracing spans and metrics.
//!
//! The pipeline scans declarations for `#[traced]` / `#[measured]`
//! annotations, locates every call site targeting them, validates and
//! deduplicates the sites, classifies each into a shape variant, and emits
//! a wrapper implementation per surviving site. Generated wrappers call
//! into [`rt`] for span lifecycle, metric recording, panic propagation and
//! first-poll optimization of async calls.

pub mod analyzers;
pub mod cache;
pub mod config;
pub mod core;
pub mod emitter;
pub mod errors;
pub mod pipeline;
pub mod rt;
pub mod telemetry;

pub use crate::config::{WeaverConfig, DEFAULT_RUNTIME_PATH};
pub use crate::core::{
    AnnotationConfig, CallSiteRecord, Diagnostic, DiagnosticCode, ParameterDescriptor,
    PassingMode, ReceiverMode, ReturnKind, Severity, ShapeVariant, SourceLocation,
};
pub use crate::emitter::{CallRedirector, GeneratedWrapper, InMemoryRedirector, WrapperEmitter};
pub use crate::errors::{Error, Result};
pub use crate::pipeline::{ProgramSnapshot, SourceFile, WeaveOutput, Weaver};
pub use crate::telemetry::{
    install_backend, NoopBackend, RecordingBackend, SpanHandle, SpanStatus, TelemetryBackend,
};
