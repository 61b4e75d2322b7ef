//! Typed per-declaration instrumentation configuration.
//!
//! The two annotation kinds (`#[traced]`, `#[measured]`) are parsed
//! independently and merged here into a single immutable value. Recognized
//! measurement options: `name`, `calls`, `duration`, `in_flight`, `tags(..)`
//! and `error_when`.

use serde::{Deserialize, Serialize};

/// Merged configuration for one annotated declaration.
///
/// Built once by the scanner and never mutated afterwards; every later pass
/// receives it by reference through the annotation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationConfig {
    pub tracing_enabled: bool,
    pub span_name_override: Option<String>,
    pub metrics_enabled: bool,
    pub metric_name_override: Option<String>,
    pub emit_calls: bool,
    pub emit_duration: bool,
    pub emit_in_flight: bool,
    /// Static tags merged into every recording, in declaration order.
    pub custom_tags: Vec<(String, String)>,
    /// Name of the success/failure classification predicate, if configured.
    pub error_when: Option<String>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: false,
            span_name_override: None,
            metrics_enabled: false,
            metric_name_override: None,
            emit_calls: true,
            emit_duration: true,
            emit_in_flight: false,
            custom_tags: Vec::new(),
            error_when: None,
        }
    }
}

impl AnnotationConfig {
    /// True when the declaration carries at least one annotation kind.
    pub fn is_instrumented(&self) -> bool {
        self.tracing_enabled || self.metrics_enabled
    }

    /// Span name for a declaration: the override, or
    /// `{ContainingType}.{DeclarationName}`.
    pub fn span_name(&self, containing_type: &str, declaration_name: &str) -> String {
        self.span_name_override
            .clone()
            .unwrap_or_else(|| format!("{containing_type}.{declaration_name}"))
    }

    /// Base metric name; the emitter appends `.calls`, `.duration` or
    /// `.inflight` per instrument.
    pub fn metric_base(&self, containing_type: &str, declaration_name: &str) -> String {
        self.metric_name_override
            .clone()
            .unwrap_or_else(|| format!("{containing_type}.{declaration_name}"))
    }
}
