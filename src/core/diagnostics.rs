//! Diagnostics produced by the validation pipeline.
//!
//! Diagnostics are ephemeral: each analysis pass produces a fresh stream.
//! OTEL001 and OTEL002 exclude a site from emission; OTEL003 degrades it to
//! default classification but still emits.

use crate::core::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Target declaration is generic; site skipped.
    Otel001,
    /// Async target has a stack-only parameter; site skipped.
    Otel002,
    /// Error-classification predicate unresolved; site emitted with default
    /// classification.
    Otel003,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::Otel001 => "OTEL001",
            DiagnosticCode::Otel002 => "OTEL002",
            DiagnosticCode::Otel003 => "OTEL003",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

impl Diagnostic {
    pub fn generic_target(location: SourceLocation, declaration: &str) -> Self {
        Self {
            code: DiagnosticCode::Otel001,
            severity: Severity::Warning,
            message: format!(
                "instrumented declaration `{declaration}` is generic; call site skipped"
            ),
            location,
        }
    }

    pub fn stack_only_parameter(
        location: SourceLocation,
        declaration: &str,
        parameter: &str,
    ) -> Self {
        Self {
            code: DiagnosticCode::Otel002,
            severity: Severity::Warning,
            message: format!(
                "async declaration `{declaration}` takes stack-only parameter \
                 `{parameter}`; call site skipped"
            ),
            location,
        }
    }

    pub fn unresolved_predicate(
        location: SourceLocation,
        predicate: &str,
        declaration: &str,
    ) -> Self {
        Self {
            code: DiagnosticCode::Otel003,
            severity: Severity::Warning,
            message: format!(
                "error_when predicate `{predicate}` could not be resolved for \
                 `{declaration}`; default classification used"
            ),
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} ({})",
            self.severity.as_str(),
            self.code.as_str(),
            self.message,
            self.location
        )
    }
}
