//! Core data model: every entity is recomputed per analysis pass from an
//! immutable snapshot and never mutated after construction.

pub mod annotation;
pub mod call_site;
pub mod diagnostics;
pub mod shape;

pub use annotation::AnnotationConfig;
pub use call_site::{
    is_stack_only_type, CallSiteRecord, ParameterDescriptor, PassingMode, ReceiverMode,
    ReturnKind, SourceLocation,
};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use shape::ShapeVariant;
