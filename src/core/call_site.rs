//! Call-site records and the supporting source-level descriptors.

use crate::core::AnnotationConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A physical source position. Call sites are uniquely keyed by this after
/// deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// How a parameter is handed to the callee.
///
/// Rust expresses out-parameters as `&mut`, so there is no separate `Out`
/// mode: `Ref` covers both exclusive borrows and out-style parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassingMode {
    /// By value.
    Value,
    /// Exclusive borrow (`&mut T`).
    Ref,
    /// Shared borrow (`&T`).
    In,
}

/// One declared parameter of a call target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    /// Rendered declared type, normalized token text.
    pub ty: String,
    pub passing_mode: PassingMode,
    /// C-variadic tail (`...`) in an extern declaration.
    pub is_variadic: bool,
}

/// Structural classification input: the declared return of the call target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    /// No return type, or `()`.
    Unit,
    /// Any plain (non-future) type, rendered as normalized token text.
    Plain(String),
    /// An always-scheduled erased future handle (`BoxFuture<'_, T>` or
    /// `Pin<Box<dyn Future<Output = T> + ..>>`). `inner` is `None` when the
    /// output is `()`; `tokens` is the declared type verbatim, for wrapper
    /// signatures.
    BoxedFuture {
        inner: Option<String>,
        tokens: String,
    },
}

/// How a method receives `self`, if it has a receiver at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverMode {
    Value,
    Shared,
    Exclusive,
}

/// One discovered invocation of an annotated declaration.
///
/// Candidates are produced by the locator, filtered by the validator and
/// collapsed by the deduplicator; after that no two surviving records share
/// a `location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteRecord {
    pub location: SourceLocation,
    pub declaration_key: String,
    /// Simple name of the target declaration.
    pub declaration_name: String,
    /// Containing type for methods; innermost module (or file stem) for free
    /// functions. Used for default span and metric names.
    pub containing_type: String,
    /// True when the target has no `self` receiver.
    pub is_static: bool,
    pub is_generic_declaration: bool,
    pub receiver: Option<ReceiverMode>,
    pub parameters: Vec<ParameterDescriptor>,
    /// True when any parameter type is stack-only (carries a non-`'static`
    /// borrow) and therefore cannot be captured by an async wrapper.
    pub has_ref_struct_parameter: bool,
    pub is_async: bool,
    pub return_kind: ReturnKind,
    pub config: AnnotationConfig,
}

impl CallSiteRecord {
    /// First stack-only parameter, for the OTEL002 message.
    pub fn first_stack_only_parameter(&self) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| is_stack_only_type(&p.ty))
    }
}

/// A type is stack-only when it carries a borrow that is not `'static`:
/// `&T`, `&mut T`, `&'a T`, including nested positions such as `Vec<&str>`.
/// Such a value cannot live inside the suspension state of an emitted
/// wrapper future.
pub fn is_stack_only_type(ty: &str) -> bool {
    let mut rest = ty;
    while let Some(idx) = rest.find('&') {
        let after = rest[idx + 1..].trim_start();
        if let Some(lifetime) = after.strip_prefix('\'') {
            if !lifetime.starts_with("static") {
                return true;
            }
        } else {
            // Anonymous borrow, never 'static in parameter position.
            return true;
        }
        rest = &rest[idx + 1..];
    }
    false
}
