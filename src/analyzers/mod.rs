//! Analysis passes, in pipeline order: scan declarations, locate call
//! sites, validate compatibility, deduplicate, classify shapes. Every pass
//! is a pure function over the parsed snapshot.

pub mod attributes;
pub mod classifier;
pub mod dedupe;
pub mod locator;
pub mod scanner;
pub mod validator;

pub use attributes::{parse_annotations, MeasuredAnnotation, ParsedAnnotations, TracedAnnotation};
pub use classifier::classify;
pub use dedupe::deduplicate;
pub use locator::{locate_call_sites, locate_for_kind, AnnotationKind};
pub use scanner::{scan_file, AnnotationTable, DeclarationIndex, FunctionDecl, ScanResult};
pub use validator::{effective_success_type, validate, ResolvedPredicate, ValidatedCallSite, ValidationOutcome};
