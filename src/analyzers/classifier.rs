//! Shape classification: maps a record's declared return to one of the six
//! calling-convention variants.
//!
//! The rule is purely structural and total over non-rejected records:
//! - no return / `()`                → `Void`
//! - plain value type                → `Value`
//! - erased future handle, no result → `Future`
//! - erased future handle, result    → `FutureOf`
//! - `async fn`, no result           → `OptimizedFuture`
//! - `async fn`, result              → `OptimizedFutureOf`
//!
//! An `async fn` future may complete on its first poll without any
//! scheduling, which is exactly what earns it the optimized fast-path
//! emission; a boxed handle is treated as always scheduled.

use crate::core::{CallSiteRecord, ReturnKind, ShapeVariant};

/// Classify one record. Total: every record maps to exactly one variant.
pub fn classify(record: &CallSiteRecord) -> ShapeVariant {
    if record.is_async {
        match &record.return_kind {
            ReturnKind::Unit => ShapeVariant::OptimizedFuture,
            ReturnKind::Plain(inner) => ShapeVariant::OptimizedFutureOf(inner.clone()),
            // An async fn declared to return an erased handle yields that
            // handle as its result value.
            ReturnKind::BoxedFuture { tokens, .. } => {
                ShapeVariant::OptimizedFutureOf(tokens.clone())
            }
        }
    } else {
        match &record.return_kind {
            ReturnKind::Unit => ShapeVariant::Void,
            ReturnKind::Plain(_) => ShapeVariant::Value,
            ReturnKind::BoxedFuture { inner: None, .. } => ShapeVariant::Future,
            ReturnKind::BoxedFuture {
                inner: Some(inner), ..
            } => ShapeVariant::FutureOf(inner.clone()),
        }
    }
}
