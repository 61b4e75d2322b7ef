//! Calling-convention variants assigned by the shape classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six calling-convention variants a call site can take.
///
/// Classification is total over non-rejected sites: every record maps to
/// exactly one variant. The `*Of` variants carry the inner result type as
/// normalized token text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeVariant {
    /// No return value.
    Void,
    /// A plain value.
    Value,
    /// An always-scheduled future handle with no result.
    Future,
    /// An always-scheduled future handle carrying a result.
    FutureOf(String),
    /// An opaque future that may complete synchronously without scheduling.
    OptimizedFuture,
    /// Same, carrying a result.
    OptimizedFutureOf(String),
}

impl ShapeVariant {
    /// Inner result type for the `*Of` variants.
    pub fn inner(&self) -> Option<&str> {
        match self {
            ShapeVariant::FutureOf(inner) | ShapeVariant::OptimizedFutureOf(inner) => {
                Some(inner.as_str())
            }
            _ => None,
        }
    }

    /// True for the four asynchronous variants.
    pub fn is_async(&self) -> bool {
        !matches!(self, ShapeVariant::Void | ShapeVariant::Value)
    }

    /// True for the variants that may complete without scheduling and get
    /// the fast-path/slow-path emission.
    pub fn is_optimized(&self) -> bool {
        matches!(
            self,
            ShapeVariant::OptimizedFuture | ShapeVariant::OptimizedFutureOf(_)
        )
    }

    /// True when the completed call carries a value a predicate could
    /// classify.
    pub fn carries_value(&self) -> bool {
        matches!(self, ShapeVariant::Value | ShapeVariant::FutureOf(_))
            || matches!(self, ShapeVariant::OptimizedFutureOf(_))
    }
}

impl fmt::Display for ShapeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeVariant::Void => write!(f, "Void"),
            ShapeVariant::Value => write!(f, "Value"),
            ShapeVariant::Future => write!(f, "Future"),
            ShapeVariant::FutureOf(inner) => write!(f, "FutureOf<{inner}>"),
            ShapeVariant::OptimizedFuture => write!(f, "OptimizedFuture"),
            ShapeVariant::OptimizedFutureOf(inner) => write!(f, "OptimizedFutureOf<{inner}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_and_optimized_partitions() {
        assert!(!ShapeVariant::Value.is_async());
        assert!(ShapeVariant::Future.is_async());
        assert!(ShapeVariant::OptimizedFuture.is_optimized());
        assert!(!ShapeVariant::FutureOf("u32".into()).is_optimized());
    }

    #[test]
    fn only_value_carrying_variants_expose_an_inner_type() {
        assert_eq!(ShapeVariant::FutureOf("u32".into()).inner(), Some("u32"));
        assert_eq!(ShapeVariant::Future.inner(), None);
        assert!(ShapeVariant::Value.carries_value());
        assert!(!ShapeVariant::OptimizedFuture.carries_value());
    }
}
