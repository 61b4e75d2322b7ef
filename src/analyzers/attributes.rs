//! Parsing of the two instrumentation annotation kinds.
//!
//! `#[traced]` and `#[measured]` are independent attributes; a declaration
//! may carry either or both. Option values are ordinary literals:
//!
//! ```ignore
//! #[traced(name = "checkout")]
//! #[measured(name = "orders", in_flight, tags("tier" = "gold"), error_when = "is_failure")]
//! fn submit(order: Order) -> Outcome { .. }
//! ```
//!
//! A malformed option never aborts the pass: the offending annotation falls
//! back to defaults and a warning is logged.

use crate::core::AnnotationConfig;
use log::warn;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Attribute, LitBool, LitStr, Token};

/// Options recognized on `#[traced]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracedAnnotation {
    pub name: Option<String>,
}

/// Options recognized on `#[measured]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasuredAnnotation {
    pub name: Option<String>,
    pub calls: Option<bool>,
    pub duration: Option<bool>,
    pub in_flight: Option<bool>,
    pub tags: Vec<(String, String)>,
    pub error_when: Option<String>,
}

/// Both annotation kinds as found on one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnnotations {
    pub traced: Option<TracedAnnotation>,
    pub measured: Option<MeasuredAnnotation>,
}

impl ParsedAnnotations {
    pub fn is_instrumented(&self) -> bool {
        self.traced.is_some() || self.measured.is_some()
    }

    /// Merge the two kinds with the documented defaults
    /// (`calls=true`, `duration=true`, `in_flight=false`).
    pub fn into_config(self) -> AnnotationConfig {
        let defaults = AnnotationConfig::default();
        let mut config = AnnotationConfig {
            tracing_enabled: self.traced.is_some(),
            metrics_enabled: self.measured.is_some(),
            ..defaults
        };
        if let Some(traced) = self.traced {
            config.span_name_override = traced.name;
        }
        if let Some(measured) = self.measured {
            config.metric_name_override = measured.name;
            config.emit_calls = measured.calls.unwrap_or(config.emit_calls);
            config.emit_duration = measured.duration.unwrap_or(config.emit_duration);
            config.emit_in_flight = measured.in_flight.unwrap_or(config.emit_in_flight);
            config.custom_tags = measured.tags;
            config.error_when = measured.error_when;
        }
        config
    }
}

/// Extract both annotation kinds from a declaration's attribute list.
pub fn parse_annotations(attrs: &[Attribute]) -> ParsedAnnotations {
    let mut parsed = ParsedAnnotations::default();
    for attr in attrs {
        if attr.path().is_ident("traced") {
            parsed.traced = Some(parse_traced(attr));
        } else if attr.path().is_ident("measured") {
            parsed.measured = Some(parse_measured(attr));
        }
    }
    parsed
}

fn parse_traced(attr: &Attribute) -> TracedAnnotation {
    let mut annotation = TracedAnnotation::default();
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return annotation;
    }
    let outcome = attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            let lit: LitStr = meta.value()?.parse()?;
            annotation.name = Some(lit.value());
            Ok(())
        } else {
            Err(meta.error("unrecognized traced option"))
        }
    });
    if let Err(err) = outcome {
        warn!("malformed #[traced] options ignored: {err}");
        return TracedAnnotation::default();
    }
    annotation
}

struct TagPair {
    key: LitStr,
    value: LitStr,
}

impl Parse for TagPair {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let key: LitStr = input.parse()?;
        input.parse::<Token![=]>()?;
        let value: LitStr = input.parse()?;
        Ok(TagPair { key, value })
    }
}

fn parse_measured(attr: &Attribute) -> MeasuredAnnotation {
    let mut annotation = MeasuredAnnotation::default();
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return annotation;
    }
    let outcome = attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            let lit: LitStr = meta.value()?.parse()?;
            annotation.name = Some(lit.value());
            Ok(())
        } else if meta.path.is_ident("calls") {
            annotation.calls = Some(parse_flag(&meta)?);
            Ok(())
        } else if meta.path.is_ident("duration") {
            annotation.duration = Some(parse_flag(&meta)?);
            Ok(())
        } else if meta.path.is_ident("in_flight") {
            annotation.in_flight = Some(parse_flag(&meta)?);
            Ok(())
        } else if meta.path.is_ident("error_when") {
            let lit: LitStr = meta.value()?.parse()?;
            annotation.error_when = Some(lit.value());
            Ok(())
        } else if meta.path.is_ident("tags") {
            let content;
            syn::parenthesized!(content in meta.input);
            let pairs = Punctuated::<TagPair, Token![,]>::parse_terminated(&content)?;
            for pair in pairs {
                annotation.tags.push((pair.key.value(), pair.value.value()));
            }
            Ok(())
        } else {
            Err(meta.error("unrecognized measured option"))
        }
    });
    if let Err(err) = outcome {
        warn!("malformed #[measured] options ignored: {err}");
        return MeasuredAnnotation::default();
    }
    annotation
}

/// Bool options accept both the bare-flag form (`in_flight`) and the
/// explicit form (`in_flight = false`).
fn parse_flag(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<bool> {
    if meta.input.peek(Token![=]) {
        let lit: LitBool = meta.value()?.parse()?;
        Ok(lit.value())
    } else {
        Ok(true)
    }
}
