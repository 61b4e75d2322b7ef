//! Wrapper emission: synthesizes one replacement implementation per valid,
//! deduplicated call site and registers it by source location.

pub mod redirect;
pub mod template;

pub use redirect::{CallRedirector, GeneratedWrapper, InMemoryRedirector};
pub use template::{InstrumentationTemplate, ResultSource};

use crate::analyzers::validator::ValidatedCallSite;
use crate::config::WeaverConfig;
use crate::core::ShapeVariant;
use crate::errors::{Error, Result};
use log::debug;

/// Emits wrapper implementations against a configurable runtime path.
pub struct WrapperEmitter {
    rt: syn::Path,
}

impl WrapperEmitter {
    pub fn new(config: &WeaverConfig) -> Result<Self> {
        let rt = syn::parse_str(&config.runtime_path).map_err(|err| {
            Error::Resolution(format!(
                "runtime path `{}` is not a valid path: {err}",
                config.runtime_path
            ))
        })?;
        Ok(Self { rt })
    }

    /// Synthesize the wrapper for one classified call site.
    pub fn emit(&self, site: &ValidatedCallSite, variant: &ShapeVariant) -> Result<GeneratedWrapper> {
        let template = InstrumentationTemplate::new(&self.rt, site, variant);
        let tokens = template.render()?;
        debug!(
            "emitted {} wrapper for `{}` at {}",
            variant, site.record.declaration_key, site.record.location
        );
        Ok(GeneratedWrapper {
            location: site.record.location.clone(),
            wrapper_name: template.wrapper_name(),
            declaration_key: site.record.declaration_key.clone(),
            variant: variant.clone(),
            source: tokens.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::validator::ResolvedPredicate;
    use crate::core::{
        AnnotationConfig, CallSiteRecord, ReturnKind, SourceLocation,
    };
    use pretty_assertions::assert_eq;

    fn emitter() -> WrapperEmitter {
        WrapperEmitter::new(&WeaverConfig::default()).unwrap()
    }

    fn site(config: AnnotationConfig, is_async: bool, return_kind: ReturnKind) -> ValidatedCallSite {
        ValidatedCallSite {
            record: CallSiteRecord {
                location: SourceLocation::new("src/demo.rs", 12, 8),
                declaration_key: "orders::submit".to_string(),
                declaration_name: "submit".to_string(),
                containing_type: "orders".to_string(),
                is_static: true,
                is_generic_declaration: false,
                receiver: None,
                parameters: Vec::new(),
                has_ref_struct_parameter: false,
                is_async,
                return_kind,
                config,
            },
            predicate: None,
        }
    }

    fn traced_and_measured() -> AnnotationConfig {
        AnnotationConfig {
            tracing_enabled: true,
            metrics_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn wrapper_names_encode_declaration_and_location() {
        let site = site(traced_and_measured(), false, ReturnKind::Unit);
        let wrapper = emitter().emit(&site, &ShapeVariant::Void).unwrap();
        assert_eq!(wrapper.wrapper_name, "__sw_orders_submit_12_8");
        assert_eq!(wrapper.location, SourceLocation::new("src/demo.rs", 12, 8));
    }

    #[test]
    fn void_wrappers_start_a_span_and_record_completion() {
        let site = site(traced_and_measured(), false, ReturnKind::Unit);
        let wrapper = emitter().emit(&site, &ShapeVariant::Void).unwrap();
        assert!(wrapper.source.contains("start_span"));
        assert!(wrapper.source.contains("record_completion"));
        assert!(wrapper.source.contains("record_panic"));
        assert!(wrapper.source.contains("resume"));
        // In-flight is off by default.
        assert!(!wrapper.source.contains("in_flight_guard"));
    }

    #[test]
    fn tracing_only_sites_skip_metric_recording_flags() {
        let config = AnnotationConfig {
            tracing_enabled: true,
            ..Default::default()
        };
        let site = site(config, false, ReturnKind::Unit);
        let wrapper = emitter().emit(&site, &ShapeVariant::Void).unwrap();
        // Both emit flags render false when metrics are not enabled.
        assert!(wrapper.source.contains("false , false"));
        assert!(wrapper.source.contains("start_span"));
    }

    #[test]
    fn in_flight_guard_is_acquired_before_the_call() {
        let config = AnnotationConfig {
            metrics_enabled: true,
            emit_in_flight: true,
            ..Default::default()
        };
        let site = site(config, false, ReturnKind::Plain("u32".to_string()));
        let wrapper = emitter().emit(&site, &ShapeVariant::Value).unwrap();
        let guard_at = wrapper.source.find("in_flight_guard").unwrap();
        let call_at = wrapper.source.find("catch_unwind").unwrap();
        assert!(guard_at < call_at);
    }

    #[test]
    fn predicates_classify_through_the_runtime_helper() {
        let mut validated = site(
            traced_and_measured(),
            false,
            ReturnKind::Plain("Outcome".to_string()),
        );
        validated.predicate = Some(ResolvedPredicate {
            callable_path: "orders::is_failure".to_string(),
            parameter_type: "Outcome".to_string(),
        });
        let wrapper = emitter().emit(&validated, &ShapeVariant::Value).unwrap();
        assert!(wrapper
            .source
            .contains("classify_with (orders :: is_failure , & __value)"));
    }

    #[test]
    fn optimized_wrappers_emit_fast_and_slow_paths() {
        let site = site(
            traced_and_measured(),
            true,
            ReturnKind::Plain("u32".to_string()),
        );
        let wrapper = emitter()
            .emit(&site, &ShapeVariant::OptimizedFutureOf("u32".to_string()))
            .unwrap();
        assert!(wrapper.source.contains("first_poll"));
        assert!(wrapper.source.contains("FirstPoll :: Ready"));
        assert!(wrapper.source.contains("FirstPoll :: Pending"));
        assert!(wrapper.source.contains("await_caught"));
        // One recording routine, two instantiations.
        assert_eq!(wrapper.source.matches("record_completion").count(), 2);
        assert_eq!(wrapper.source.matches("record_panic").count(), 2);
    }

    #[test]
    fn fast_and_slow_completion_paths_are_token_identical() {
        let validated = site(
            traced_and_measured(),
            true,
            ReturnKind::Plain("u32".to_string()),
        );
        let variant = ShapeVariant::OptimizedFutureOf("u32".to_string());
        let rt: syn::Path = syn::parse_str("::spanweave::rt").unwrap();
        let template = InstrumentationTemplate::new(&rt, &validated, &variant);
        let fast = template.completion_path(ResultSource::Immediate).unwrap();
        let slow = template.completion_path(ResultSource::Deferred).unwrap();
        // The deferred instantiation only prepends the awaited binding.
        let slow_text = slow.to_string();
        let fast_text = fast.to_string();
        assert!(slow_text.ends_with(&fast_text));
        assert!(slow_text.contains("await_caught"));
    }

    #[test]
    fn boxed_future_wrappers_instrument_the_returned_handle() {
        let site = site(
            traced_and_measured(),
            false,
            ReturnKind::BoxedFuture {
                inner: Some("u32".to_string()),
                tokens: "BoxFuture < 'static , u32 >".to_string(),
            },
        );
        let wrapper = emitter()
            .emit(&site, &ShapeVariant::FutureOf("u32".to_string()))
            .unwrap();
        assert!(wrapper.source.contains("-> BoxFuture < 'static , u32 >"));
        assert!(wrapper.source.contains("Box :: pin"));
        assert!(wrapper.source.contains("await_caught"));
    }

    #[test]
    fn custom_tags_are_baked_into_the_wrapper() {
        let config = AnnotationConfig {
            metrics_enabled: true,
            custom_tags: vec![("tier".to_string(), "gold".to_string())],
            ..Default::default()
        };
        let site = site(config, false, ReturnKind::Unit);
        let wrapper = emitter().emit(&site, &ShapeVariant::Void).unwrap();
        assert!(wrapper.source.contains(r#"("tier" , "gold")"#));
    }

    #[test]
    fn generated_code_for_every_variant_parses_back() {
        let cases = vec![
            (false, ReturnKind::Unit, ShapeVariant::Void),
            (
                false,
                ReturnKind::Plain("u32".to_string()),
                ShapeVariant::Value,
            ),
            (
                false,
                ReturnKind::BoxedFuture {
                    inner: None,
                    tokens: "BoxFuture < 'static , () >".to_string(),
                },
                ShapeVariant::Future,
            ),
            (true, ReturnKind::Unit, ShapeVariant::OptimizedFuture),
            (
                true,
                ReturnKind::Plain("String".to_string()),
                ShapeVariant::OptimizedFutureOf("String".to_string()),
            ),
        ];
        for (is_async, return_kind, variant) in cases {
            let site = site(traced_and_measured(), is_async, return_kind);
            let wrapper = emitter().emit(&site, &variant).unwrap();
            syn::parse_str::<syn::ItemFn>(&wrapper.source)
                .unwrap_or_else(|err| panic!("{variant} wrapper does not parse: {err}"));
        }
    }
}
