//! The instrumentation template: one specification of the telemetry
//! contract, compiled into every variant's code shape.
//!
//! The optimized-future variants get two code paths — fast (synchronously
//! completed, no suspension state) and slow (awaited) — but both are
//! instantiations of the same completion template, differing only in how
//! the completed outcome is bound ([`ResultSource`]). The recording calls
//! themselves are token-identical, so the paths cannot drift apart.

use crate::analyzers::validator::ValidatedCallSite;
use crate::core::{ReceiverMode, ReturnKind, ShapeVariant};
use crate::errors::{Error, Result};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// Where the completed outcome of an optimized future comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Completed on the first poll; `__completed` is bound by the match
    /// pattern and no suspension state exists.
    Immediate,
    /// Still pending after the first poll; `__completed` is bound by
    /// awaiting the returned future.
    Deferred,
}

/// Per-site instrumentation template.
pub struct InstrumentationTemplate<'a> {
    rt: &'a syn::Path,
    site: &'a ValidatedCallSite,
    variant: &'a ShapeVariant,
}

impl<'a> InstrumentationTemplate<'a> {
    pub fn new(
        rt: &'a syn::Path,
        site: &'a ValidatedCallSite,
        variant: &'a ShapeVariant,
    ) -> Self {
        Self { rt, site, variant }
    }

    /// Render the whole wrapper function.
    pub fn render(&self) -> Result<TokenStream> {
        let body = match self.variant {
            ShapeVariant::Void | ShapeVariant::Value => self.sync_body()?,
            ShapeVariant::Future | ShapeVariant::FutureOf(_) => self.boxed_body()?,
            ShapeVariant::OptimizedFuture | ShapeVariant::OptimizedFutureOf(_) => {
                self.optimized_body()?
            }
        };

        let ident = format_ident!("{}", self.wrapper_name());
        let params = self.parameters()?;
        let output = self.output_tokens()?;
        let asyncness = if self.variant.is_optimized() {
            quote! { async }
        } else {
            TokenStream::new()
        };

        Ok(quote! {
            #[allow(non_snake_case, clippy::too_many_arguments)]
            pub #asyncness fn #ident(#params) #output {
                #body
            }
        })
    }

    /// `__sw_{declaration}_{line}_{column}`.
    pub fn wrapper_name(&self) -> String {
        let record = &self.site.record;
        format!(
            "__sw_{}_{}_{}",
            record.declaration_key.replace("::", "_"),
            record.location.line,
            record.location.column
        )
    }

    /// Completion arms shared by every code shape: classify, record, hand
    /// the value back; on panic record then re-raise unchanged.
    fn completion_arms(&self) -> Result<TokenStream> {
        let rt = self.rt;
        let span_expr = self.span_expr();
        let metric_base = self.metric_base();
        let emit_calls = self.emit_calls();
        let emit_duration = self.emit_duration();
        let status_expr = match &self.site.predicate {
            Some(predicate) => {
                let path: syn::Path =
                    syn::parse_str(&predicate.callable_path).map_err(|err| {
                        Error::Resolution(format!(
                            "predicate path `{}` is not a valid path: {err}",
                            predicate.callable_path
                        ))
                    })?;
                quote! { #rt::classify_with(#path, &__value) }
            }
            None => quote! { #rt::Status::Ok },
        };
        Ok(quote! {
            match __completed {
                ::std::result::Result::Ok(__value) => {
                    let __status = #status_expr;
                    #rt::record_completion(#span_expr, #metric_base, __status, __elapsed, #emit_calls, #emit_duration, __tags);
                    __value
                }
                ::std::result::Result::Err(__panic) => {
                    #rt::record_panic(#span_expr, #metric_base, __panic.as_ref(), __elapsed, #emit_calls, #emit_duration, __tags);
                    #rt::resume(__panic)
                }
            }
        })
    }

    /// One instantiation of the completion template. The source decides how
    /// `__completed` is bound; everything downstream is identical.
    pub fn completion_path(&self, source: ResultSource) -> Result<TokenStream> {
        let rt = self.rt;
        let binding = match source {
            ResultSource::Immediate => TokenStream::new(),
            ResultSource::Deferred => quote! {
                let __completed = #rt::await_caught(__fut).await;
            },
        };
        let arms = self.completion_arms()?;
        Ok(quote! {
            #binding
            let __elapsed = __start.elapsed();
            #arms
        })
    }

    /// Shared prelude: static tags, in-flight guard, span, timer.
    fn prelude(&self) -> TokenStream {
        let rt = self.rt;
        let config = &self.site.record.config;
        let keys = config.custom_tags.iter().map(|(k, _)| k);
        let values = config.custom_tags.iter().map(|(_, v)| v);
        let tags = quote! {
            let __tags: &[(&str, &str)] = &[#((#keys, #values)),*];
        };
        let metric_base = self.metric_base();
        let inflight = if config.metrics_enabled && config.emit_in_flight {
            quote! { let __inflight = #rt::in_flight_guard(#metric_base, __tags); }
        } else {
            TokenStream::new()
        };
        let span = if config.tracing_enabled {
            let name = self.span_name();
            quote! { let mut __span = #rt::start_span(#name); }
        } else {
            TokenStream::new()
        };
        quote! {
            #tags
            #inflight
            #span
            let __start = ::std::time::Instant::now();
        }
    }

    fn sync_body(&self) -> Result<TokenStream> {
        let prelude = self.prelude();
        let call = self.call_expr()?;
        let arms = self.completion_arms()?;
        Ok(quote! {
            #prelude
            let __completed = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(move || #call));
            let __elapsed = __start.elapsed();
            #arms
        })
    }

    /// Always-scheduled handles: call synchronously, then instrument the
    /// returned handle inside a re-boxed future. The guards move into the
    /// future so cancellation still releases them exactly once.
    fn boxed_body(&self) -> Result<TokenStream> {
        let rt = self.rt;
        let prelude = self.prelude();
        let call = self.call_expr()?;
        let arms = self.completion_arms()?;
        let metric_base = self.metric_base();
        let span_expr = self.span_expr();
        let emit_calls = self.emit_calls();
        let emit_duration = self.emit_duration();
        let moves = self.capture_moves();
        Ok(quote! {
            #prelude
            let __created = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(move || #call));
            let __handle = match __created {
                ::std::result::Result::Ok(__handle) => __handle,
                ::std::result::Result::Err(__panic) => {
                    let __elapsed = __start.elapsed();
                    #rt::record_panic(#span_expr, #metric_base, __panic.as_ref(), __elapsed, #emit_calls, #emit_duration, __tags);
                    #rt::resume(__panic)
                }
            };
            ::std::boxed::Box::pin(async move {
                #moves
                let __completed = #rt::await_caught(::std::boxed::Box::pin(__handle)).await;
                let __elapsed = __start.elapsed();
                #arms
            })
        })
    }

    /// Optimized handles: poll once without scheduling; fast path when the
    /// outcome is already there, slow path awaits. Two instantiations of
    /// one completion template.
    fn optimized_body(&self) -> Result<TokenStream> {
        let rt = self.rt;
        let prelude = self.prelude();
        let call = self.call_expr()?;
        let fast = self.completion_path(ResultSource::Immediate)?;
        let slow = self.completion_path(ResultSource::Deferred)?;
        Ok(quote! {
            #prelude
            match #rt::first_poll(#call) {
                #rt::FirstPoll::Ready(__completed) => {
                    #fast
                }
                #rt::FirstPoll::Pending(__fut) => {
                    #slow
                }
            }
        })
    }

    fn parameters(&self) -> Result<TokenStream> {
        let record = &self.site.record;
        let mut params = Vec::new();
        if let Some(mode) = record.receiver {
            let self_ty = self.self_type()?;
            params.push(match mode {
                ReceiverMode::Value => quote! { __recv: #self_ty },
                ReceiverMode::Shared => quote! { __recv: &#self_ty },
                ReceiverMode::Exclusive => quote! { __recv: &mut #self_ty },
            });
        }
        for (index, parameter) in record
            .parameters
            .iter()
            .filter(|p| !p.is_variadic)
            .enumerate()
        {
            let ident = format_ident!("__arg{index}");
            let ty = parse_type(&parameter.ty)?;
            params.push(quote! { #ident: #ty });
        }
        Ok(quote! { #(#params),* })
    }

    fn call_expr(&self) -> Result<TokenStream> {
        let record = &self.site.record;
        let target: syn::Path = syn::parse_str(&record.declaration_key).map_err(|err| {
            Error::Resolution(format!(
                "target path `{}` is not a valid path: {err}",
                record.declaration_key
            ))
        })?;
        let mut args = Vec::new();
        if record.receiver.is_some() {
            args.push(quote! { __recv });
        }
        for (index, _) in record
            .parameters
            .iter()
            .filter(|p| !p.is_variadic)
            .enumerate()
        {
            let ident = format_ident!("__arg{index}");
            args.push(quote! { #ident });
        }
        Ok(quote! { #target(#(#args),*) })
    }

    fn output_tokens(&self) -> Result<TokenStream> {
        match self.variant {
            ShapeVariant::Void | ShapeVariant::OptimizedFuture => Ok(TokenStream::new()),
            ShapeVariant::Value => match &self.site.record.return_kind {
                ReturnKind::Plain(ty) => {
                    let ty = parse_type(ty)?;
                    Ok(quote! { -> #ty })
                }
                other => Err(Error::Resolution(format!(
                    "value-shaped site with return kind {other:?}"
                ))),
            },
            ShapeVariant::Future | ShapeVariant::FutureOf(_) => {
                match &self.site.record.return_kind {
                    ReturnKind::BoxedFuture { tokens, .. } => {
                        let ty = parse_type(tokens)?;
                        Ok(quote! { -> #ty })
                    }
                    other => Err(Error::Resolution(format!(
                        "future-shaped site with return kind {other:?}"
                    ))),
                }
            }
            ShapeVariant::OptimizedFutureOf(inner) => {
                let ty = parse_type(inner)?;
                Ok(quote! { -> #ty })
            }
        }
    }

    fn self_type(&self) -> Result<syn::Type> {
        let key = &self.site.record.declaration_key;
        let path = key
            .rsplit_once("::")
            .map(|(prefix, _)| prefix.to_string())
            .ok_or_else(|| {
                Error::Resolution(format!("method key `{key}` has no containing type"))
            })?;
        parse_type(&path)
    }

    /// Guards and span re-bound inside a `Box::pin`ned future so they live
    /// until its completion or drop.
    fn capture_moves(&self) -> TokenStream {
        let config = &self.site.record.config;
        let mut moves = TokenStream::new();
        if config.metrics_enabled && config.emit_in_flight {
            moves.extend(quote! { let __inflight = __inflight; });
        }
        if config.tracing_enabled {
            moves.extend(quote! { let mut __span = __span; });
        }
        moves.extend(quote! { let __tags = __tags; });
        moves
    }

    fn span_expr(&self) -> TokenStream {
        if self.site.record.config.tracing_enabled {
            quote! { ::core::option::Option::Some(&mut __span) }
        } else {
            quote! { ::core::option::Option::None }
        }
    }

    fn span_name(&self) -> String {
        let record = &self.site.record;
        record
            .config
            .span_name(&record.containing_type, &record.declaration_name)
    }

    fn metric_base(&self) -> String {
        let record = &self.site.record;
        record
            .config
            .metric_base(&record.containing_type, &record.declaration_name)
    }

    fn emit_calls(&self) -> bool {
        let config = &self.site.record.config;
        config.metrics_enabled && config.emit_calls
    }

    fn emit_duration(&self) -> bool {
        let config = &self.site.record.config;
        config.metrics_enabled && config.emit_duration
    }
}

fn parse_type(tokens: &str) -> Result<syn::Type> {
    syn::parse_str(tokens)
        .map_err(|err| Error::Resolution(format!("unparseable type `{tokens}`: {err}")))
}
