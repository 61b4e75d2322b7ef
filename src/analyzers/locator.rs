//! Call-site location: finds every invocation expression whose target
//! carries an instrumentation annotation.
//!
//! The two annotation kinds are scanned as independent passes, the way the
//! declarations themselves are annotated independently; a call site whose
//! target carries both kinds is therefore discovered twice and collapsed
//! later by the deduplicator.
//!
//! A cheap syntactic pre-filter on the callee's terminal identifier runs
//! before resolution. This is throughput only; resolution against the
//! declaration index is what decides.

use crate::analyzers::scanner::{FunctionDecl, ScanResult};
use crate::core::{CallSiteRecord, SourceLocation};
use log::debug;
use proc_macro2::Span;
use std::collections::HashSet;
use std::path::Path;
use syn::spanned::Spanned;
use syn::visit::Visit;

/// The two independent annotation kinds driving discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Tracing,
    Measurement,
}

/// Locate every invocation of an annotated declaration in one file.
///
/// Runs one pass per annotation kind; the result may contain two records for
/// one physical call site.
pub fn locate_call_sites(file: &syn::File, path: &Path, scan: &ScanResult) -> Vec<CallSiteRecord> {
    let mut records = Vec::new();
    for kind in [AnnotationKind::Tracing, AnnotationKind::Measurement] {
        records.extend(locate_for_kind(file, path, scan, kind));
    }
    records
}

/// Single-kind discovery pass.
pub fn locate_for_kind(
    file: &syn::File,
    path: &Path,
    scan: &ScanResult,
    kind: AnnotationKind,
) -> Vec<CallSiteRecord> {
    let target_names: HashSet<String> = scan
        .annotations
        .iter()
        .filter(|(_, config)| match kind {
            AnnotationKind::Tracing => config.tracing_enabled,
            AnnotationKind::Measurement => config.metrics_enabled,
        })
        .filter_map(|(key, _)| key.rsplit("::").next().map(str::to_string))
        .collect();
    if target_names.is_empty() {
        return Vec::new();
    }

    let mut visitor = CallSiteVisitor {
        file: path,
        scan,
        kind,
        target_names,
        records: Vec::new(),
    };
    visitor.visit_file(file);
    visitor.records
}

fn key_matches_suffix(key: &str, suffix: &str) -> bool {
    key == suffix
        || key
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with("::"))
}

struct CallSiteVisitor<'a> {
    file: &'a Path,
    scan: &'a ScanResult,
    kind: AnnotationKind,
    /// Terminal identifiers of annotated declarations, for the pre-filter.
    target_names: HashSet<String>,
    records: Vec<CallSiteRecord>,
}

impl CallSiteVisitor<'_> {
    fn kind_enabled(&self, decl: &FunctionDecl) -> bool {
        match self.scan.annotations.get(&decl.key) {
            Some(config) => match self.kind {
                AnnotationKind::Tracing => config.tracing_enabled,
                AnnotationKind::Measurement => config.metrics_enabled,
            },
            None => false,
        }
    }

    /// Resolve a path-call against the index: candidates share the terminal
    /// name; the invocation path must be a `::`-boundary suffix of the
    /// declaration key. An exact key match is unambiguous; a suffix shared
    /// by several annotated declarations is skipped, never guessed.
    fn resolve_path_call(&self, segments: &[String]) -> Option<&FunctionDecl> {
        let name = segments.last()?;
        let suffix = segments.join("::");
        let matching: Vec<&FunctionDecl> = self
            .scan
            .index
            .candidates(name)
            .into_iter()
            .filter(|decl| self.kind_enabled(decl))
            .filter(|decl| key_matches_suffix(&decl.key, &suffix))
            .collect();
        match matching.as_slice() {
            [] => None,
            [single] => Some(*single),
            several => {
                if let Some(exact) = several.iter().copied().find(|decl| decl.key == suffix) {
                    return Some(exact);
                }
                debug!(
                    "call `{suffix}` is ambiguous across {} annotated declarations; skipped",
                    several.len()
                );
                None
            }
        }
    }

    /// Resolve a method call. Without full receiver-type inference the call
    /// resolves only when exactly one annotated method carries the name.
    fn resolve_method_call(&self, name: &str) -> Option<&FunctionDecl> {
        let candidates: Vec<_> = self
            .scan
            .index
            .candidates(name)
            .into_iter()
            .filter(|decl| !decl.is_static() && self.kind_enabled(decl))
            .collect();
        match candidates.len() {
            1 => Some(candidates[0]),
            0 => None,
            n => {
                debug!("method call `{name}` is ambiguous across {n} annotated impls; skipped");
                None
            }
        }
    }

    fn push_record(&mut self, decl: &FunctionDecl, span: Span) {
        let config = match self.scan.annotations.get(&decl.key) {
            Some(config) => config.clone(),
            None => return,
        };
        let start = span.start();
        let containing_type = decl
            .containing_type
            .clone()
            .or_else(|| decl.module_path.last().cloned())
            .unwrap_or_else(|| {
                self.file
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "crate".to_string())
            });
        self.records.push(CallSiteRecord {
            location: SourceLocation::new(self.file, start.line, start.column),
            declaration_key: decl.key.clone(),
            declaration_name: decl.name.clone(),
            containing_type,
            is_static: decl.is_static(),
            is_generic_declaration: decl.is_generic,
            receiver: decl.receiver,
            parameters: decl.parameters.clone(),
            has_ref_struct_parameter: decl.has_ref_struct_parameter,
            is_async: decl.is_async,
            return_kind: decl.return_kind.clone(),
            config,
        });
    }
}

impl<'ast> Visit<'ast> for CallSiteVisitor<'_> {
    fn visit_expr_call(&mut self, expr: &'ast syn::ExprCall) {
        if let syn::Expr::Path(path) = &*expr.func {
            let segments: Vec<String> = path
                .path
                .segments
                .iter()
                .map(|seg| seg.ident.to_string())
                .collect();
            if let Some(name) = segments.last() {
                // Pre-filter before resolution.
                if self.target_names.contains(name) {
                    if let Some(decl) = self.resolve_path_call(&segments) {
                        let decl = decl.clone();
                        self.push_record(&decl, expr.func.span());
                    }
                }
            }
        }
        syn::visit::visit_expr_call(self, expr);
    }

    fn visit_expr_method_call(&mut self, expr: &'ast syn::ExprMethodCall) {
        let name = expr.method.to_string();
        if self.target_names.contains(&name) {
            if let Some(decl) = self.resolve_method_call(&name) {
                let decl = decl.clone();
                self.push_record(&decl, expr.method.span());
            }
        }
        syn::visit::visit_expr_method_call(self, expr);
    }
}
