//! Compatibility validation: rejects unsupported call shapes and resolves
//! error-classification predicates.
//!
//! Three failure classes, each with its own blast radius:
//! - generic target (OTEL001) and stack-only parameter on an async target
//!   (OTEL002) exclude the site from emission;
//! - an unresolved `error_when` predicate (OTEL003) degrades the site to
//!   default classification but still emits.
//!
//! No condition aborts the pass; degradation is always per-site.

use crate::analyzers::scanner::{DeclarationIndex, FunctionDecl};
use crate::core::{CallSiteRecord, Diagnostic, ReturnKind};
use log::debug;
use serde::{Deserialize, Serialize};

/// A resolved success/failure classification predicate.
///
/// The predicate is a static declaration returning `bool` whose single
/// parameter is the effective success type taken by shared borrow; emitted
/// code invokes it as `path(&value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPredicate {
    pub callable_path: String,
    pub parameter_type: String,
}

/// A call site that survived validation, with its optional predicate.
#[derive(Debug, Clone)]
pub struct ValidatedCallSite {
    pub record: CallSiteRecord,
    pub predicate: Option<ResolvedPredicate>,
}

/// Accepted sites plus the diagnostic stream for one pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<ValidatedCallSite>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Validate candidate records against the declaration index.
pub fn validate(records: Vec<CallSiteRecord>, index: &DeclarationIndex) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for record in records {
        validate_record(record, index, &mut outcome);
    }
    outcome
}

fn validate_record(
    record: CallSiteRecord,
    index: &DeclarationIndex,
    outcome: &mut ValidationOutcome,
) {
    if record.is_generic_declaration {
        outcome.diagnostics.push(Diagnostic::generic_target(
            record.location.clone(),
            &record.declaration_key,
        ));
        return;
    }

    if is_async_variant(&record) && record.has_ref_struct_parameter {
        let parameter = record
            .first_stack_only_parameter()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "<unknown>".to_string());
        outcome.diagnostics.push(Diagnostic::stack_only_parameter(
            record.location.clone(),
            &record.declaration_key,
            &parameter,
        ));
        return;
    }

    let predicate = match &record.config.error_when {
        Some(name) => match resolve_predicate(name, &record, index) {
            Some(predicate) => Some(predicate),
            None => {
                outcome.diagnostics.push(Diagnostic::unresolved_predicate(
                    record.location.clone(),
                    name,
                    &record.declaration_key,
                ));
                None
            }
        },
        None => None,
    };

    outcome.accepted.push(ValidatedCallSite { record, predicate });
}

/// True for the four asynchronous calling-convention variants.
fn is_async_variant(record: &CallSiteRecord) -> bool {
    record.is_async || matches!(record.return_kind, ReturnKind::BoxedFuture { .. })
}

/// The value type a classification predicate must accept: the inner type
/// for result-carrying future handles, the declared return type for plain
/// values, nothing for the valueless shapes. An `async fn` returning an
/// erased handle yields that handle as its result value, matching the shape
/// classifier.
pub fn effective_success_type(record: &CallSiteRecord) -> Option<String> {
    if record.is_async {
        match &record.return_kind {
            ReturnKind::Plain(ty) => Some(ty.clone()),
            ReturnKind::BoxedFuture { tokens, .. } => Some(tokens.clone()),
            ReturnKind::Unit => None,
        }
    } else {
        match &record.return_kind {
            ReturnKind::Plain(ty) => Some(ty.clone()),
            ReturnKind::BoxedFuture { inner, .. } => inner.clone(),
            ReturnKind::Unit => None,
        }
    }
}

fn resolve_predicate(
    name: &str,
    record: &CallSiteRecord,
    index: &DeclarationIndex,
) -> Option<ResolvedPredicate> {
    let effective = effective_success_type(record)?;
    let candidate = index
        .candidates(name)
        .into_iter()
        .find(|decl| predicate_matches(decl, &effective));
    match candidate {
        Some(decl) => Some(ResolvedPredicate {
            callable_path: decl.callable_path(),
            parameter_type: effective,
        }),
        None => {
            debug!(
                "predicate `{name}` did not resolve against effective type `{effective}` \
                 for `{}`",
                record.declaration_key
            );
            None
        }
    }
}

fn predicate_matches(decl: &FunctionDecl, effective: &str) -> bool {
    if !decl.is_static() || decl.is_generic || decl.is_async {
        return false;
    }
    if !matches!(&decl.return_kind, ReturnKind::Plain(ty) if ty == "bool") {
        return false;
    }
    let [parameter] = decl.parameters.as_slice() else {
        return false;
    };
    if parameter.is_variadic {
        return false;
    }
    // The single parameter must be the effective type by shared borrow.
    let param = normalize(&parameter.ty);
    let expected = format!("&{}", normalize(effective));
    param == expected
}

fn normalize(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_whitespace()).collect()
}
