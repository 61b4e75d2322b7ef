//! Declaration scanning: finds annotated functions and builds the
//! declaration index used for call-target and predicate resolution.
//!
//! Scanning is a pure function of the parsed file. The annotation table is
//! an explicit immutable map threaded through the later passes; there is no
//! ambient lookup.

use crate::analyzers::attributes::parse_annotations;
use crate::core::{
    is_stack_only_type, AnnotationConfig, ParameterDescriptor, PassingMode, ReceiverMode,
    ReturnKind,
};
use log::debug;
use quote::ToTokens;
use std::collections::HashMap;
use syn::visit::Visit;

/// `declaration_key -> AnnotationConfig` for every annotated declaration.
pub type AnnotationTable = im::HashMap<String, AnnotationConfig>;

/// Everything the later passes need to know about one function declaration,
/// annotated or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// `module::path::name`, with the impl type as the second-to-last
    /// segment for associated functions.
    pub key: String,
    pub name: String,
    /// Impl type for associated functions.
    pub containing_type: Option<String>,
    pub module_path: Vec<String>,
    pub receiver: Option<ReceiverMode>,
    pub is_async: bool,
    /// Type or const parameters on the declaration.
    pub is_generic: bool,
    pub parameters: Vec<ParameterDescriptor>,
    pub has_ref_struct_parameter: bool,
    pub return_kind: ReturnKind,
}

impl FunctionDecl {
    /// True for declarations without a `self` receiver.
    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }

    /// Callable path for emitted code (`module::Type::method` works through
    /// UFCS for every receiver mode).
    pub fn callable_path(&self) -> String {
        self.key.clone()
    }
}

/// All function declarations of a program, indexed by key and by simple name.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    by_key: HashMap<String, FunctionDecl>,
    by_name: HashMap<String, Vec<String>>,
}

impl DeclarationIndex {
    pub fn insert(&mut self, decl: FunctionDecl) {
        self.by_name
            .entry(decl.name.clone())
            .or_default()
            .push(decl.key.clone());
        self.by_key.insert(decl.key.clone(), decl);
    }

    pub fn get(&self, key: &str) -> Option<&FunctionDecl> {
        self.by_key.get(key)
    }

    /// Declarations sharing a simple name, in discovery order.
    pub fn candidates(&self, name: &str) -> Vec<&FunctionDecl> {
        self.by_name
            .get(name)
            .map(|keys| keys.iter().filter_map(|k| self.by_key.get(k)).collect())
            .unwrap_or_default()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn merge(&mut self, other: DeclarationIndex) {
        for decl in other.by_key.into_values() {
            if !self.by_key.contains_key(&decl.key) {
                self.insert(decl);
            }
        }
    }
}

/// Result of scanning one file: the annotation table plus the declaration
/// index covering every function, annotated or not.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub annotations: AnnotationTable,
    pub index: DeclarationIndex,
}

impl ScanResult {
    pub fn merge(&mut self, other: ScanResult) {
        for (key, config) in other.annotations {
            self.annotations.insert(key, config);
        }
        self.index.merge(other.index);
    }
}

/// Scan one parsed file. Pure; no side effects beyond debug logging.
pub fn scan_file(file: &syn::File) -> ScanResult {
    let mut scanner = DeclarationScanner::default();
    scanner.visit_file(file);
    debug!(
        "scanned {} declarations, {} annotated",
        scanner.result.index.len(),
        scanner.result.annotations.len()
    );
    scanner.result
}

#[derive(Default)]
struct DeclarationScanner {
    module_path: Vec<String>,
    impl_type: Option<String>,
    result: ScanResult,
}

impl DeclarationScanner {
    fn record_function(&mut self, attrs: &[syn::Attribute], sig: &syn::Signature) {
        let name = sig.ident.to_string();
        let mut segments = self.module_path.clone();
        if let Some(impl_type) = &self.impl_type {
            segments.push(impl_type.clone());
        }
        segments.push(name.clone());
        let key = segments.join("::");

        let (receiver, parameters) = extract_parameters(sig);
        let has_ref_struct_parameter = parameters.iter().any(|p| is_stack_only_type(&p.ty));

        let decl = FunctionDecl {
            key: key.clone(),
            name,
            containing_type: self.impl_type.clone(),
            module_path: self.module_path.clone(),
            receiver,
            is_async: sig.asyncness.is_some(),
            is_generic: is_generic_signature(sig),
            parameters,
            has_ref_struct_parameter,
            return_kind: classify_return(&sig.output),
        };
        self.result.index.insert(decl);

        let annotations = parse_annotations(attrs);
        if annotations.is_instrumented() {
            self.result.annotations.insert(key, annotations.into_config());
        }
    }
}

impl<'ast> Visit<'ast> for DeclarationScanner {
    fn visit_item_mod(&mut self, item: &'ast syn::ItemMod) {
        self.module_path.push(item.ident.to_string());
        syn::visit::visit_item_mod(self, item);
        self.module_path.pop();
    }

    fn visit_item_impl(&mut self, item: &'ast syn::ItemImpl) {
        let previous = self.impl_type.take();
        self.impl_type = impl_type_name(item);
        syn::visit::visit_item_impl(self, item);
        self.impl_type = previous;
    }

    fn visit_item_fn(&mut self, item: &'ast syn::ItemFn) {
        self.record_function(&item.attrs, &item.sig);
        syn::visit::visit_item_fn(self, item);
    }

    fn visit_impl_item_fn(&mut self, item: &'ast syn::ImplItemFn) {
        self.record_function(&item.attrs, &item.sig);
        syn::visit::visit_impl_item_fn(self, item);
    }
}

fn impl_type_name(item: &syn::ItemImpl) -> Option<String> {
    match &*item.self_ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string()),
        _ => None,
    }
}

fn is_generic_signature(sig: &syn::Signature) -> bool {
    sig.generics.params.iter().any(|param| {
        matches!(
            param,
            syn::GenericParam::Type(_) | syn::GenericParam::Const(_)
        )
    })
}

fn extract_parameters(sig: &syn::Signature) -> (Option<ReceiverMode>, Vec<ParameterDescriptor>) {
    let mut receiver = None;
    let mut parameters = Vec::new();
    for input in &sig.inputs {
        match input {
            syn::FnArg::Receiver(recv) => {
                receiver = Some(match (&recv.reference, &recv.mutability) {
                    (None, _) => ReceiverMode::Value,
                    (Some(_), Some(_)) => ReceiverMode::Exclusive,
                    (Some(_), None) => ReceiverMode::Shared,
                });
            }
            syn::FnArg::Typed(pat_type) => {
                let name = match &*pat_type.pat {
                    syn::Pat::Ident(ident) => ident.ident.to_string(),
                    _ => format!("_arg{}", parameters.len()),
                };
                parameters.push(ParameterDescriptor {
                    name,
                    ty: render_type(&pat_type.ty),
                    passing_mode: passing_mode(&pat_type.ty),
                    is_variadic: false,
                });
            }
        }
    }
    if let Some(variadic) = &sig.variadic {
        parameters.push(ParameterDescriptor {
            name: "_variadic".to_string(),
            ty: variadic.to_token_stream().to_string(),
            passing_mode: PassingMode::Value,
            is_variadic: true,
        });
    }
    (receiver, parameters)
}

fn passing_mode(ty: &syn::Type) -> PassingMode {
    match ty {
        syn::Type::Reference(reference) => {
            if reference.mutability.is_some() {
                PassingMode::Ref
            } else {
                PassingMode::In
            }
        }
        _ => PassingMode::Value,
    }
}

/// Normalized token text of a type.
pub fn render_type(ty: &syn::Type) -> String {
    ty.to_token_stream().to_string()
}

/// Structural classification of a declared return.
pub fn classify_return(output: &syn::ReturnType) -> ReturnKind {
    let ty = match output {
        syn::ReturnType::Default => return ReturnKind::Unit,
        syn::ReturnType::Type(_, ty) => ty,
    };
    match &**ty {
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => ReturnKind::Unit,
        _ => {
            if let Some(inner) = boxed_future_inner(ty) {
                ReturnKind::BoxedFuture {
                    inner,
                    tokens: render_type(ty),
                }
            } else {
                ReturnKind::Plain(render_type(ty))
            }
        }
    }
}

/// Recognizes the two erased-handle spellings: `BoxFuture<'_, T>` and
/// `Pin<Box<dyn Future<Output = T> + ..>>`. Returns `Some(inner)` with
/// `inner = None` for a `()` output, or `None` when the type is not an
/// erased future handle at all.
fn boxed_future_inner(ty: &syn::Type) -> Option<Option<String>> {
    let path = match ty {
        syn::Type::Path(type_path) => &type_path.path,
        _ => return None,
    };
    let last = path.segments.last()?;
    match last.ident.to_string().as_str() {
        "BoxFuture" | "LocalBoxFuture" => {
            let args = angle_args(last)?;
            let inner = args.iter().find_map(|arg| match arg {
                syn::GenericArgument::Type(t) => Some(t),
                _ => None,
            })?;
            Some(non_unit(inner))
        }
        "Pin" => {
            let args = angle_args(last)?;
            let boxed = args.iter().find_map(|arg| match arg {
                syn::GenericArgument::Type(t) => Some(t),
                _ => None,
            })?;
            let syn::Type::Path(box_path) = boxed else {
                return None;
            };
            let box_seg = box_path.path.segments.last()?;
            if box_seg.ident != "Box" {
                return None;
            }
            let box_args = angle_args(box_seg)?;
            let obj = box_args.iter().find_map(|arg| match arg {
                syn::GenericArgument::Type(syn::Type::TraitObject(obj)) => Some(obj),
                _ => None,
            })?;
            for bound in &obj.bounds {
                let syn::TypeParamBound::Trait(trait_bound) = bound else {
                    continue;
                };
                let seg = trait_bound.path.segments.last()?;
                if seg.ident != "Future" {
                    continue;
                }
                let future_args = angle_args(seg)?;
                for arg in future_args {
                    if let syn::GenericArgument::AssocType(assoc) = arg {
                        if assoc.ident == "Output" {
                            return Some(non_unit(&assoc.ty));
                        }
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn angle_args(
    segment: &syn::PathSegment,
) -> Option<&syn::punctuated::Punctuated<syn::GenericArgument, syn::Token![,]>> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => Some(&args.args),
        _ => None,
    }
}

fn non_unit(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => None,
        _ => Some(render_type(ty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn scan(source: &str) -> ScanResult {
        scan_file(&syn::parse_str(source).unwrap())
    }

    #[test]
    fn free_functions_are_keyed_by_module_path() {
        let result = scan(indoc! {r#"
            mod orders {
                #[traced]
                pub fn submit(order: u32) -> bool { order > 0 }
            }
        "#});
        assert!(result.annotations.contains_key("orders::submit"));
        let decl = result.index.get("orders::submit").unwrap();
        assert_eq!(decl.module_path, vec!["orders".to_string()]);
        assert!(decl.is_static());
        assert_eq!(decl.return_kind, ReturnKind::Plain("bool".to_string()));
    }

    #[test]
    fn methods_carry_the_impl_type_in_the_key() {
        let result = scan(indoc! {r#"
            struct Orders;
            impl Orders {
                #[measured]
                fn submit(&mut self, order: u32) {}
            }
        "#});
        let decl = result.index.get("Orders::submit").unwrap();
        assert_eq!(decl.containing_type.as_deref(), Some("Orders"));
        assert_eq!(decl.receiver, Some(ReceiverMode::Exclusive));
        assert!(!decl.is_static());
        assert_eq!(decl.return_kind, ReturnKind::Unit);
    }

    #[test]
    fn unannotated_declarations_land_in_the_index_only() {
        let result = scan("fn helper(x: u32) -> bool { x > 0 }");
        assert!(result.annotations.is_empty());
        assert!(result.index.contains_name("helper"));
    }

    #[test]
    fn generic_signatures_are_flagged() {
        let result = scan("#[traced] fn lookup<T>(value: T) {}");
        assert!(result.index.get("lookup").unwrap().is_generic);
        // Lifetimes alone do not make a declaration generic.
        let result = scan("#[traced] fn borrow<'a>(value: &'a str) {}");
        assert!(!result.index.get("borrow").unwrap().is_generic);
    }

    #[test]
    fn stack_only_parameters_are_detected() {
        let result = scan("#[traced] async fn send(buf: &[u8]) {}");
        let decl = result.index.get("send").unwrap();
        assert!(decl.has_ref_struct_parameter);
        assert!(decl.is_async);
    }

    #[test]
    fn boxed_future_returns_are_recognized() {
        let result = scan(indoc! {r#"
            fn fetch() -> BoxFuture<'static, u32> { unimplemented!() }
            fn flush() -> BoxFuture<'static, ()> { unimplemented!() }
            fn poll() -> Pin<Box<dyn Future<Output = String> + Send>> { unimplemented!() }
        "#});
        assert_eq!(
            result.index.get("fetch").unwrap().return_kind,
            ReturnKind::BoxedFuture {
                inner: Some("u32".to_string()),
                tokens: "BoxFuture < 'static , u32 >".to_string(),
            }
        );
        assert!(matches!(
            result.index.get("flush").unwrap().return_kind,
            ReturnKind::BoxedFuture { inner: None, .. }
        ));
        assert!(matches!(
            result.index.get("poll").unwrap().return_kind,
            ReturnKind::BoxedFuture { inner: Some(ref t), .. } if t == "String"
        ));
    }

    #[test]
    fn passing_modes_follow_the_borrow_shape() {
        let result = scan("fn f(a: u32, b: &str, c: &mut Vec<u8>) {}");
        let decl = result.index.get("f").unwrap();
        let modes: Vec<_> = decl.parameters.iter().map(|p| p.passing_mode).collect();
        assert_eq!(
            modes,
            vec![PassingMode::Value, PassingMode::In, PassingMode::Ref]
        );
    }

    #[test]
    fn merge_unions_annotations_and_declarations() {
        let mut first = scan("#[traced] fn a() {}");
        let second = scan("#[measured] fn b() {}");
        first.merge(second);
        assert_eq!(first.annotations.len(), 2);
        assert!(first.index.contains_name("a"));
        assert!(first.index.contains_name("b"));
    }
}
