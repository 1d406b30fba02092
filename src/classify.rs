//! Recognises how a target name is exported.

use std::sync::LazyLock;

use regex::Regex;
use swc_core::ecma::ast::*;

use crate::{
    error::UnsupportedShape,
    policy::WrapperPolicy,
    scope::{count_references, module_export_name, BindingKind, ModuleScope},
    target::TargetName,
};

/// Wrapper symbols (`withLoaderWrapper`) and the aliases generated for them
/// (`_withLoaderContextWrapper2`).
static WRAPPER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_?with[A-Z][A-Za-z0-9]*Wrapper\d*$").unwrap());

/// The syntactic form under which a target name is exported.
///
/// `item` is always the index of the export statement in `Module::body`.
#[derive(Debug, Clone)]
pub enum ExportShape {
    /// `export function loader() {}`
    FunctionExport { item: usize },
    /// `export const loader = ...` (also `let` and `var`)
    VariableExport {
        item: usize,
        declarator: usize,
        kind: VarDeclKind,
    },
    /// `export { loader } from "./loader.js"`
    ReexportFrom {
        item: usize,
        slot: usize,
        src: Box<Str>,
        imported: ModuleExportName,
    },
    /// `import { loader } from "./loader.js"; export { loader }`
    ImportedBinding {
        item: usize,
        slot: usize,
        local: Id,
        src: String,
        references: usize,
    },
    /// `function loader() {} export { loader }`
    LocalBinding {
        item: usize,
        slot: usize,
        local: Id,
        decl_item: usize,
    },
    /// `export const loader = _withLoaderWrapper(...)` produced by another pass.
    WrappedExport {
        item: usize,
        declarator: usize,
        kind: VarDeclKind,
        wrapper: String,
    },
}

impl ExportShape {
    /// Source position of the export, for ordering.
    pub fn site(&self) -> (usize, usize) {
        match self {
            ExportShape::FunctionExport { item } => (*item, 0),
            ExportShape::VariableExport {
                item, declarator, ..
            }
            | ExportShape::WrappedExport {
                item, declarator, ..
            } => (*item, *declarator),
            ExportShape::ReexportFrom { item, slot, .. }
            | ExportShape::ImportedBinding { item, slot, .. }
            | ExportShape::LocalBinding { item, slot, .. } => (*item, *slot),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportShape::FunctionExport { .. } => "function export",
            ExportShape::VariableExport { .. } => "variable export",
            ExportShape::ReexportFrom { .. } => "re-export from source",
            ExportShape::ImportedBinding { .. } => "imported binding",
            ExportShape::LocalBinding { .. } => "local binding",
            ExportShape::WrappedExport { .. } => "wrapped export",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Classification {
    Wrap(ExportShape),
    /// Already a call to this policy's wrapper for the same name.
    AlreadyWrapped { wrapper: String },
}

#[derive(Debug, Clone)]
pub struct ClassifiedExport {
    pub target: TargetName,
    pub outcome: Result<Classification, UnsupportedShape>,
}

/// Classifies every target export of `module`, in source order.
///
/// Each target is reported at most once, at its first export site.
pub fn classify_module(
    module: &Module,
    scope: &ModuleScope,
    policy: &WrapperPolicy,
) -> Vec<ClassifiedExport> {
    let mut out: Vec<ClassifiedExport> = vec![];
    let mut push = |target: TargetName, outcome| {
        if out.iter().all(|c| c.target != target) {
            out.push(ClassifiedExport { target, outcome });
        }
    };

    for (item, module_item) in module.body.iter().enumerate() {
        let ModuleItem::ModuleDecl(decl) = module_item else {
            continue;
        };
        match decl {
            ModuleDecl::ExportDecl(export) => match &export.decl {
                Decl::Fn(f) => {
                    if let Some(target) = TargetName::from_export_name(&f.ident.sym) {
                        let outcome = if f.declare || f.function.body.is_none() {
                            Err(UnsupportedShape::new(target.as_str(), "function has no body"))
                        } else {
                            Ok(Classification::Wrap(ExportShape::FunctionExport { item }))
                        };
                        push(target, outcome);
                    }
                }
                Decl::Class(c) => {
                    if let Some(target) = TargetName::from_export_name(&c.ident.sym) {
                        push(
                            target,
                            Err(UnsupportedShape::new(target.as_str(), "class export")),
                        );
                    }
                }
                Decl::Var(var) => {
                    for (declarator, d) in var.decls.iter().enumerate() {
                        match &d.name {
                            Pat::Ident(b) => {
                                let Some(target) = TargetName::from_export_name(&b.id.sym) else {
                                    continue;
                                };
                                let outcome = match &d.init {
                                    Some(init) if !var.declare => Ok(classify_initializer(
                                        init, scope, policy, target, item, declarator, var.kind,
                                    )),
                                    _ => Err(UnsupportedShape::new(
                                        target.as_str(),
                                        "declared without an initializer",
                                    )),
                                };
                                push(target, outcome);
                            }
                            pat => {
                                let ids: Vec<Id> = swc_core::ecma::utils::find_pat_ids(pat);
                                for (sym, _) in ids {
                                    if let Some(target) = TargetName::from_export_name(&sym) {
                                        push(
                                            target,
                                            Err(UnsupportedShape::new(
                                                target.as_str(),
                                                "destructured export",
                                            )),
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            },
            ModuleDecl::ExportNamed(named) if !named.type_only => {
                for (slot, spec) in named.specifiers.iter().enumerate() {
                    match spec {
                        ExportSpecifier::Named(s) if !s.is_type_only => {
                            let exported = s.exported.as_ref().unwrap_or(&s.orig);
                            let Some(target) =
                                TargetName::from_export_name(&module_export_name(exported))
                            else {
                                continue;
                            };
                            let outcome = match &named.src {
                                Some(src) => Ok(Classification::Wrap(ExportShape::ReexportFrom {
                                    item,
                                    slot,
                                    src: src.clone(),
                                    imported: s.orig.clone(),
                                })),
                                None => classify_local(module, scope, target, &s.orig, item, slot),
                            };
                            push(target, outcome);
                        }
                        ExportSpecifier::Namespace(ns) => {
                            if let Some(target) =
                                TargetName::from_export_name(&module_export_name(&ns.name))
                            {
                                push(
                                    target,
                                    Err(UnsupportedShape::new(
                                        target.as_str(),
                                        "namespace re-export",
                                    )),
                                );
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn classify_local(
    module: &Module,
    scope: &ModuleScope,
    target: TargetName,
    orig: &ModuleExportName,
    item: usize,
    slot: usize,
) -> Result<Classification, UnsupportedShape> {
    let ModuleExportName::Ident(orig) = orig else {
        return Err(UnsupportedShape::new(
            target.as_str(),
            "string export name without a source",
        ));
    };
    let Some(binding) = scope.binding(&orig.sym) else {
        return Err(UnsupportedShape::new(
            target.as_str(),
            "exported name has no local binding",
        ));
    };
    let shape = match &binding.kind {
        BindingKind::Import { src, .. } => ExportShape::ImportedBinding {
            item,
            slot,
            local: binding.id.clone(),
            src: src.clone(),
            references: count_references(module, &binding.id),
        },
        _ => ExportShape::LocalBinding {
            item,
            slot,
            local: binding.id.clone(),
            decl_item: binding.item,
        },
    };
    Ok(Classification::Wrap(shape))
}

fn classify_initializer(
    init: &Expr,
    scope: &ModuleScope,
    policy: &WrapperPolicy,
    target: TargetName,
    item: usize,
    declarator: usize,
    kind: VarDeclKind,
) -> Classification {
    let Some((wrapper, src)) = wrapper_call(init, scope) else {
        return Classification::Wrap(ExportShape::VariableExport {
            item,
            declarator,
            kind,
        });
    };
    if wrapper == policy.wrapper_name(target) && src.as_deref() == Some(policy.wrapper_source(target)) {
        return Classification::AlreadyWrapped { wrapper };
    }
    Classification::Wrap(ExportShape::WrappedExport {
        item,
        declarator,
        kind,
        wrapper,
    })
}

/// When `init` calls a wrapper, returns its imported name and source module.
fn wrapper_call(init: &Expr, scope: &ModuleScope) -> Option<(String, Option<String>)> {
    let mut expr = init;
    while let Expr::Paren(p) = expr {
        expr = &p.expr;
    }
    let Expr::Call(call) = expr else {
        return None;
    };
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Ident(callee) = &**callee else {
        return None;
    };
    let (name, src) = match scope.binding(&callee.sym).map(|b| &b.kind) {
        Some(BindingKind::Import { src, imported }) => (imported.clone(), Some(src.clone())),
        _ => (callee.sym.to_string(), None),
    };
    WRAPPER_NAME.is_match(&name).then_some((name, src))
}
