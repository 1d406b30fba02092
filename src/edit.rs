//! Deferred structural edits over a module body.
//!
//! Edits are collected while the module is being inspected and applied in one
//! go afterwards, so nothing ever inspects a body that is being rewritten.

use std::collections::HashMap;

use swc_core::{
    common::{BytePos, SyntaxContext, DUMMY_SP},
    ecma::ast::*,
};

use crate::{
    error::{Result, TransformError},
    scope::{module_export_name, rename},
};

#[derive(Debug, Clone)]
pub enum DeferredEdit {
    /// Rename a top-level binding and all of its references.
    Rename { from: Id, to: String },
    /// Turn `export function N() {}` into `export const N = wrapper(function N() {}, routeId)`.
    WrapFunction { item: usize, wrapper: Ident },
    /// Replace the initializer `init` of a declarator with `wrapper(init, routeId)`.
    WrapInitializer {
        item: usize,
        declarator: usize,
        wrapper: Ident,
    },
    /// Drop the specifier exported as `exported` from `export { ... }`; the
    /// statement goes away once no specifier is left.
    RemoveSpecifier { item: usize, exported: String },
    InsertBefore { item: usize, stmt: ModuleItem },
    InsertAfter { item: usize, stmt: ModuleItem },
}

/// Applies `edits` to `module`, then inserts `prelude` at the top of the body,
/// below any directives (`"use client"`, `"use strict"`, ...).
///
/// Every edit is checked against the body before anything is touched, so an
/// `Err` leaves the module as it was. Renames run first, over the untouched
/// tree, so statements created by other edits are never renamed.
pub fn apply_edits(
    module: &mut Module,
    edits: Vec<DeferredEdit>,
    route_id: &str,
    prelude: Vec<ModuleItem>,
) -> Result<()> {
    for edit in &edits {
        check_edit(&module.body, edit)?;
    }

    let mut wraps: HashMap<usize, Vec<DeferredEdit>> = HashMap::new();
    let mut removals: HashMap<usize, Vec<String>> = HashMap::new();
    let mut before: HashMap<usize, Vec<ModuleItem>> = HashMap::new();
    let mut after: HashMap<usize, Vec<ModuleItem>> = HashMap::new();

    for edit in edits {
        match edit {
            DeferredEdit::Rename { from, to } => rename(module, &from, &to),
            DeferredEdit::WrapFunction { item, .. } | DeferredEdit::WrapInitializer { item, .. } => {
                wraps.entry(item).or_default().push(edit)
            }
            DeferredEdit::RemoveSpecifier { item, exported } => {
                removals.entry(item).or_default().push(exported)
            }
            DeferredEdit::InsertBefore { item, stmt } => before.entry(item).or_default().push(stmt),
            DeferredEdit::InsertAfter { item, stmt } => after.entry(item).or_default().push(stmt),
        }
    }

    let directives = directive_count(&module.body);
    if directives == 0 && !prelude.is_empty() {
        // The module span starts at the first statement; without this its
        // leading comments would be printed above the prelude.
        module.span = module.span.with_lo(BytePos::DUMMY);
    }

    let old = std::mem::take(&mut module.body);
    let mut body = Vec::with_capacity(prelude.len() + old.len() + after.len());
    let mut prelude = Some(prelude);
    for (idx, mut module_item) in old.into_iter().enumerate() {
        if idx == directives {
            body.extend(prelude.take().unwrap_or_default());
        }
        body.extend(before.remove(&idx).unwrap_or_default());

        for edit in wraps.remove(&idx).unwrap_or_default() {
            wrap_item(&mut module_item, edit, route_id)?;
        }

        let keep = match removals.remove(&idx) {
            Some(names) => remove_specifiers(&mut module_item, &names)?,
            None => true,
        };
        if keep {
            body.push(module_item);
        }

        body.extend(after.remove(&idx).unwrap_or_default());
    }
    // A body made only of directives.
    body.extend(prelude.take().unwrap_or_default());
    module.body = body;
    Ok(())
}

/// Number of leading directive statements.
fn directive_count(body: &[ModuleItem]) -> usize {
    body.iter()
        .take_while(|item| {
            matches!(
                item,
                ModuleItem::Stmt(Stmt::Expr(ExprStmt { expr, .. })) if matches!(&**expr, Expr::Lit(Lit::Str(_)))
            )
        })
        .count()
}

/// Rejects an edit that does not fit the statement it points at.
fn check_edit(body: &[ModuleItem], edit: &DeferredEdit) -> Result<()> {
    let item = match edit {
        DeferredEdit::Rename { .. } => return Ok(()),
        DeferredEdit::WrapFunction { item, .. }
        | DeferredEdit::WrapInitializer { item, .. }
        | DeferredEdit::RemoveSpecifier { item, .. }
        | DeferredEdit::InsertBefore { item, .. }
        | DeferredEdit::InsertAfter { item, .. } => *item,
    };
    let Some(target) = body.get(item) else {
        return Err(TransformError::invariant(format!(
            "edit targets statement {item} of a {}-statement module",
            body.len()
        )));
    };
    let fits = match (edit, target) {
        (DeferredEdit::WrapFunction { .. }, ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export))) => {
            matches!(export.decl, Decl::Fn(_))
        }
        (
            DeferredEdit::WrapInitializer { declarator, .. },
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)),
        ) => match &export.decl {
            Decl::Var(var) => var.decls.get(*declarator).is_some_and(|d| d.init.is_some()),
            _ => false,
        },
        (DeferredEdit::RemoveSpecifier { .. }, ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(_))) => true,
        (DeferredEdit::InsertBefore { .. } | DeferredEdit::InsertAfter { .. }, _) => true,
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(TransformError::invariant(format!(
            "edit {edit:?} does not fit statement {item}"
        )))
    }
}

fn wrap_item(module_item: &mut ModuleItem, edit: DeferredEdit, route_id: &str) -> Result<()> {
    let ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) = module_item else {
        return Err(TransformError::invariant("wrap edit on a non-export statement"));
    };
    match edit {
        DeferredEdit::WrapFunction { wrapper, .. } => {
            let Decl::Fn(f) = &export.decl else {
                return Err(TransformError::invariant("function wrap on a non-function export"));
            };
            let ident = f.ident.clone();
            let value = Box::new(Expr::Fn(FnExpr {
                ident: Some(f.ident.clone()),
                function: f.function.clone(),
            }));
            export.decl = const_decl(ident, wrap_call(&wrapper, value, route_id));
        }
        DeferredEdit::WrapInitializer {
            declarator, wrapper, ..
        } => {
            let Decl::Var(var) = &mut export.decl else {
                return Err(TransformError::invariant("initializer wrap on a non-variable export"));
            };
            let init = var
                .decls
                .get_mut(declarator)
                .and_then(|d| d.init.as_mut())
                .ok_or_else(|| TransformError::invariant("wrapped declarator has no initializer"))?;
            let value = std::mem::replace(init, Box::new(Expr::Invalid(Invalid { span: DUMMY_SP })));
            *init = wrap_call(&wrapper, value, route_id);
        }
        _ => return Err(TransformError::invariant("not a wrap edit")),
    }
    Ok(())
}

/// Returns whether the statement still exports anything.
fn remove_specifiers(module_item: &mut ModuleItem, names: &[String]) -> Result<bool> {
    let ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) = module_item else {
        return Err(TransformError::invariant("specifier removal on a non export-list statement"));
    };
    named.specifiers.retain(|spec| match spec {
        ExportSpecifier::Named(s) => {
            let exported = module_export_name(s.exported.as_ref().unwrap_or(&s.orig));
            !names.contains(&exported)
        }
        _ => true,
    });
    Ok(!named.specifiers.is_empty())
}

// -----------------------------------------------------------------------------
// Node builders
// -----------------------------------------------------------------------------

/// `wrapper(value, "routeId")`
pub fn wrap_call(wrapper: &Ident, value: Box<Expr>, route_id: &str) -> Box<Expr> {
    Box::new(Expr::Call(CallExpr {
        span: DUMMY_SP,
        callee: Callee::Expr(Box::new(Expr::Ident(wrapper.clone()))),
        args: vec![
            ExprOrSpread {
                spread: None,
                expr: value,
            },
            ExprOrSpread {
                spread: None,
                expr: Box::new(Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: route_id.into(),
                    raw: None,
                }))),
            },
        ],
        type_args: None,
        ctxt: SyntaxContext::empty(),
    }))
}

fn const_decl(name: Ident, init: Box<Expr>) -> Decl {
    Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        kind: VarDeclKind::Const,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent {
                id: name,
                type_ann: None,
            }),
            init: Some(init),
            definite: false,
        }],
        ctxt: SyntaxContext::empty(),
    }))
}

/// `export const name = init;`
pub fn export_const(name: &str, init: Box<Expr>) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
        span: DUMMY_SP,
        decl: const_decl(
            Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty()),
            init,
        ),
    }))
}

/// `import { imported as local, ... } from "src";`
pub fn import_named(specifiers: Vec<(ModuleExportName, Ident)>, src: Box<Str>) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
        span: DUMMY_SP,
        specifiers: specifiers
            .into_iter()
            .map(|(imported, local)| {
                ImportSpecifier::Named(ImportNamedSpecifier {
                    span: DUMMY_SP,
                    local,
                    imported: Some(imported),
                    is_type_only: false,
                })
            })
            .collect(),
        src,
        type_only: false,
        with: None,
        phase: ImportPhase::Evaluation,
    }))
}

/// A string literal for a module path.
pub fn module_path(src: &str) -> Box<Str> {
    Box::new(Str {
        span: DUMMY_SP,
        value: src.into(),
        raw: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scope::ModuleScope,
        syntax::{parse, print, with_globals},
    };

    fn strip(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn ident(name: &str) -> Ident {
        Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty())
    }

    fn run(source: &str, edits: Vec<DeferredEdit>) -> Result<String> {
        with_globals(|| -> Result<String> {
            let mut parsed = parse(source, "/route.js").unwrap();
            apply_edits(&mut parsed.module, edits, "route", vec![])?;
            Ok(strip(&print(&parsed, false).unwrap().code))
        })
    }

    #[test]
    fn wraps_function_export_as_const_expression() {
        let out = run(
            "export async function* loader(a, b) { yield a; }",
            vec![DeferredEdit::WrapFunction {
                item: 0,
                wrapper: ident("_w"),
            }],
        )
        .unwrap();
        assert_eq!(
            out,
            r#"exportconstloader=_w(asyncfunction*loader(a,b){yielda;},"route");"#
        );
    }

    #[test]
    fn wraps_initializer_and_keeps_mutability() {
        let out = run(
            "export var a = 1, action = () => 2;",
            vec![DeferredEdit::WrapInitializer {
                item: 0,
                declarator: 1,
                wrapper: ident("_w"),
            }],
        )
        .unwrap();
        assert_eq!(out, r#"exportvara=1,action=_w(()=>2,"route");"#);
    }

    #[test]
    fn removes_emptied_export_lists_and_inserts_around_them() {
        let out = run(
            r#"export { loader } from "./a.js"; export { x, action } from "./b.js"; const x = 1;"#,
            vec![
                DeferredEdit::RemoveSpecifier {
                    item: 0,
                    exported: "loader".into(),
                },
                DeferredEdit::RemoveSpecifier {
                    item: 1,
                    exported: "action".into(),
                },
                DeferredEdit::InsertBefore {
                    item: 1,
                    stmt: export_const("before", Box::new(Expr::Ident(ident("x")))),
                },
                DeferredEdit::InsertAfter {
                    item: 1,
                    stmt: export_const("after", Box::new(Expr::Ident(ident("x")))),
                },
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            r#"exportconstbefore=x;export{x}from"./b.js";exportconstafter=x;constx=1;"#
        );
    }

    #[test]
    fn mismatched_edits_are_invariant_violations() {
        let err = run(
            "const loader = 1;",
            vec![DeferredEdit::WrapFunction {
                item: 0,
                wrapper: ident("_w"),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Invariant(_)));

        let err = run(
            "const loader = 1;",
            vec![DeferredEdit::RemoveSpecifier {
                item: 4,
                exported: "loader".into(),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Invariant(_)));
    }

    #[test]
    fn failed_edits_leave_the_module_untouched() {
        with_globals(|| {
            let source = "import { loader } from \"./x.js\";\nexport const a = loader;";
            let mut parsed = parse(source, "/route.js").unwrap();
            let before = strip(&print(&parsed, false).unwrap().code);
            let id = ModuleScope::analyze(&parsed.module)
                .binding("loader")
                .unwrap()
                .id
                .clone();

            let err = apply_edits(
                &mut parsed.module,
                vec![
                    DeferredEdit::Rename {
                        from: id,
                        to: "_loader".into(),
                    },
                    DeferredEdit::WrapInitializer {
                        item: 1,
                        declarator: 3,
                        wrapper: ident("_w"),
                    },
                ],
                "route",
                vec![import_named(vec![], module_path("./w.js"))],
            )
            .unwrap_err();
            assert!(matches!(err, TransformError::Invariant(_)));
            assert_eq!(strip(&print(&parsed, false).unwrap().code), before);
        });
    }

    #[test]
    fn prelude_goes_below_directives_and_above_leading_comments() {
        with_globals(|| {
            let prelude = || {
                vec![import_named(
                    vec![(ModuleExportName::Ident(ident("w")), ident("_w"))],
                    module_path("./w.js"),
                )]
            };

            let mut parsed = parse("\"use client\";\n'use strict';\nexport const a = 1;", "/route.js").unwrap();
            apply_edits(&mut parsed.module, vec![], "route", prelude()).unwrap();
            assert_eq!(
                strip(&print(&parsed, false).unwrap().code),
                r#""useclient";'usestrict';import{was_w}from"./w.js";exportconsta=1;"#
            );

            let mut parsed = parse("/** docs */\nexport const a = 1;", "/route.js").unwrap();
            apply_edits(&mut parsed.module, vec![], "route", prelude()).unwrap();
            assert_eq!(
                strip(&print(&parsed, false).unwrap().code),
                r#"import{was_w}from"./w.js";/**docs*/exportconsta=1;"#
            );
        });
    }
}
