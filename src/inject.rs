//! Wrapper injection engine.
//!
//! Classifies every target export of a module, plans one rewrite per export as
//! [`DeferredEdit`]s and applies them in a single step once planning is done.
//! Wrapper imports and re-export imports are inserted last, below any
//! directive prologue.

use std::collections::HashMap;

use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::ast::*,
};
use tracing::debug;

use crate::{
    classify::{classify_module, Classification, ClassifiedExport, ExportShape},
    edit::{apply_edits, export_const, import_named, module_path, wrap_call, DeferredEdit},
    error::{Result, TransformError, UnsupportedShape},
    policy::WrapperPolicy,
    scope::{ModuleScope, UidGenerator},
    target::TargetName,
};

/// A wrapper symbol imported under a fresh local alias.
#[derive(Debug, Clone)]
pub struct WrapperRequest {
    pub target: TargetName,
    pub imported: String,
    pub source: String,
    pub local: Ident,
}

/// `import { imported as local } from "src"`, added for re-exported targets.
#[derive(Debug, Clone)]
pub struct PendingImport {
    pub imported: ModuleExportName,
    pub local: Ident,
    pub src: Box<Str>,
}

/// What one invocation did, per target export.
#[derive(Debug, Default, Clone)]
pub struct InjectionReport {
    /// Wrapped targets with the shape they were found in.
    pub wrapped: Vec<(TargetName, &'static str)>,
    /// Targets already wrapped by the same policy.
    pub already_wrapped: Vec<TargetName>,
    pub skipped: Vec<UnsupportedShape>,
}

impl InjectionReport {
    /// True when the module was not modified.
    pub fn is_noop(&self) -> bool {
        self.wrapped.is_empty()
    }
}

pub struct WrapperInjector<'a> {
    policy: &'a WrapperPolicy,
    route_id: &'a str,
    uids: UidGenerator,
    requests: Vec<WrapperRequest>,
    pending: Vec<PendingImport>,
    /// Top-level bindings moved out of the way, keyed by their original id.
    renamed: HashMap<Id, Ident>,
    edits: Vec<DeferredEdit>,
}

impl<'a> WrapperInjector<'a> {
    pub fn new(policy: &'a WrapperPolicy, route_id: &'a str) -> Self {
        Self {
            policy,
            route_id,
            uids: UidGenerator::default(),
            requests: vec![],
            pending: vec![],
            renamed: HashMap::new(),
            edits: vec![],
        }
    }

    /// Rewrites every supported target export of `module`.
    ///
    /// The module is left untouched when nothing gets wrapped or when an error
    /// is returned.
    pub fn run(mut self, module: &mut Module) -> Result<InjectionReport> {
        let scope = ModuleScope::analyze(module);
        self.uids = UidGenerator::new(scope.names().clone());

        let mut report = InjectionReport::default();
        let mut wraps = vec![];
        for ClassifiedExport { target, outcome } in classify_module(module, &scope, self.policy) {
            match outcome {
                Ok(Classification::Wrap(shape)) => wraps.push((target, shape)),
                Ok(Classification::AlreadyWrapped { wrapper }) => {
                    debug!(%target, %wrapper, "export already wrapped, leaving it alone");
                    report.already_wrapped.push(target);
                }
                Err(unsupported) => {
                    debug!(%target, reason = unsupported.reason, "skipping unsupported export");
                    report.skipped.push(unsupported);
                }
            }
        }
        if wraps.is_empty() {
            return Ok(report);
        }

        // Renames are planned before any wrapped value is built so that every
        // generated statement refers to a binding's final name.
        for (target, shape) in &wraps {
            self.reserve_export_name(*target, shape, &scope);
        }
        for (target, shape) in wraps {
            let label = shape.label();
            debug!(%target, shape = label, "wrapping export");
            self.rewrite(target, shape)?;
            report.wrapped.push((target, label));
        }

        let prelude = self.imports();
        apply_edits(module, self.edits, self.route_id, prelude)?;
        Ok(report)
    }

    /// Shapes C, D and E add a new `export const N`; any other top-level
    /// binding named `N` has to move first.
    fn reserve_export_name(&mut self, target: TargetName, shape: &ExportShape, scope: &ModuleScope) {
        let name = target.as_str();
        match shape {
            ExportShape::ImportedBinding { local, .. } | ExportShape::LocalBinding { local, .. }
                if &*local.0 == name =>
            {
                self.rename_binding(local);
            }
            ExportShape::ReexportFrom { .. }
            | ExportShape::ImportedBinding { .. }
            | ExportShape::LocalBinding { .. } => {
                if let Some(binding) = scope.binding(name) {
                    self.rename_binding(&binding.id);
                }
            }
            _ => {}
        }
    }

    fn rename_binding(&mut self, id: &Id) {
        if self.renamed.contains_key(id) {
            return;
        }
        let alias = self.uids.generate(&id.0);
        debug!(from = %id.0, to = %alias.sym, "renaming binding");
        self.edits.push(DeferredEdit::Rename {
            from: id.clone(),
            to: alias.sym.to_string(),
        });
        self.renamed.insert(id.clone(), alias);
    }

    /// The current name of a top-level binding.
    fn local_value(&self, id: &Id) -> Box<Expr> {
        let ident = self
            .renamed
            .get(id)
            .cloned()
            .unwrap_or_else(|| Ident::new(id.0.clone(), DUMMY_SP, id.1));
        Box::new(Expr::Ident(ident))
    }

    fn wrapper(&mut self, target: TargetName) -> Result<Ident> {
        if self.requests.iter().any(|r| r.target == target) {
            return Err(TransformError::invariant(format!(
                "wrapper for `{target}` requested twice"
            )));
        }
        let imported = self.policy.wrapper_name(target);
        let local = self.uids.generate(&imported);
        self.requests.push(WrapperRequest {
            target,
            source: self.policy.wrapper_source(target).to_string(),
            imported,
            local: local.clone(),
        });
        Ok(local)
    }

    fn rewrite(&mut self, target: TargetName, shape: ExportShape) -> Result<()> {
        let name = target.as_str();
        let wrapper = self.wrapper(target)?;
        match shape {
            ExportShape::FunctionExport { item } => {
                self.edits.push(DeferredEdit::WrapFunction { item, wrapper });
            }
            ExportShape::VariableExport {
                item, declarator, ..
            }
            | ExportShape::WrappedExport {
                item, declarator, ..
            } => {
                self.edits.push(DeferredEdit::WrapInitializer {
                    item,
                    declarator,
                    wrapper,
                });
            }
            ExportShape::ReexportFrom {
                item, src, imported, ..
            } => {
                let alias = self.uids.generate(name);
                self.pending.push(PendingImport {
                    imported,
                    local: alias.clone(),
                    src,
                });
                let value = wrap_call(&wrapper, Box::new(Expr::Ident(alias)), self.route_id);
                self.edits.push(DeferredEdit::InsertBefore {
                    item,
                    stmt: export_const(name, value),
                });
                self.edits.push(DeferredEdit::RemoveSpecifier {
                    item,
                    exported: name.to_string(),
                });
            }
            ExportShape::ImportedBinding {
                item,
                local,
                references,
                ..
            } => {
                debug!(%target, references, "repointing local uses of imported binding");
                self.export_wrapped_local(name, &wrapper, item, item, &local);
            }
            ExportShape::LocalBinding {
                item,
                local,
                decl_item,
                ..
            } => {
                // A `const` declared below its export list must be initialised
                // before the wrapped export reads it.
                self.export_wrapped_local(name, &wrapper, item, item.max(decl_item), &local);
            }
        }
        Ok(())
    }

    fn export_wrapped_local(&mut self, name: &str, wrapper: &Ident, item: usize, after: usize, local: &Id) {
        let value = wrap_call(wrapper, self.local_value(local), self.route_id);
        self.edits.push(DeferredEdit::RemoveSpecifier {
            item,
            exported: name.to_string(),
        });
        self.edits.push(DeferredEdit::InsertAfter {
            item: after,
            stmt: export_const(name, value),
        });
    }

    /// One wrapper import per wrapper source, in first-use order, followed by
    /// the re-export imports in request order.
    fn imports(&self) -> Vec<ModuleItem> {
        let mut by_source: Vec<(&str, Vec<(ModuleExportName, Ident)>)> = vec![];
        for request in &self.requests {
            let specifier = (
                ModuleExportName::Ident(Ident::new(
                    request.imported.as_str().into(),
                    DUMMY_SP,
                    SyntaxContext::empty(),
                )),
                request.local.clone(),
            );
            match by_source.iter_mut().find(|(src, _)| *src == request.source) {
                Some((_, specifiers)) => specifiers.push(specifier),
                None => by_source.push((request.source.as_str(), vec![specifier])),
            }
        }

        by_source
            .into_iter()
            .map(|(src, specifiers)| import_named(specifiers, module_path(src)))
            .chain(self.pending.iter().map(|p| {
                import_named(vec![(p.imported.clone(), p.local.clone())], p.src.clone())
            }))
            .collect()
    }
}
