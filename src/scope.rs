//! Top-level bindings, fresh names and scope-aware renaming.
//!
//! Relies on the module having been through SWC's resolver: identifiers are
//! compared by [`Id`], so a local that shadows a top-level name is never
//! mistaken for it.

use std::collections::{HashMap, HashSet};

use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        utils::find_pat_ids,
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};

/// How a top-level name is introduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    Function,
    Class,
    Variable(VarDeclKind),
    /// `import { imported as local } from "src"`; `imported` is `default` or `*`
    /// for default and namespace imports.
    Import { src: String, imported: String },
    /// TypeScript enums and namespaces.
    Other,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub id: Id,
    pub kind: BindingKind,
    /// Index of the declaring statement in `Module::body`.
    pub item: usize,
}

#[derive(Debug, Default)]
pub struct ModuleScope {
    bindings: HashMap<String, Binding>,
    names: HashSet<String>,
}

impl ModuleScope {
    pub fn analyze(module: &Module) -> Self {
        let mut scope = ModuleScope::default();
        for (item, module_item) in module.body.iter().enumerate() {
            match module_item {
                ModuleItem::ModuleDecl(ModuleDecl::Import(import)) if !import.type_only => {
                    scope.collect_import(item, import);
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                    scope.collect_decl(item, &export.decl);
                }
                ModuleItem::Stmt(Stmt::Decl(decl)) => scope.collect_decl(item, decl),
                _ => {}
            }
        }
        let mut names = NameCollector { out: &mut scope.names };
        module.visit_with(&mut names);
        scope
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Every identifier spelled anywhere in the module.
    pub fn names(&self) -> &HashSet<String> {
        &self.names
    }

    fn insert(&mut self, id: Id, kind: BindingKind, item: usize) {
        self.bindings
            .entry(id.0.to_string())
            .or_insert(Binding { id, kind, item });
    }

    fn collect_import(&mut self, item: usize, import: &ImportDecl) {
        let src = import.src.value.to_string();
        for s in &import.specifiers {
            match s {
                ImportSpecifier::Named(named) if !named.is_type_only => {
                    let imported = named
                        .imported
                        .as_ref()
                        .map(module_export_name)
                        .unwrap_or_else(|| named.local.sym.to_string());
                    self.insert(
                        named.local.to_id(),
                        BindingKind::Import {
                            src: src.clone(),
                            imported,
                        },
                        item,
                    );
                }
                ImportSpecifier::Default(def) => self.insert(
                    def.local.to_id(),
                    BindingKind::Import {
                        src: src.clone(),
                        imported: "default".into(),
                    },
                    item,
                ),
                ImportSpecifier::Namespace(ns) => self.insert(
                    ns.local.to_id(),
                    BindingKind::Import {
                        src: src.clone(),
                        imported: "*".into(),
                    },
                    item,
                ),
                _ => {}
            }
        }
    }

    fn collect_decl(&mut self, item: usize, decl: &Decl) {
        match decl {
            Decl::Fn(f) if !f.declare => self.insert(f.ident.to_id(), BindingKind::Function, item),
            Decl::Class(c) if !c.declare => self.insert(c.ident.to_id(), BindingKind::Class, item),
            Decl::Var(v) if !v.declare => {
                for d in &v.decls {
                    let ids: Vec<Id> = find_pat_ids(&d.name);
                    for id in ids {
                        self.insert(id, BindingKind::Variable(v.kind), item);
                    }
                }
            }
            Decl::TsEnum(e) if !e.declare => self.insert(e.id.to_id(), BindingKind::Other, item),
            Decl::TsModule(m) if !m.declare => {
                if let TsModuleName::Ident(id) = &m.id {
                    self.insert(id.to_id(), BindingKind::Other, item);
                }
            }
            _ => {}
        }
    }
}

/// String form of an import/export name (`foo` or `"some name"`).
pub fn module_export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(i) => i.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

struct NameCollector<'a> {
    out: &'a mut HashSet<String>,
}

impl Visit for NameCollector<'_> {
    fn visit_ident(&mut self, i: &Ident) {
        self.out.insert(i.sym.to_string());
    }
}

// -----------------------------------------------------------------------------
// Fresh identifiers
// -----------------------------------------------------------------------------

/// Hands out `_name`, `_name2`, `_name3`, ... avoiding every name already in
/// the module and every name it produced before.
#[derive(Debug, Default)]
pub struct UidGenerator {
    taken: HashSet<String>,
}

impl UidGenerator {
    pub fn new(taken: HashSet<String>) -> Self {
        Self { taken }
    }

    pub fn generate(&mut self, base: &str) -> Ident {
        let base = base.trim_start_matches('_');
        let mut candidate = format!("_{base}");
        let mut i = 1;
        while self.taken.contains(&candidate) {
            i += 1;
            candidate = format!("_{base}{i}");
        }
        self.taken.insert(candidate.clone());
        tracing::trace!(uid = %candidate, "generated identifier");
        Ident::new(candidate.into(), DUMMY_SP, SyntaxContext::empty())
    }
}

// -----------------------------------------------------------------------------
// Renaming
// -----------------------------------------------------------------------------

/// Renames the binding `from` to `to` at its declaration and every reference.
///
/// Import and export specifiers keep their external name (`import { a as to }`,
/// `export { to as a }`) and shorthand properties are expanded.
pub fn rename(module: &mut Module, from: &Id, to: &str) {
    module.visit_mut_with(&mut Renamer { from, to });
}

struct Renamer<'a> {
    from: &'a Id,
    to: &'a str,
}

impl Renamer<'_> {
    fn matches(&self, i: &Ident) -> bool {
        i.sym == self.from.0 && i.ctxt == self.from.1
    }

    fn renamed(&self, i: &Ident) -> Ident {
        Ident {
            sym: self.to.into(),
            ..i.clone()
        }
    }
}

impl VisitMut for Renamer<'_> {
    fn visit_mut_ident(&mut self, i: &mut Ident) {
        if self.matches(i) {
            i.sym = self.to.into();
        }
    }

    fn visit_mut_import_named_specifier(&mut self, s: &mut ImportNamedSpecifier) {
        if self.matches(&s.local) {
            if s.imported.is_none() {
                s.imported = Some(ModuleExportName::Ident(s.local.clone()));
            }
            s.local = self.renamed(&s.local);
        }
    }

    fn visit_mut_export_named_specifier(&mut self, s: &mut ExportNamedSpecifier) {
        if let ModuleExportName::Ident(orig) = &mut s.orig {
            if self.matches(orig) {
                if s.exported.is_none() {
                    s.exported = Some(ModuleExportName::Ident(orig.clone()));
                }
                *orig = self.renamed(orig);
            }
        }
    }

    fn visit_mut_named_export(&mut self, n: &mut NamedExport) {
        // `export { a } from "m"` names a binding of another module.
        if n.src.is_none() {
            n.visit_mut_children_with(self);
        }
    }

    fn visit_mut_prop(&mut self, p: &mut Prop) {
        let expanded = match p {
            Prop::Shorthand(i) if self.matches(i) => Some(Prop::KeyValue(KeyValueProp {
                key: PropName::Ident(IdentName::new(i.sym.clone(), i.span)),
                value: Box::new(Expr::Ident(self.renamed(i))),
            })),
            _ => None,
        };
        match expanded {
            Some(prop) => *p = prop,
            None => p.visit_mut_children_with(self),
        }
    }

    fn visit_mut_object_pat_prop(&mut self, p: &mut ObjectPatProp) {
        let expanded = match p {
            ObjectPatProp::Assign(a) if self.matches(&a.key.id) => {
                let binding = BindingIdent {
                    id: self.renamed(&a.key.id),
                    type_ann: a.key.type_ann.take(),
                };
                let value = match a.value.take() {
                    Some(default) => Box::new(Pat::Assign(AssignPat {
                        span: a.span,
                        left: Box::new(Pat::Ident(binding)),
                        right: default,
                    })),
                    None => Box::new(Pat::Ident(binding)),
                };
                Some(ObjectPatProp::KeyValue(KeyValuePatProp {
                    key: PropName::Ident(IdentName::new(a.key.id.sym.clone(), a.key.id.span)),
                    value,
                }))
            }
            _ => None,
        };
        match expanded {
            Some(prop) => *p = prop,
            None => p.visit_mut_children_with(self),
        }
    }
}

// -----------------------------------------------------------------------------
// Reference sites
// -----------------------------------------------------------------------------

/// Counts references to `id` outside import/export declarations.
pub fn count_references(module: &Module, id: &Id) -> usize {
    let mut counter = ReferenceCounter { id, count: 0 };
    for item in &module.body {
        if let ModuleItem::Stmt(stmt) = item {
            stmt.visit_with(&mut counter);
        } else if let ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) = item {
            export.visit_with(&mut counter);
        } else if let ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) = item {
            export.visit_with(&mut counter);
        }
    }
    counter.count
}

struct ReferenceCounter<'a> {
    id: &'a Id,
    count: usize,
}

impl Visit for ReferenceCounter<'_> {
    fn visit_ident(&mut self, i: &Ident) {
        if i.sym == self.id.0 && i.ctxt == self.id.1 {
            self.count += 1;
        }
    }
}
