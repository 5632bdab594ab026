//! Name and type resolution.
//!
//! Entry point: [`Resolver::resolve`].
//!
//! Error codes emitted:
//! - E200: reference to an undefined name
//! - E201: name defined twice
//! - E202: type reference names the wrong kind of definition
//! - E203: function body without a `val` signature

use std::collections::HashSet;

use sailfoil_types::ast::*;
use sailfoil_types::{
    CompileErrors, ErrorCode, FoilError, Info, InfoKind, InfoValue, SourceFile, Span, SymbolId,
    SymbolTable,
};

// ══════════════════════════════════════════════════════════════════════════════
// Resolver
// ══════════════════════════════════════════════════════════════════════════════

/// Builds the global symbol table and links every type reference in a module.
pub struct Resolver<'a> {
    errors: &'a mut CompileErrors,
    source: &'a SourceFile,
    symbols: SymbolTable,
}

impl<'a> Resolver<'a> {
    pub fn new(errors: &'a mut CompileErrors, source: &'a SourceFile) -> Self {
        Self {
            errors,
            source,
            symbols: SymbolTable::new(),
        }
    }

    /// Resolve `module` in place and return its symbol table.
    ///
    /// The table is complete even when errors were reported; callers must
    /// check the error list before generating code.
    pub fn resolve(mut self, module: &mut Module) -> SymbolTable {
        self.populate(module);
        self.patch(module);
        self.attach_types(module);
        self.check_functions(module);
        tracing::debug!(
            symbols = self.symbols.len(),
            errors = self.errors.total_errors,
            "resolved module"
        );
        self.symbols
    }

    // ── Pass 1: populate ─────────────────────────────────────────────

    fn populate(&mut self, module: &Module) {
        for (index, decl) in module.decls.iter().enumerate() {
            match decl {
                Decl::GlobalVal(v) => {
                    let value = match &v.definition {
                        Some(symbol) => InfoValue::Extern(symbol.clone()),
                        None => InfoValue::None,
                    };
                    self.define(&v.name, InfoKind::GlobalVal, value, index, None);
                }
                Decl::Enum(e) => {
                    let Some(parent) = self.define(&e.name, InfoKind::Enum, InfoValue::None, index, None)
                    else {
                        continue;
                    };
                    for (ordinal, variant) in e.variants.iter().enumerate() {
                        self.define(
                            variant,
                            InfoKind::EnumVariant,
                            InfoValue::Ordinal(ordinal as u32),
                            index,
                            Some(parent),
                        );
                    }
                }
                Decl::Union(u) => {
                    let Some(parent) = self.define(&u.name, InfoKind::Union, InfoValue::None, index, None)
                    else {
                        continue;
                    };
                    for (tag, variant) in u.variants.iter().enumerate() {
                        self.define(
                            &variant.name,
                            InfoKind::UnionVariant,
                            InfoValue::Tag(tag as u32),
                            index,
                            Some(parent),
                        );
                    }
                }
                Decl::Register(r) => {
                    self.define(&r.name, InfoKind::Register, InfoValue::None, index, None);
                }
                Decl::Function(_) => {}
            }
        }
    }

    fn define(
        &mut self,
        name: &Ident,
        kind: InfoKind,
        value: InfoValue,
        decl: usize,
        parent: Option<SymbolId>,
    ) -> Option<SymbolId> {
        let info = Info {
            name: name.name.clone(),
            kind,
            ty: None,
            value,
            decl,
            parent,
        };
        match self.symbols.insert(info) {
            Ok(id) => Some(id),
            Err(existing) => {
                let previous = self.symbols.get(existing).kind.describe();
                self.error(
                    ErrorCode::REDEFINITION,
                    format!("'{}' is already defined as a {previous}", name.name),
                    name.span,
                );
                None
            }
        }
    }

    // ── Pass 2: patch type references ────────────────────────────────

    fn patch(&mut self, module: &mut Module) {
        for decl in &mut module.decls {
            match decl {
                Decl::GlobalVal(v) => self.patch_type(&mut v.ty),
                Decl::Union(u) => {
                    for variant in &mut u.variants {
                        self.patch_type(&mut variant.payload);
                    }
                }
                Decl::Register(r) => self.patch_type(&mut r.ty),
                Decl::Function(f) => {
                    for stmt in &mut f.body {
                        if let StmtKind::Declare { ty, .. } = &mut stmt.kind {
                            self.patch_type(ty);
                        }
                    }
                }
                Decl::Enum(_) => {}
            }
        }
    }

    fn patch_type(&mut self, ty: &mut Type) {
        let symbols = &self.symbols;
        let mut failures: Vec<(ErrorCode, String, Span)> = Vec::new();
        ty.for_each_ref_mut(&mut |r, expected| {
            let Some(id) = symbols.lookup(&r.name.name) else {
                failures.push((
                    ErrorCode::UNDEFINED_NAME,
                    format!("undefined type '{}'", r.name.name),
                    r.name.span,
                ));
                return;
            };
            let found = symbols.get(id).kind;
            let wanted = match expected {
                RefKind::Enum => InfoKind::Enum,
                RefKind::Union => InfoKind::Union,
            };
            if found != wanted {
                failures.push((
                    ErrorCode::KIND_MISMATCH,
                    format!(
                        "'{}' is a {}, expected a {}",
                        r.name.name,
                        found.describe(),
                        wanted.describe()
                    ),
                    r.name.span,
                ));
                return;
            }
            r.definition = Some(id);
        });
        for (code, message, span) in failures {
            self.error(code, message, span);
        }
    }

    // ── Pass 3: record resolved types ────────────────────────────────

    fn attach_types(&mut self, module: &Module) {
        for (index, decl) in module.decls.iter().enumerate() {
            match decl {
                Decl::GlobalVal(v) => self.set_type(&v.name.name, index, &v.ty),
                Decl::Register(r) => self.set_type(&r.name.name, index, &r.ty),
                Decl::Union(u) => {
                    for variant in &u.variants {
                        self.set_type(&variant.name.name, index, &variant.payload);
                    }
                }
                _ => {}
            }
        }
    }

    fn set_type(&mut self, name: &str, decl: usize, ty: &Type) {
        if let Some(id) = self.symbols.lookup(name) {
            let info = self.symbols.get_mut(id);
            // A redefinition must not overwrite the first definition's type.
            if info.decl == decl {
                info.ty = Some(ty.clone());
            }
        }
    }

    // ── Function signatures ──────────────────────────────────────────

    fn check_functions(&mut self, module: &Module) {
        let mut seen = HashSet::new();
        for function in module.functions() {
            let name = &function.name;
            if !seen.insert(name.name.as_str()) {
                self.error(
                    ErrorCode::REDEFINITION,
                    format!("function '{}' has more than one body", name.name),
                    name.span,
                );
                continue;
            }
            let signature = self.symbols.lookup_info(&name.name).map(|info| {
                (
                    info.kind,
                    matches!(info.value, InfoValue::Extern(_)),
                    matches!(
                        info.ty.as_ref().map(|t| &t.kind),
                        Some(TypeKind::Function { .. })
                    ),
                )
            });
            match signature {
                Some((InfoKind::GlobalVal, false, true)) => {}
                Some((InfoKind::GlobalVal, true, _)) => self.error(
                    ErrorCode::MISSING_SIGNATURE,
                    format!("'{}' is bound to an extern and cannot have a body", name.name),
                    name.span,
                ),
                Some((InfoKind::GlobalVal, false, false)) => self.error(
                    ErrorCode::KIND_MISMATCH,
                    format!("'{}' is declared with a non-function type", name.name),
                    name.span,
                ),
                Some((kind, _, _)) => self.error(
                    ErrorCode::KIND_MISMATCH,
                    format!("'{}' is a {}, not a function", name.name, kind.describe()),
                    name.span,
                ),
                None => self.error(
                    ErrorCode::MISSING_SIGNATURE,
                    format!("function '{}' has no 'val' signature", name.name),
                    name.span,
                ),
            }
        }
    }

    fn error(&mut self, code: ErrorCode, message: String, span: Span) {
        let source_line = self.source.line(span.line).unwrap_or("").to_string();
        self.errors.push_error(FoilError::new(
            &self.source.name,
            code,
            message,
            span,
            source_line,
        ));
    }
}
