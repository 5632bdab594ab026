//! Program assembly: assigns dense ids to every global definition, lowers
//! types, then lowers each function body into a jump graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use sailfoil_types::ast::{self, Decl, Module, TypeKind};
use sailfoil_types::{InfoKind, InfoValue, Span, SymbolId, SymbolTable};

use crate::analysis::raising_functions;
use crate::error::{CodegenError, CodegenResult};
use crate::lower::FunctionLowering;
use crate::program::*;

/// Code generation switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Insert a pending-exception branch after every call to a function
    /// that may raise, unless the IR already tests the flag right there.
    pub insert_propagation_checks: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            insert_propagation_checks: true,
        }
    }
}

impl CodegenOptions {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Generate a target program from a resolved module.
///
/// Every type reference in `module` must already be linked to `symbols`.
pub fn generate(
    module: &Module,
    symbols: &SymbolTable,
    options: &CodegenOptions,
) -> CodegenResult<Program> {
    let mut builder = ProgramBuilder::new(module, symbols, options);
    builder.declare_globals()?;
    builder.lower_functions()?;
    let program = builder.program;
    tracing::debug!(
        enums = program.enums.len(),
        unions = program.unions.len(),
        registers = program.registers.len(),
        externs = program.externs.len(),
        functions = program.functions.len(),
        "generated program"
    );
    Ok(program)
}

// ══════════════════════════════════════════════════════════════════════════════
// ProgramBuilder
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) struct ProgramBuilder<'a> {
    pub(crate) module: &'a Module,
    pub(crate) symbols: &'a SymbolTable,
    pub(crate) options: &'a CodegenOptions,
    pub(crate) program: Program,
    enum_ids: HashMap<SymbolId, EnumId>,
    union_ids: HashMap<SymbolId, UnionId>,
    register_ids: HashMap<String, RegisterId>,
    function_ids: HashMap<String, FuncId>,
    extern_ids: HashMap<String, ExternId>,
    raising: HashSet<String>,
}

/// What a call's callee name refers to.
pub(crate) enum CalleeKind {
    Constructor { union: UnionId, tag: u32 },
    Callable { callee: Callee, may_raise: bool },
}

impl<'a> ProgramBuilder<'a> {
    fn new(module: &'a Module, symbols: &'a SymbolTable, options: &'a CodegenOptions) -> Self {
        Self {
            module,
            symbols,
            options,
            program: Program::default(),
            enum_ids: HashMap::new(),
            union_ids: HashMap::new(),
            register_ids: HashMap::new(),
            function_ids: HashMap::new(),
            extern_ids: HashMap::new(),
            raising: raising_functions(module),
        }
    }

    // ── Globals ───────────────────────────────────────────────────────

    fn declare_globals(&mut self) -> CodegenResult<()> {
        // Ids first, so payload and register types may reference any enum
        // or union regardless of declaration order.
        for decl in &self.module.decls {
            match decl {
                Decl::Enum(e) => {
                    let sym = self.global_symbol(&e.name)?;
                    let id = EnumId(self.program.enums.len() as u32);
                    self.enum_ids.insert(sym, id);
                    self.program.enums.push(EnumDef {
                        name: e.name.name.clone(),
                        variants: e.variants.iter().map(|v| v.name.clone()).collect(),
                    });
                }
                Decl::Union(u) => {
                    let sym = self.global_symbol(&u.name)?;
                    let id = UnionId(self.program.unions.len() as u32);
                    self.union_ids.insert(sym, id);
                    self.program.unions.push(UnionDef {
                        name: u.name.name.clone(),
                        variants: Vec::new(),
                    });
                }
                Decl::Function(f) => {
                    let id = FuncId(self.function_ids.len() as u32);
                    self.function_ids.insert(f.name.name.clone(), id);
                }
                _ => {}
            }
        }

        for decl in &self.module.decls {
            match decl {
                Decl::Union(u) => {
                    let mut variants = Vec::with_capacity(u.variants.len());
                    for v in &u.variants {
                        variants.push(VariantDef {
                            name: v.name.name.clone(),
                            payload: self.lower_type(&v.payload)?,
                        });
                    }
                    let sym = self.global_symbol(&u.name)?;
                    let id = self.union_ids[&sym];
                    self.program.unions[id.index()].variants = variants;
                }
                Decl::Register(r) => {
                    let ty = self.lower_type(&r.ty)?;
                    let id = RegisterId(self.program.registers.len() as u32);
                    self.register_ids.insert(r.name.name.clone(), id);
                    self.program.registers.push(RegisterDef {
                        name: r.name.name.clone(),
                        ty,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn lower_functions(&mut self) -> CodegenResult<()> {
        let module = self.module;
        for function in module.functions() {
            let (params, ret) = self.signature(function)?;
            let may_raise = self.raising.contains(&function.name.name);
            let lowered = FunctionLowering::new(self, function, params, ret, may_raise).lower()?;
            self.program.functions.push(lowered);
        }
        Ok(())
    }

    fn global_symbol(&self, name: &ast::Ident) -> CodegenResult<SymbolId> {
        self.symbols
            .lookup(&name.name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol {
                name: name.name.clone(),
                function: "module scope".to_string(),
                span: name.span,
            })
    }

    // ── Types ─────────────────────────────────────────────────────────

    pub(crate) fn lower_type(&self, ty: &ast::Type) -> CodegenResult<Ty> {
        let lowered = match &ty.kind {
            TypeKind::Unit => Ty::Unit,
            TypeKind::Bool => Ty::Bool,
            TypeKind::Int | TypeKind::Int64 => Ty::Int,
            TypeKind::Bit => Ty::Bit,
            TypeKind::Bits(width) => Ty::Bits(width.unwrap_or(64)),
            TypeKind::String => Ty::String,
            TypeKind::Tuple(items) => Ty::Tuple(
                items
                    .iter()
                    .map(|t| self.lower_type(t))
                    .collect::<CodegenResult<_>>()?,
            ),
            TypeKind::Enum(r) => {
                let id = r
                    .definition
                    .and_then(|sym| self.enum_ids.get(&sym))
                    .ok_or_else(|| CodegenError::UnresolvedTypeReference {
                        name: r.name.name.clone(),
                        span: r.name.span,
                    })?;
                Ty::Enum(*id)
            }
            TypeKind::Union(r) => {
                let id = r
                    .definition
                    .and_then(|sym| self.union_ids.get(&sym))
                    .ok_or_else(|| CodegenError::UnresolvedTypeReference {
                        name: r.name.name.clone(),
                        span: r.name.span,
                    })?;
                Ty::Union(*id)
            }
            TypeKind::Function { .. } => {
                return Err(CodegenError::Unsupported {
                    message: "function types are only valid in 'val' signatures".to_string(),
                    span: ty.span,
                })
            }
        };
        Ok(lowered)
    }

    fn signature(&self, function: &ast::FunctionDecl) -> CodegenResult<(Vec<Ty>, Ty)> {
        let missing = || CodegenError::MissingSignature {
            name: function.name.name.clone(),
            span: function.name.span,
        };
        let info = self.symbols.lookup_info(&function.name.name).ok_or_else(missing)?;
        if info.kind != InfoKind::GlobalVal || matches!(info.value, InfoValue::Extern(_)) {
            return Err(missing());
        }
        let Some(ast::Type {
            kind: TypeKind::Function { params, ret },
            ..
        }) = &info.ty
        else {
            return Err(missing());
        };
        if params.len() != function.params.len() {
            return Err(CodegenError::Unsupported {
                message: format!(
                    "'{}' takes {} parameters but its signature declares {}",
                    function.name.name,
                    function.params.len(),
                    params.len()
                ),
                span: function.span,
            });
        }
        let params = params
            .iter()
            .map(|p| self.lower_type(p))
            .collect::<CodegenResult<Vec<_>>>()?;
        Ok((params, self.lower_type(ret)?))
    }

    // ── Name lookup for function bodies ───────────────────────────────

    pub(crate) fn register_id(&self, name: &str) -> Option<RegisterId> {
        self.register_ids.get(name).copied()
    }

    /// An enum variant used as a value.
    pub(crate) fn enum_constant(&self, name: &str) -> Option<Const> {
        let info = self.symbols.lookup_info(name)?;
        match (info.kind, &info.value, info.parent) {
            (InfoKind::EnumVariant, InfoValue::Ordinal(ordinal), Some(parent)) => {
                let enum_id = *self.enum_ids.get(&parent)?;
                Some(Const::Enum {
                    enum_id,
                    ordinal: *ordinal,
                })
            }
            _ => None,
        }
    }

    /// A union variant named by `is`, `as` or a constructor call.
    pub(crate) fn union_variant(&self, name: &str) -> Option<(UnionId, u32)> {
        let info = self.symbols.lookup_info(name)?;
        match (info.kind, &info.value, info.parent) {
            (InfoKind::UnionVariant, InfoValue::Tag(tag), Some(parent)) => {
                Some((*self.union_ids.get(&parent)?, *tag))
            }
            _ => None,
        }
    }

    pub(crate) fn callee(&mut self, name: &str, span: Span) -> CodegenResult<Option<CalleeKind>> {
        if let Some((union, tag)) = self.union_variant(name) {
            return Ok(Some(CalleeKind::Constructor { union, tag }));
        }
        let Some(info) = self.symbols.lookup_info(name) else {
            return Ok(None);
        };
        if info.kind != InfoKind::GlobalVal {
            return Ok(None);
        }
        if let InfoValue::Extern(symbol) = &info.value {
            let id = self.extern_id(name, symbol.clone(), info.ty.clone(), span)?;
            return Ok(Some(CalleeKind::Callable {
                callee: Callee::Extern(id),
                may_raise: false,
            }));
        }
        Ok(self.function_ids.get(name).map(|&id| CalleeKind::Callable {
            callee: Callee::Function(id),
            may_raise: self.raising.contains(name),
        }))
    }

    fn extern_id(
        &mut self,
        name: &str,
        symbol: String,
        ty: Option<ast::Type>,
        span: Span,
    ) -> CodegenResult<ExternId> {
        if let Some(&id) = self.extern_ids.get(name) {
            return Ok(id);
        }
        let (params, ret) = match ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Function { params, ret }) => (
                params
                    .iter()
                    .map(|p| self.lower_type(p))
                    .collect::<CodegenResult<Vec<_>>>()?,
                self.lower_type(ret)?,
            ),
            _ => {
                return Err(CodegenError::Unsupported {
                    message: format!("extern '{name}' does not have a function type"),
                    span,
                })
            }
        };
        let id = ExternId(self.program.externs.len() as u32);
        self.program.externs.push(ExternDef {
            name: name.to_string(),
            symbol,
            params,
            ret,
        });
        self.extern_ids.insert(name.to_string(), id);
        Ok(id)
    }
}
