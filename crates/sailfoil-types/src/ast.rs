//! Syntax tree of the textual ISA IR.
//!
//! A module is a flat, ordered list of declarations. Function bodies are
//! numbered statement lists: the statement index is the jump target used by
//! `jump` and `goto`, with declarations counting as statements.
//!
//! Type references to enums and unions carry a `definition` link that is
//! empty after parsing and patched exactly once by name resolution.

use crate::symbols::SymbolId;
use crate::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub decls: Vec<Decl>,
    pub span: Span,
}

impl Module {
    /// All function declarations, in source order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Function(f) => Some(f),
            _ => None,
        })
    }
}

/// A spanned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    GlobalVal(GlobalValDecl),
    Enum(EnumDecl),
    Union(UnionDecl),
    Function(FunctionDecl),
    Register(RegisterDecl),
}

impl Decl {
    pub fn name(&self) -> &Ident {
        match self {
            Decl::GlobalVal(d) => &d.name,
            Decl::Enum(d) => &d.name,
            Decl::Union(d) => &d.name,
            Decl::Function(d) => &d.name,
            Decl::Register(d) => &d.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::GlobalVal(d) => d.span,
            Decl::Enum(d) => d.span,
            Decl::Union(d) => d.span,
            Decl::Function(d) => d.span,
            Decl::Register(d) => d.span,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// `val name = "symbol" : (T, ..) -> T` or `val name : (T, ..) -> T`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalValDecl {
    pub name: Ident,
    /// Support-library symbol for externs; `None` when a `fn` body follows.
    pub definition: Option<String>,
    pub ty: Type,
    pub span: Span,
}

/// `enum name { A, B, .. }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub variants: Vec<Ident>,
    pub span: Span,
}

/// `union name { A: T, B: T, .. }`
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub name: Ident,
    pub variants: Vec<UnionVariant>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    pub name: Ident,
    pub payload: Type,
}

/// `fn name(a, b) { stmt; .. }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `register name : T`
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterDecl {
    pub name: Ident,
    pub ty: Type,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub span: Span,
}

impl Type {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Visit every enum/union reference nested in this type.
    pub fn for_each_ref_mut(&mut self, f: &mut dyn FnMut(&mut TypeRef, RefKind)) {
        match &mut self.kind {
            TypeKind::Enum(r) => f(r, RefKind::Enum),
            TypeKind::Union(r) => f(r, RefKind::Union),
            TypeKind::Tuple(items) => {
                for item in items {
                    item.for_each_ref_mut(f);
                }
            }
            TypeKind::Function { params, ret } => {
                for param in params {
                    param.for_each_ref_mut(f);
                }
                ret.for_each_ref_mut(f);
            }
            _ => {}
        }
    }

    /// Visit every enum/union reference nested in this type.
    pub fn for_each_ref(&self, f: &mut dyn FnMut(&TypeRef, RefKind)) {
        match &self.kind {
            TypeKind::Enum(r) => f(r, RefKind::Enum),
            TypeKind::Union(r) => f(r, RefKind::Union),
            TypeKind::Tuple(items) => {
                for item in items {
                    item.for_each_ref(f);
                }
            }
            TypeKind::Function { params, ret } => {
                for param in params {
                    param.for_each_ref(f);
                }
                ret.for_each_ref(f);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// `%unit`
    Unit,
    /// `%bool`
    Bool,
    /// `%i`, arbitrary-precision in the model, 64-bit here.
    Int,
    /// `%i64`
    Int64,
    /// `%bit`
    Bit,
    /// `%bvN`; `None` for the width-polymorphic `%bv`.
    Bits(Option<u32>),
    /// `%string`
    String,
    /// `(T, T, ..)`
    Tuple(Vec<Type>),
    /// `%enum name`
    Enum(TypeRef),
    /// `%union name`
    Union(TypeRef),
    /// `(T, ..) -> T`, only in `val` signatures.
    Function { params: Vec<Type>, ret: Box<Type> },
}

/// Which kind of definition a [`TypeRef`] must resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Enum,
    Union,
}

/// A by-name reference to an enum or union type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: Ident,
    /// Patched by name resolution.
    pub definition: Option<SymbolId>,
}

impl TypeRef {
    pub fn new(name: Ident) -> Self {
        Self {
            name,
            definition: None,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `x : T;` or `x : T = e;`
    Declare {
        name: Ident,
        ty: Type,
        init: Option<Expr>,
    },
    /// `place = e;`
    Assign { target: Place, value: Expr },
    /// ``jump cond goto N ` "location";``
    Jump {
        cond: Expr,
        target: usize,
        location: Option<String>,
    },
    /// `goto N;`
    Goto(usize),
    /// `end;` returns the `return` variable.
    End,
    /// `arbitrary;` leaves the function on an exceptional path.
    Arbitrary,
    /// `unreachable;` traps when executed.
    Unreachable,
}

impl StmtKind {
    /// Statements after which control never falls through.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            StmtKind::Jump { .. }
                | StmtKind::Goto(_)
                | StmtKind::End
                | StmtKind::Arbitrary
                | StmtKind::Unreachable
        )
    }
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    /// A local, parameter or register, optionally projected into tuple fields.
    Named { name: Ident, path: Vec<u32> },
    /// `return`
    Return,
    /// `current_exception`
    CurrentException,
    /// `have_exception`
    HaveException,
    /// `throw_location`
    ThrowLocation,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A local, parameter, register or enum variant.
    Name(Ident),
    Literal(Literal),
    /// `f(args)`: a function, an extern or a union constructor.
    Call { callee: Ident, args: Vec<Expr> },
    /// `@op(args)`
    Prim { op: Ident, args: Vec<Expr> },
    /// `e is V`: true when `e` does not hold variant `V`.
    Is { value: Box<Expr>, variant: Ident },
    /// `e as V`: checked payload projection.
    As { value: Box<Expr>, variant: Ident },
    /// `e.N` or `e.ztupN`
    Field { value: Box<Expr>, index: u32 },
    HaveException,
    CurrentException,
    ThrowLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `()`
    Unit,
    Bool(bool),
    Int(i64),
    /// `0b..` or `0x..`; `width` counts digits times bits per digit.
    Bits { width: u32, value: u64 },
    String(String),
}
