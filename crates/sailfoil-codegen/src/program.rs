//! The target program: what code generation emits and the runtime executes.
//!
//! Everything is indexed by dense ids assigned in declaration order, so a
//! serialized program is stable across runs for the same input.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

id_type!(
    EnumId,
    UnionId,
    RegisterId,
    ExternId,
    FuncId,
    /// Index into [`FunctionDef::locals`].
    LocalId,
    /// Index into [`FunctionDef::blocks`].
    BlockId,
);

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

/// A lowered IR type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ty {
    Unit,
    Bool,
    /// Both `%i` and `%i64`.
    Int,
    Bit,
    /// Width-polymorphic `%bv` lowers to 64 bits.
    Bits(u32),
    String,
    Tuple(Vec<Ty>),
    Enum(EnumId),
    Union(UnionId),
}

// ══════════════════════════════════════════════════════════════════════════════
// Program
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub enums: Vec<EnumDef>,
    pub unions: Vec<UnionDef>,
    pub registers: Vec<RegisterDef>,
    pub externs: Vec<ExternDef>,
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<(FuncId, &FunctionDef)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (FuncId(i as u32), f))
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn union_def(&self, name: &str) -> Option<&UnionDef> {
        self.unions.iter().find(|u| u.name == name)
    }

    pub fn register(&self, name: &str) -> Option<RegisterId> {
        self.registers
            .iter()
            .position(|r| r.name == name)
            .map(|i| RegisterId(i as u32))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// An enum as a dense discriminant type: variant `i` has ordinal `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumDef {
    pub fn ordinal(&self, variant: &str) -> Option<u32> {
        self.variants
            .iter()
            .position(|v| v == variant)
            .map(|i| i as u32)
    }

    pub fn variant(&self, ordinal: u32) -> Option<&str> {
        self.variants.get(ordinal as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// A closed tagged union. The tag of a variant is its declaration position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub variants: Vec<VariantDef>,
}

impl UnionDef {
    pub fn tag(&self, variant: &str) -> Option<u32> {
        self.variants
            .iter()
            .position(|v| v.name == variant)
            .map(|i| i as u32)
    }

    pub fn variant(&self, tag: u32) -> Option<&VariantDef> {
        self.variants.get(tag as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub payload: Ty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDef {
    pub name: String,
    pub ty: Ty,
}

/// A `val` bound to a support-library symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternDef {
    /// The IR-level name, e.g. `zeq_int`.
    pub name: String,
    /// The support-library symbol, e.g. `eq_int`.
    pub symbol: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Parameters occupy the first locals, in order.
    pub params: Vec<LocalId>,
    pub locals: Vec<LocalDef>,
    pub ret: Ty,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    /// Whether a call can return with the exception flag set.
    pub may_raise: bool,
}

impl FunctionDef {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn local(&self, name: &str) -> Option<LocalId> {
        self.locals
            .iter()
            .position(|l| l.name == name)
            .map(|i| LocalId(i as u32))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDef {
    pub name: String,
    pub ty: Ty,
}

/// A straight-line run of operations ending in one terminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Index of the IR statement that starts this block; `None` for blocks
    /// synthesized by code generation.
    pub origin: Option<usize>,
    pub ops: Vec<Op>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Reset a local to its type's default value.
    Declare { local: LocalId },
    Assign { dest: Place, value: Operand },
    Call {
        dest: Option<Place>,
        callee: Callee,
        args: Vec<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Function(FuncId),
    Extern(ExternId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    Goto(BlockId),
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Normal exit with the value of the `return` slot.
    Return,
    /// Exceptional exit; the returned value is the type default.
    Arbitrary,
    /// Fatal trap.
    Unreachable { location: String },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto(b) => vec![*b],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Places & operands
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub root: PlaceRoot,
    /// Tuple field path below the root.
    pub path: Vec<u32>,
}

impl Place {
    pub fn root(root: PlaceRoot) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceRoot {
    Local(LocalId),
    Register(RegisterId),
    Return,
    CurrentException,
    HaveException,
    ThrowLocation,
}

/// A side-effect-free expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Const(Const),
    Local(LocalId),
    Register(RegisterId),
    HaveException,
    CurrentException,
    ThrowLocation,
    Prim {
        op: PrimOp,
        args: Vec<Operand>,
    },
    /// True when `value` holds variant `tag`.
    IsVariant {
        value: Box<Operand>,
        union: UnionId,
        tag: u32,
    },
    /// The payload of `value`; traps when it holds another variant.
    AsVariant {
        value: Box<Operand>,
        union: UnionId,
        tag: u32,
    },
    Field {
        value: Box<Operand>,
        index: u32,
    },
    Tuple(Vec<Operand>),
    Construct {
        union: UnionId,
        tag: u32,
        payload: Box<Operand>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Const {
    Unit,
    Bool(bool),
    Int(i64),
    Bits { width: u32, value: u64 },
    String(String),
    Enum { enum_id: EnumId, ordinal: u32 },
}

/// Built-in `@op` primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimOp {
    Not,
    And,
    Or,
    Eq,
    Neq,
}

impl PrimOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "not" => PrimOp::Not,
            "and" => PrimOp::And,
            "or" => PrimOp::Or,
            "eq" => PrimOp::Eq,
            "neq" => PrimOp::Neq,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimOp::Not => "not",
            PrimOp::And => "and",
            PrimOp::Or => "or",
            PrimOp::Eq => "eq",
            PrimOp::Neq => "neq",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            PrimOp::Not => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump_enum() -> EnumDef {
        EnumDef {
            name: "zjump".into(),
            variants: ["zJDONT", "zJGT", "zJEQ"].iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_enum_ordinal_lookup() {
        let e = jump_enum();
        assert_eq!(e.ordinal("zJEQ"), Some(2));
        assert_eq!(e.variant(1), Some("zJGT"));
        assert_eq!(e.variant(3), None);
        assert_eq!(e.ordinal("zJMP"), None);
    }

    #[test]
    fn test_union_tag_lookup() {
        let u = UnionDef {
            name: "zinstr".into(),
            variants: vec![
                VariantDef {
                    name: "zAINST".into(),
                    payload: Ty::Bits(16),
                },
                VariantDef {
                    name: "zCINST".into(),
                    payload: Ty::Tuple(vec![Ty::Bits(1), Ty::Bool]),
                },
            ],
        };
        assert_eq!(u.tag("zCINST"), Some(1));
        assert_eq!(u.variant(0).map(|v| &v.payload), Some(&Ty::Bits(16)));
    }

    #[test]
    fn test_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&Terminator::Goto(BlockId(3))).unwrap();
        assert_eq!(json, r#"{"goto":3}"#);
    }

    #[test]
    fn test_prim_names_round_trip() {
        for op in [PrimOp::Not, PrimOp::And, PrimOp::Or, PrimOp::Eq, PrimOp::Neq] {
            assert_eq!(PrimOp::from_name(op.name()), Some(op));
        }
    }
}
