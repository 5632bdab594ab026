//! Runtime values.

use std::fmt;

use sailfoil_codegen::{Const, EnumId, Program, Ty, UnionId};

use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    /// `bits` never has set bits at or above `width`.
    Bits {
        width: u32,
        bits: u64,
    },
    Str(String),
    Enum {
        enum_id: EnumId,
        ordinal: u32,
    },
    Union(Box<UnionValue>),
    Tuple(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionValue {
    pub union: UnionId,
    pub tag: u32,
    pub payload: Value,
}

/// The mask selecting the low `width` bits.
pub fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl Value {
    pub fn bits(width: u32, bits: u64) -> Self {
        Value::Bits {
            width,
            bits: bits & width_mask(width),
        }
    }

    pub fn union(union: UnionId, tag: u32, payload: Value) -> Self {
        Value::Union(Box::new(UnionValue {
            union,
            tag,
            payload,
        }))
    }

    pub fn from_const(constant: &Const) -> Self {
        match constant {
            Const::Unit => Value::Unit,
            Const::Bool(b) => Value::Bool(*b),
            Const::Int(i) => Value::Int(*i),
            Const::Bits { width, value } => Value::bits(*width, *value),
            Const::String(s) => Value::Str(s.clone()),
            Const::Enum { enum_id, ordinal } => Value::Enum {
                enum_id: *enum_id,
                ordinal: *ordinal,
            },
        }
    }

    /// The value a fresh local, register or `arbitrary` exit holds.
    ///
    /// Unions default to their first variant whose payload does not
    /// lead back to the union itself.
    pub fn default_for(program: &Program, ty: &Ty) -> EvalResult<Self> {
        default_at(program, ty, &mut Vec::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Bits { .. } => "bits",
            Value::Str(_) => "string",
            Value::Enum { .. } => "enum",
            Value::Union(_) => "union",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn as_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_int(&self) -> EvalResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("int", other)),
        }
    }

    /// Returns `(width, bits)`.
    pub fn as_bits(&self) -> EvalResult<(u32, u64)> {
        match self {
            Value::Bits { width, bits } => Ok((*width, *bits)),
            other => Err(mismatch("bits", other)),
        }
    }

    pub fn as_str(&self) -> EvalResult<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_union(&self) -> EvalResult<&UnionValue> {
        match self {
            Value::Union(u) => Ok(u),
            other => Err(mismatch("union", other)),
        }
    }

    pub fn field(&self, index: u32) -> EvalResult<&Value> {
        match self {
            Value::Tuple(items) => items.get(index as usize).ok_or_else(|| {
                EvalError::TypeMismatch(format!(
                    "tuple of {} has no field {index}",
                    items.len()
                ))
            }),
            other => Err(mismatch("tuple", other)),
        }
    }

    pub fn field_mut(&mut self, index: u32) -> EvalResult<&mut Value> {
        match self {
            Value::Tuple(items) => {
                let len = items.len();
                items.get_mut(index as usize).ok_or_else(|| {
                    EvalError::TypeMismatch(format!("tuple of {len} has no field {index}"))
                })
            }
            other => Err(mismatch("tuple", other)),
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> EvalError {
    EvalError::TypeMismatch(format!("expected {expected}, found {}", found.type_name()))
}

/// `visiting` holds the unions whose default is under construction.
fn default_at(program: &Program, ty: &Ty, visiting: &mut Vec<UnionId>) -> EvalResult<Value> {
    let value = match ty {
        Ty::Unit => Value::Unit,
        Ty::Bool => Value::Bool(false),
        Ty::Int => Value::Int(0),
        Ty::Bit => Value::bits(1, 0),
        Ty::Bits(width) => Value::bits(*width, 0),
        Ty::String => Value::Str(String::new()),
        Ty::Tuple(items) => Value::Tuple(
            items
                .iter()
                .map(|t| default_at(program, t, visiting))
                .collect::<EvalResult<_>>()?,
        ),
        Ty::Enum(enum_id) => Value::Enum {
            enum_id: *enum_id,
            ordinal: 0,
        },
        Ty::Union(union) => {
            let def = program.unions.get(union.index()).ok_or_else(|| {
                EvalError::TypeMismatch(format!("no union #{}", union.0))
            })?;
            visiting.push(*union);
            let chosen = def
                .variants
                .iter()
                .position(|v| is_finite(program, &v.payload, visiting));
            let payload = match chosen {
                Some(tag) => default_at(program, &def.variants[tag].payload, visiting)
                    .map(|payload| (tag, payload)),
                None => Err(EvalError::TypeMismatch(format!(
                    "union {} has no variant with a finite default",
                    def.name
                ))),
            };
            visiting.pop();
            let (tag, payload) = payload?;
            Value::union(*union, tag as u32, payload)
        }
    };
    Ok(value)
}

/// Whether `ty` has a default that does not re-enter a union in `visiting`.
fn is_finite(program: &Program, ty: &Ty, visiting: &mut Vec<UnionId>) -> bool {
    match ty {
        Ty::Tuple(items) => items.iter().all(|t| is_finite(program, t, visiting)),
        Ty::Union(union) => {
            if visiting.contains(union) {
                return false;
            }
            let Some(def) = program.unions.get(union.index()) else {
                return false;
            };
            visiting.push(*union);
            let finite = def
                .variants
                .iter()
                .any(|v| is_finite(program, &v.payload, visiting));
            visiting.pop();
            finite
        }
        _ => true,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bits { width, bits } => write!(f, "{bits:#x}:bits{width}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Enum { enum_id, ordinal } => write!(f, "enum{}#{ordinal}", enum_id.0),
            Value::Union(u) => write!(f, "union{}[{}]({})", u.union.0, u.tag, u.payload),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sailfoil_codegen::{UnionDef, VariantDef};

    fn program_with_union() -> Program {
        Program {
            unions: vec![UnionDef {
                name: "zexception".into(),
                variants: vec![
                    VariantDef {
                        name: "zEpair".into(),
                        payload: Ty::Tuple(vec![Ty::Int, Ty::Int]),
                    },
                    VariantDef {
                        name: "zEstring".into(),
                        payload: Ty::String,
                    },
                ],
            }],
            ..Program::default()
        }
    }

    #[test]
    fn test_bits_are_masked_to_width() {
        assert_eq!(Value::bits(4, 0xff), Value::Bits { width: 4, bits: 0xf });
        assert_eq!(Value::bits(64, u64::MAX).as_bits().unwrap(), (64, u64::MAX));
    }

    #[test]
    fn test_union_default_is_first_variant() {
        let program = program_with_union();
        let value = Value::default_for(&program, &Ty::Union(UnionId(0))).unwrap();
        let u = value.as_union().unwrap();
        assert_eq!(u.tag, 0);
        assert_eq!(u.payload, Value::Tuple(vec![Value::Int(0), Value::Int(0)]));
    }

    #[test]
    fn test_recursive_union_defaults_to_first_finite_variant() {
        let program = Program {
            unions: vec![
                UnionDef {
                    name: "ztree".into(),
                    variants: vec![
                        VariantDef {
                            name: "zNode".into(),
                            payload: Ty::Tuple(vec![Ty::Union(UnionId(0)), Ty::Int]),
                        },
                        VariantDef {
                            name: "zLeaf".into(),
                            payload: Ty::Unit,
                        },
                    ],
                },
                UnionDef {
                    name: "zloop".into(),
                    variants: vec![VariantDef {
                        name: "zMore".into(),
                        payload: Ty::Union(UnionId(1)),
                    }],
                },
            ],
            ..Program::default()
        };
        let tree = Value::default_for(&program, &Ty::Union(UnionId(0))).unwrap();
        assert_eq!(tree, Value::union(UnionId(0), 1, Value::Unit));
        assert!(Value::default_for(&program, &Ty::Union(UnionId(1))).is_err());
    }

    #[test]
    fn test_scalar_defaults() {
        let program = Program::default();
        assert_eq!(Value::default_for(&program, &Ty::Bool).unwrap(), Value::Bool(false));
        assert_eq!(
            Value::default_for(&program, &Ty::Bits(16)).unwrap(),
            Value::bits(16, 0)
        );
        assert_eq!(
            Value::default_for(&program, &Ty::String).unwrap(),
            Value::Str(String::new())
        );
    }

    #[test]
    fn test_enum_equality_is_by_ordinal() {
        let a = Value::Enum {
            enum_id: EnumId(0),
            ordinal: 2,
        };
        let b = Value::from_const(&Const::Enum {
            enum_id: EnumId(0),
            ordinal: 2,
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_accessor_mismatch_reports_types() {
        let err = Value::Int(3).as_bool().unwrap_err();
        assert_eq!(err, EvalError::TypeMismatch("expected bool, found int".into()));
        assert!(Value::Unit.field(0).is_err());
    }
}
