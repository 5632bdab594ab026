//! The flat global symbol table built by name resolution.
//!
//! Enum variants and union variants share one namespace with every other
//! global, so the table maps each name to exactly one [`Info`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::Type;

/// Index of an [`Info`] in its [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    GlobalVal,
    Enum,
    EnumVariant,
    Union,
    UnionVariant,
    Register,
}

impl InfoKind {
    pub fn describe(self) -> &'static str {
        match self {
            InfoKind::GlobalVal => "global value",
            InfoKind::Enum => "enum",
            InfoKind::EnumVariant => "enum variant",
            InfoKind::Union => "union",
            InfoKind::UnionVariant => "union variant",
            InfoKind::Register => "register",
        }
    }
}

/// The resolved value attached to a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    None,
    /// Dense 0-based ordinal of an enum variant.
    Ordinal(u32),
    /// 0-based position of a union variant; also its runtime tag.
    Tag(u32),
    /// Support-library symbol of an extern `val`.
    Extern(String),
}

/// Everything known about one global name.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub name: String,
    pub kind: InfoKind,
    /// Resolved type: the declared type of a `val` or register, the payload
    /// of a union variant. `None` for enums, unions and enum variants.
    pub ty: Option<Type>,
    pub value: InfoValue,
    /// Index of the defining declaration in `Module::decls`.
    pub decl: usize,
    /// The enum or union a variant belongs to.
    pub parent: Option<SymbolId>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    infos: Vec<Info>,
    by_name: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new name. Returns the existing id if the name is already taken.
    pub fn insert(&mut self, info: Info) -> Result<SymbolId, SymbolId> {
        if let Some(&existing) = self.by_name.get(&info.name) {
            return Err(existing);
        }
        let id = SymbolId(self.infos.len() as u32);
        self.by_name.insert(info.name.clone(), id);
        self.infos.push(info);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    pub fn lookup_info(&self, name: &str) -> Option<&Info> {
        self.lookup(name).map(|id| self.get(id))
    }

    pub fn get(&self, id: SymbolId) -> &Info {
        &self.infos[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Info {
        &mut self.infos[id.index()]
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Info)> {
        self.infos
            .iter()
            .enumerate()
            .map(|(i, info)| (SymbolId(i as u32), info))
    }

    /// Variants of an enum or union, in declaration order.
    pub fn variants_of(&self, parent: SymbolId) -> impl Iterator<Item = (SymbolId, &Info)> {
        self.iter().filter(move |(_, info)| info.parent == Some(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, kind: InfoKind, value: InfoValue, parent: Option<SymbolId>) -> Info {
        Info {
            name: name.to_string(),
            kind,
            ty: None,
            value,
            decl: 0,
            parent,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = SymbolTable::new();
        let e = table
            .insert(info("zjump", InfoKind::Enum, InfoValue::None, None))
            .unwrap();
        let v = table
            .insert(info("zJGT", InfoKind::EnumVariant, InfoValue::Ordinal(1), Some(e)))
            .unwrap();
        assert_eq!(table.lookup("zJGT"), Some(v));
        assert_eq!(table.get(v).value, InfoValue::Ordinal(1));
        assert_eq!(table.lookup("zJMP"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut table = SymbolTable::new();
        let first = table
            .insert(info("zx", InfoKind::Register, InfoValue::None, None))
            .unwrap();
        let dup = table.insert(info("zx", InfoKind::GlobalVal, InfoValue::None, None));
        assert_eq!(dup, Err(first));
        assert_eq!(table.get(first).kind, InfoKind::Register);
    }

    #[test]
    fn test_variants_of_preserves_order() {
        let mut table = SymbolTable::new();
        let u = table
            .insert(info("zinstr", InfoKind::Union, InfoValue::None, None))
            .unwrap();
        for (i, name) in ["zAINST", "zCINST"].iter().enumerate() {
            table
                .insert(info(name, InfoKind::UnionVariant, InfoValue::Tag(i as u32), Some(u)))
                .unwrap();
        }
        let names: Vec<_> = table.variants_of(u).map(|(_, i)| i.name.as_str()).collect();
        assert_eq!(names, ["zAINST", "zCINST"]);
    }
}
