//! Injectable observation points.
//!
//! Hooks see the simulation but cannot change it: every callback takes the
//! event by shared reference and returns nothing. Each kind of event is only
//! delivered when the matching [`TraceConfig`](crate::TraceConfig) flag is set.

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
}

/// One memory access made by the generated program through the support library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAccess {
    pub kind: AccessKind,
    pub address: u64,
    pub width: usize,
    pub value: u64,
}

pub trait TraceHooks {
    /// An instruction retired. `pc` is the program counter register, when
    /// the driver was told which register that is.
    fn on_retire(&mut self, _retired: u64, _pc: Option<&Value>) {}

    fn on_register_write(&mut self, _name: &str, _value: &Value) {}

    fn on_memory_access(&mut self, _access: &MemoryAccess) {}

    fn on_platform(&mut self, _message: &str) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl TraceHooks for NoHooks {}
