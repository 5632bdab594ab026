//! sailfoil code generator: lowers a resolved IR module to a [`Program`].
//!
//! # Architecture
//!
//! Generation runs in three steps over one module:
//!
//! 1. **Globals.** Enums, unions, registers and functions receive dense ids
//!    in declaration order. Enum variant `i` has ordinal `i`; union variant
//!    `i` has tag `i`.
//! 2. **Analysis.** [`analysis::raising_functions`] computes which functions
//!    can return with the exception flag set.
//! 3. **Bodies.** Each function's statement list is split at jump targets
//!    and block-ending statements into [`BasicBlock`]s. Calls to functions
//!    that may raise get a pending-exception check unless the IR tests the
//!    flag on the very next statement.
//!
//! The resulting [`Program`] is plain data: it serializes to JSON and is
//! what the `sailfoil-eval` runtime executes. [`listing::render`] prints a
//! deterministic text form for inspection.

pub mod analysis;
pub mod compiler;
pub mod error;
pub mod listing;
mod lower;
pub mod program;

pub use compiler::{generate, CodegenOptions};
pub use error::{CodegenError, CodegenResult};
pub use program::*;
