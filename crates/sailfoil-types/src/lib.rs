//! Shared types for the sailfoil compiler.
//!
//! This crate defines the IR syntax tree, source spans, structured
//! diagnostics and the global symbol table shared by every stage from the
//! parser through code generation.

mod error;
mod span;
pub mod ast;
pub mod symbols;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, FoilError, MAX_ERRORS};
pub use span::{SourceFile, Span};
pub use symbols::{Info, InfoKind, InfoValue, SymbolId, SymbolTable};

/// Result type used throughout the sailfoil front end.
pub type Result<T> = std::result::Result<T, FoilError>;
