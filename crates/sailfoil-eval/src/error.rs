//! Runtime error types for the sailfoil runtime.
//!
//! Model exceptions are not errors: they travel through the exception flag
//! and value in [`crate::Machine`]. Everything here is a host-level failure
//! that stops the simulation.

use sailfoil_mem::MemoryFault;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// An `unreachable` statement, or the end of a body, was reached.
    #[error("unreachable code reached at {location}")]
    Unreachable { location: String },

    /// Payload projection on a value holding a different variant.
    #[error("expected variant '{expected}', found '{found}'")]
    VariantMismatch { expected: String, found: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("unknown extern symbol '{0}'")]
    UnknownExtern(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    #[error("'{name}' takes {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("call depth exceeded {0}")]
    CallDepthExceeded(usize),

    /// Overflow, negative shift amounts, out-of-range widths.
    #[error("arithmetic trap: {0}")]
    ArithmeticTrap(String),

    /// `current_exception` was read before anything was raised.
    #[error("no exception value recorded")]
    NoPendingException,

    #[error(transparent)]
    Memory(#[from] MemoryFault),
}

/// Result alias for runtime operations.
pub type EvalResult<T> = Result<T, EvalError>;
