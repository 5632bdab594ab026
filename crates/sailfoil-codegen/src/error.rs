//! Codegen error types.

use sailfoil_types::{ErrorCode, Span};
use thiserror::Error;

/// Errors that abort code generation. No partial program is produced.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// An IR construct the generator does not lower.
    #[error("unsupported construct: {message}")]
    Unsupported { message: String, span: Span },

    /// An internal consistency check failed.
    #[error("internal codegen error: {0}")]
    Internal(String),

    /// A name with no usable definition.
    #[error("unresolved symbol '{name}' in {function}")]
    UnresolvedSymbol {
        name: String,
        function: String,
        span: Span,
    },

    /// A type reference the resolver never linked.
    #[error("type reference '{name}' was not resolved")]
    UnresolvedTypeReference { name: String, span: Span },

    /// A `fn` without a `val` signature.
    #[error("function '{name}' has no signature")]
    MissingSignature { name: String, span: Span },

    #[error("{function}: jump target {target} is outside the body (0..{len})")]
    JumpOutOfRange {
        function: String,
        target: usize,
        len: usize,
        span: Span,
    },

    /// The same local declared twice with different types.
    #[error("{function}: local '{name}' redeclared with a different type")]
    ConflictingLocal {
        function: String,
        name: String,
        span: Span,
    },

    /// A function or extern call inside an expression.
    #[error("{function}: call to '{callee}' must be the whole right-hand side")]
    NestedCall {
        function: String,
        callee: String,
        span: Span,
    },
}

impl CodegenError {
    /// Diagnostic code used when the compiler reports this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CodegenError::Unsupported { .. } => ErrorCode::CODEGEN_UNSUPPORTED,
            CodegenError::Internal(_) => ErrorCode::CODEGEN_INTERNAL,
            CodegenError::UnresolvedSymbol { .. } => ErrorCode::UNDEFINED_NAME,
            CodegenError::UnresolvedTypeReference { .. } => ErrorCode::UNDEFINED_NAME,
            CodegenError::MissingSignature { .. } => ErrorCode::MISSING_SIGNATURE,
            CodegenError::JumpOutOfRange { .. } => ErrorCode::JUMP_OUT_OF_RANGE,
            CodegenError::ConflictingLocal { .. } => ErrorCode::CONFLICTING_LOCAL,
            CodegenError::NestedCall { .. } => ErrorCode::NESTED_CALL,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CodegenError::Internal(_) => None,
            CodegenError::Unsupported { span, .. }
            | CodegenError::UnresolvedSymbol { span, .. }
            | CodegenError::UnresolvedTypeReference { span, .. }
            | CodegenError::MissingSignature { span, .. }
            | CodegenError::JumpOutOfRange { span, .. }
            | CodegenError::ConflictingLocal { span, .. }
            | CodegenError::NestedCall { span, .. } => Some(*span),
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;
