use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of diagnostics kept before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

/// Diagnostic category, derived from the code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Resolution,
    Structure,
    Codegen,
}

/// Numeric diagnostic code (E100–E499).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNTERMINATED_STRING: Self = Self(101);
    pub const INVALID_LITERAL: Self = Self(102);
    pub const UNCLOSED_BRACE: Self = Self(103);

    // ── Resolution (E200–E299) ──
    pub const UNDEFINED_NAME: Self = Self(200);
    pub const REDEFINITION: Self = Self(201);
    pub const KIND_MISMATCH: Self = Self(202);
    pub const MISSING_SIGNATURE: Self = Self(203);

    // ── Structure (E300–E399) ──
    pub const JUMP_OUT_OF_RANGE: Self = Self(300);
    pub const CONFLICTING_LOCAL: Self = Self(301);
    pub const NESTED_CALL: Self = Self(302);

    // ── Code generation (E400–E499) ──
    pub const CODEGEN_INTERNAL: Self = Self(400);
    pub const CODEGEN_UNSUPPORTED: Self = Self(401);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            200..=299 => ErrorCategory::Resolution,
            300..=399 => ErrorCategory::Structure,
            400..=499 => ErrorCategory::Codegen,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syntax => "syntax",
            Self::Resolution => "resolution",
            Self::Structure => "structure",
            Self::Codegen => "codegen",
        };
        f.write_str(name)
    }
}

/// A structured compiler diagnostic.
///
/// Tools render these directly; nothing downstream parses the message text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoilError {
    /// Source file name.
    pub file: String,
    pub code: ErrorCode,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The offending source line, verbatim.
    pub source_line: String,
}

impl FoilError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }
}

impl fmt::Display for FoilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for FoilError {}

/// Accumulated diagnostics of one compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<FoilError>,
    /// Includes errors dropped past the cap.
    pub total_errors: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// `true` once the retained list is full.
    pub fn is_saturated(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Record an error. Only the first [`MAX_ERRORS`] are retained.
    pub fn push_error(&mut self, error: FoilError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Append every diagnostic of `other`, respecting the cap.
    pub fn extend(&mut self, other: CompileErrors) {
        let dropped = other.total_errors - other.errors.len();
        for error in other.errors {
            self.push_error(error);
        }
        self.total_errors += dropped;
    }

    /// Codes of the retained errors, in report order.
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{error}")?;
        }
        if self.total_errors > self.errors.len() {
            writeln!(
                f,
                "... and {} more errors",
                self.total_errors - self.errors.len()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
