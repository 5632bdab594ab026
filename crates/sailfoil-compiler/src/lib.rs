//! sailfoil compiler: orchestrates the full compilation pipeline.
//!
//! ```text
//! IR source → Lexer → Parser → Resolver → Codegen → Program (JSON artifact)
//! ```
//!
//! Each stage reports into one [`CompileErrors`] list; code generation only
//! runs on a module that resolved cleanly.

pub mod resolve;

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use sailfoil_codegen::{CodegenError, CodegenOptions, Program};
use sailfoil_types::ast::Module;
use sailfoil_types::{CompileErrors, FoilError, SourceFile, Span, SymbolTable};

pub use resolve::Resolver;

/// A parsed module with every type reference linked to `symbols`.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub module: Module,
    pub symbols: SymbolTable,
}

/// Lex, parse and resolve a source file.
pub fn resolve_source(source: &str, filename: &str) -> Result<Resolved, CompileErrors> {
    let source_file = SourceFile::new(filename, source);
    resolve_file(&source_file)
}

fn resolve_file(source_file: &SourceFile) -> Result<Resolved, CompileErrors> {
    let parsed = sailfoil_parser::parse_source(source_file);
    let mut errors = parsed.errors;
    let Some(mut module) = parsed.module else {
        return Err(errors);
    };
    if errors.has_errors() {
        return Err(errors);
    }
    tracing::debug!(file = %source_file.name, decls = module.decls.len(), "parsed");

    let symbols = Resolver::new(&mut errors, source_file).resolve(&mut module);
    if errors.has_errors() {
        return Err(errors);
    }
    Ok(Resolved { module, symbols })
}

/// Run the front end and resolver only, returning every diagnostic.
pub fn check(source: &str, filename: &str) -> CompileErrors {
    match resolve_source(source, filename) {
        Ok(_) => CompileErrors::empty(),
        Err(errors) => errors,
    }
}

/// Compile IR source to a target program with default options.
pub fn compile(source: &str, filename: &str) -> Result<Program, CompileErrors> {
    compile_with_options(source, filename, &CodegenOptions::default())
}

pub fn compile_with_options(
    source: &str,
    filename: &str,
    options: &CodegenOptions,
) -> Result<Program, CompileErrors> {
    let source_file = SourceFile::new(filename, source);
    let resolved = resolve_file(&source_file)?;
    sailfoil_codegen::generate(&resolved.module, &resolved.symbols, options).map_err(|e| {
        let mut errors = CompileErrors::empty();
        errors.push_error(codegen_diagnostic(&e, &source_file));
        errors
    })
}

fn codegen_diagnostic(error: &CodegenError, source_file: &SourceFile) -> FoilError {
    let span = error.span().unwrap_or(Span::point(1, 1));
    let source_line = source_file.line(span.line).unwrap_or("").to_string();
    FoilError::new(
        &source_file.name,
        error.code(),
        error.to_string(),
        span,
        source_line,
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// Results & artifacts
// ══════════════════════════════════════════════════════════════════════════════

/// Serializable outcome of one compilation, for tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    pub program: Option<Program>,
    /// SHA-256 of the program's JSON encoding, lowercase hex.
    pub program_hash: Option<String>,
    pub errors: CompileErrors,
}

/// Compile and package the outcome, never failing.
pub fn compile_to_result(source: &str, filename: &str) -> CompileResult {
    match compile(source, filename) {
        Ok(program) => match fingerprint(&program) {
            Ok(hash) => CompileResult {
                success: true,
                program: Some(program),
                program_hash: Some(hash),
                errors: CompileErrors::empty(),
            },
            Err(e) => {
                let mut errors = CompileErrors::empty();
                errors.push_error(FoilError::new(
                    filename,
                    sailfoil_types::ErrorCode::CODEGEN_INTERNAL,
                    format!("program serialization failed: {e}"),
                    Span::point(1, 1),
                    "",
                ));
                CompileResult {
                    success: false,
                    program: None,
                    program_hash: None,
                    errors,
                }
            }
        },
        Err(errors) => CompileResult {
            success: false,
            program: None,
            program_hash: None,
            errors,
        },
    }
}

/// SHA-256 fingerprint of a program's JSON encoding.
pub fn fingerprint(program: &Program) -> serde_json::Result<String> {
    let json = program.to_json()?;
    Ok(hex_digest(json.as_bytes()))
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to serialize program: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Write `program` as JSON to `path` and return its fingerprint.
pub fn emit_artifact(program: &Program, path: impl AsRef<Path>) -> Result<String, ArtifactError> {
    let json = program.to_json()?;
    std::fs::write(path.as_ref(), json.as_bytes())?;
    let hash = hex_digest(json.as_bytes());
    tracing::debug!(path = %path.as_ref().display(), hash = %hash, "wrote artifact");
    Ok(hash)
}
