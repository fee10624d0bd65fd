//! Error types for the lowering pass.
//!
//! Every failure in this crate aborts the whole compilation: the backend
//! never emits a partial or degraded module. The kind enum separates
//! corrupt frontend output (`MalformedImage`) from features the backend
//! knowingly does not lower yet (`UnsupportedFeature`), so a build driver
//! can report them differently even though both stop the build.

use std::fmt;

/// What category of failure stopped the lowering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The program image or a bytecode stream inside it is corrupt:
    /// unknown opcodes or type tags, truncated instruction streams,
    /// missing mandatory child directories, dangling cross-references.
    MalformedImage,

    /// The input is well-formed but uses a feature this backend does not
    /// lower yet (struct-typed locals, intra-module calls).
    UnsupportedFeature,

    /// A call targets an import-kind directory that was never registered
    /// in the import map.
    UnresolvedReference,

    /// The finished module failed wasmparser validation. Indicates a bug
    /// in this pass rather than in the input.
    WasmValidation,
}

pub fn error_kind_to_str(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::MalformedImage => "Malformed Program Image",
        ErrorKind::UnsupportedFeature => "Unsupported Feature",
        ErrorKind::UnresolvedReference => "Unresolved Reference",
        ErrorKind::WasmValidation => "WASM Validation Failure",
    }
}

/// A fatal error raised somewhere in the lowering pass.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub msg: String,
    pub kind: ErrorKind,
}

impl CompileError {
    pub fn new(msg: impl Into<String>, kind: ErrorKind) -> CompileError {
        CompileError {
            msg: msg.into(),
            kind,
        }
    }

    /// Corrupt or inconsistent frontend output.
    pub fn malformed(msg: impl Into<String>) -> CompileError {
        CompileError::new(msg, ErrorKind::MalformedImage)
    }

    /// Valid input hitting a known gap in this backend.
    pub fn unsupported(msg: impl Into<String>) -> CompileError {
        CompileError::new(msg, ErrorKind::UnsupportedFeature)
    }

    /// A call target missing from the import map.
    pub fn unresolved(msg: impl Into<String>) -> CompileError {
        CompileError::new(msg, ErrorKind::UnresolvedReference)
    }

    /// The encoded module failed validation.
    pub fn wasm_validation(msg: impl Into<String>) -> CompileError {
        CompileError::new(msg, ErrorKind::WasmValidation)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", error_kind_to_str(&self.kind), self.msg)
    }
}

impl std::error::Error for CompileError {}
