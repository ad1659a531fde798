//! Error taxonomy for the IR model and AWST lowering.
//!
//! Matches the three-family taxonomy carried through the whole pipeline:
//! `CodeError`-shaped variants carry a [`SourceLocation`] and surface to the
//! user; `InternalError`-shaped variants mark invariant violations and
//! should never occur outside of a bug.

use serde::{Deserialize, Serialize};

/// A position in the original source, carried through AWST into IR for
/// diagnostics. `None` fields mean "unknown" rather than "zero".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn unknown() -> Self {
        SourceLocation::default()
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}", file, line),
            (Some(file), None) => write!(f, "{}", file),
            _ => write!(f, "<unknown>"),
        }
    }
}

/// Errors raised while building the op table, lowering AWST, or querying IR.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// An op-code absent from the op table was referenced.
    #[error("unknown op '{op_code}' at {loc}")]
    UnknownOp {
        op_code: String,
        loc: SourceLocation,
    },

    /// A typed expression's type did not match the context it was used in.
    #[error("type mismatch at {loc}: expected {expected}, found {found}")]
    TypeMismatch {
        loc: SourceLocation,
        expected: String,
        found: String,
    },

    /// A name reference had no binding in scope.
    #[error("undefined symbol '{name}' at {loc}")]
    UndefinedSymbol { name: String, loc: SourceLocation },

    /// An intrinsic call's arity did not match its op-table signature.
    #[error("arity mismatch for op '{op_code}': expected {expected} args, found {found}")]
    ArityMismatch {
        op_code: String,
        expected: usize,
        found: usize,
    },

    /// An invariant of the IR model was violated -- a bug in this crate or
    /// its caller, not a user-facing mistake.
    #[error("internal error: {0}")]
    Internal(String),
}
