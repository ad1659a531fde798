//! Optimizer-internal invariant failures: conditions that should never be
//! reachable given well-formed input IR, distinct from the diagnostics sink
//! which reports findings about the program being compiled.

use avm_ir::SourceLocation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("{pass} pass at {loc} produced IR that failed validation: {reason}")]
    InvariantViolation {
        pass: &'static str,
        reason: String,
        loc: SourceLocation,
    },
    #[error("subroutine {name} did not converge within {cap} iterations")]
    IterationCapExceeded { name: String, cap: u32 },
    #[error(transparent)]
    Ir(#[from] avm_ir::IrError),
}
