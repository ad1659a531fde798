//! Codegen error taxonomy: SSA-destruction/MIR invariant violations
//! (`InternalError`-family) and assembler user-facing errors
//! (`CodeError`-family), matching the teacher's per-crate `Error` enum
//! convention.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("phi node {register} survived SSA destruction in block{block}")]
    PhiSurvivedDestruction { register: String, block: u32 },

    #[error("block{block} successor/predecessor lists disagree: {detail}")]
    SuccessorPredecessorMismatch { block: u32, detail: String },

    #[error("op {op_code} arity mismatch after validation: expected {expected}, found {found}")]
    ArityMismatch {
        op_code: String,
        expected: usize,
        found: usize,
    },

    #[error("undefined label {0:?}")]
    UndefinedLabel(String),

    #[error("label {0:?} defined more than once")]
    DuplicateLabel(String),

    #[error("branch to {label:?} has offset {offset} outside [-0x8000, 0x7FFF]")]
    BranchTooFar { label: String, offset: i64 },

    #[error("invalid address literal {0:?}")]
    InvalidAddress(String),

    #[error("template variable error for {0:?}")]
    TemplateError(String),

    #[error("compiled-reference cycle: {}", .0.join(" -> "))]
    CompiledReferenceCycle(Vec<String>),

    #[error(transparent)]
    Ir(#[from] avm_ir::IrError),

    #[error(transparent)]
    Optimize(#[from] avm_optimize::OptimizeError),
}
