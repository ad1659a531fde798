//! IR model and AWST lowering for the AVM compiler backend.
//!
//! This crate owns the parts of the pipeline that define *what a program
//! is*: the op table (read-only registry of intrinsic signatures), the SSA
//! IR data model (registers, constants, basic blocks, subroutines,
//! programs), and the lowering from a typed AST boundary into that IR.
//!
//! # Modules
//!
//! - [`optable`] -- static registry of intrinsic op signatures
//! - [`value`] -- `Register`, `Constant`, `Value`, `AType`
//! - [`bigint`] -- arbitrary-precision unsigned integers for bytes-math folding
//! - [`ops`] -- `Intrinsic`, `InvokeSubroutine`, `Phi`, `Assignment`
//! - [`block`] -- `BasicBlock`, `Terminator`
//! - [`subroutine`] -- `Subroutine`, `Program`, `Contract`
//! - [`awst`] -- the typed-AST input boundary
//! - [`lower`] -- AWST to SSA IR lowering

pub mod awst;
pub mod bigint;
pub mod block;
pub mod error;
pub mod id;
pub mod lower;
pub mod optable;
pub mod ops;
pub mod subroutine;
pub mod value;

pub use bigint::BigUint;
pub use block::{BasicBlock, Terminator};
pub use error::{IrError, SourceLocation};
pub use id::BlockId;
pub use ops::{Assignment, Immediate, Intrinsic, InvokeSubroutine, OpSource, Phi};
pub use optable::{ImmediateKind, OpSignature, OpTable};
pub use subroutine::{Contract, Program, StateTotals, Subroutine};
pub use value::{AType, Constant, Encoding, Register, Value};
