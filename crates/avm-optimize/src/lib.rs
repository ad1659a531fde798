//! The optimizer: a fixed-point loop of peephole folding, constant sinking,
//! and dead-code elimination over the SSA IR.
//!
//! # Modules
//!
//! - [`diagnostics`] -- the `Diagnostics` sink and its `Severity` levels
//! - [`fold`] -- the constant-fold registry shared by the peephole pass
//! - [`peephole`] -- per-op algebraic identities and constant folds
//! - [`sink`] -- commutative-associative constant sinking
//! - [`dce`] -- dead code, dead block, and copy-propagation elimination
//! - [`driver`] -- the fixed-point convergence loop

pub mod dce;
pub mod diagnostics;
pub mod error;
pub mod fold;
pub mod peephole;
pub mod sink;

mod driver;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use driver::{optimize_program, optimize_subroutine, OptimizerConfig, OptimizerState};
pub use error::OptimizeError;
pub use sink::RegisterUsageCounter;
