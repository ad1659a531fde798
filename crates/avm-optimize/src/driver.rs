//! The optimizer driver: runs the peephole, constant-sinking, and
//! dead-code passes to a fixed point, one subroutine at a time.
//!
//! Each iteration applies all three passes in sequence and records whether
//! any of them changed the subroutine. The loop stops at the first
//! iteration where nothing changed (`Converged`), or after `max_iterations`
//! with no such iteration (`Capped` -- the subroutine is still returned,
//! just not provably at a fixed point; this is not itself an error, since
//! oscillation this deep would point at a pass bug rather than a malformed
//! program, and the cap exists as a backstop rather than an expected path).

use crate::dce::dce_pass;
use crate::diagnostics::Diagnostics;
use crate::peephole::peephole_pass;
use crate::sink::sink_pass;
use avm_ir::{Program, Subroutine};

/// Where a subroutine's optimization run landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Running,
    Converged,
    Capped,
}

#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig { max_iterations: 64 }
    }
}

pub fn optimize_subroutine(
    sub: &Subroutine,
    diagnostics: &mut Diagnostics,
    config: OptimizerConfig,
) -> (Subroutine, OptimizerState) {
    let span = tracing::debug_span!("optimize_subroutine", name = %sub.name);
    let _enter = span.enter();

    let mut current = sub.clone();
    let mut state = OptimizerState::Running;
    for iteration in 0..config.max_iterations {
        let mut iteration_changed = false;

        let (next, peephole_changed) = peephole_pass(&current, diagnostics);
        current = next;
        iteration_changed |= peephole_changed;

        let (next, sink_changed) = sink_pass(&current);
        current = next;
        iteration_changed |= sink_changed;

        let (next, dce_changed) = dce_pass(&current);
        current = next;
        iteration_changed |= dce_changed;

        tracing::debug!(iteration, peephole_changed, sink_changed, dce_changed, "pass round");

        if !iteration_changed {
            state = OptimizerState::Converged;
            break;
        }
    }
    if state == OptimizerState::Running {
        state = OptimizerState::Capped;
        diagnostics.warn(
            format!(
                "subroutine {} did not converge within {} iterations",
                current.name, config.max_iterations
            ),
            None,
        );
    }
    (current, state)
}

pub fn optimize_program(
    program: &Program,
    diagnostics: &mut Diagnostics,
    config: OptimizerConfig,
) -> Program {
    let (main, _) = optimize_subroutine(&program.main, diagnostics, config);
    let subroutines = program
        .subroutines
        .iter()
        .map(|s| optimize_subroutine(s, diagnostics, config).0)
        .collect();
    Program {
        id: program.id.clone(),
        main,
        subroutines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{AType, Assignment, BasicBlock, BlockId, Intrinsic, OpSource, Register, Terminator, Value};

    #[test]
    fn converges_when_no_pass_finds_further_work() {
        let r = Register::new("r", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![Value::Register(r.clone())]));
        block.ops = vec![Assignment::single(
            r,
            OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(1), Value::u64_const(2)])),
        )];
        let sub = Subroutine::new("f", vec![], vec![AType::U64], vec![block]);
        let mut diagnostics = Diagnostics::new();
        let (out, state) = optimize_subroutine(&sub, &mut diagnostics, OptimizerConfig::default());
        assert_eq!(state, OptimizerState::Converged);
        match &out.body[0].terminator {
            Terminator::SubroutineReturn(vs) => assert_eq!(vs[0], Value::u64_const(3)),
            other => panic!("unexpected terminator: {:?}", other),
        }
        assert!(out.body[0].ops.is_empty());
    }

    #[test]
    fn sinking_then_folding_converges_in_one_driver_call() {
        // t = add(3, x); r = add(t, 4) -- sink first, then fold: r = add(x, 7).
        let x = Register::new("x", 0, AType::U64);
        let t = Register::new("t", 0, AType::U64);
        let r = Register::new("r", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![Value::Register(r.clone())]));
        block.ops = vec![
            Assignment::single(
                t.clone(),
                OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(3), Value::Register(x.clone())])),
            ),
            Assignment::single(
                r,
                OpSource::Intrinsic(Intrinsic::new("+", vec![Value::Register(t), Value::u64_const(4)])),
            ),
        ];
        let sub = Subroutine::new("f", vec![x], vec![AType::U64], vec![block]);
        let mut diagnostics = Diagnostics::new();
        let (out, state) = optimize_subroutine(&sub, &mut diagnostics, OptimizerConfig::default());
        assert_eq!(state, OptimizerState::Converged);
        match &out.body[0].ops[0].source {
            OpSource::Intrinsic(i) => assert_eq!(i.args[1], Value::u64_const(7)),
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn zero_iterations_reports_capped() {
        let r = Register::new("r", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![Value::Register(r.clone())]));
        block.ops = vec![Assignment::single(
            r,
            OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(1), Value::u64_const(2)])),
        )];
        let sub = Subroutine::new("f", vec![], vec![AType::U64], vec![block]);
        let mut diagnostics = Diagnostics::new();
        let (_out, state) = optimize_subroutine(&sub, &mut diagnostics, OptimizerConfig { max_iterations: 0 });
        assert_eq!(state, OptimizerState::Capped);
        assert!(!diagnostics.has_errors());
    }
}
