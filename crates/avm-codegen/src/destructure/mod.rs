//! SSA destruction: the stage between the optimizer's fixed-point IR and
//! the linear MIR builder. Four steps run in order, mirroring a textbook
//! out-of-SSA pipeline:
//!
//! 1. [`cssa`] -- conversion to conventional SSA, by inserting a copy on
//!    every phi-argument edge so each phi's congruence class is safe to
//!    merge unconditionally.
//! 2. [`phi`] -- phi removal, turning each phi into a set of parallel
//!    copies to run at the end of every contributing predecessor.
//! 3. [`sequentialize`] -- breaking each predecessor's parallel-copy set
//!    into a correct sequential order, introducing a scratch register
//!    only where a copy cycle demands one.
//! 4. [`coalesce`] -- folding the CSSA-introduced temporaries back onto a
//!    shared local where their congruence class makes that safe, so the
//!    MIR builder doesn't allocate a dedicated slot per copy.

pub mod coalesce;
pub mod cssa;
pub mod phi;
pub mod sequentialize;

use avm_ir::{Program, Subroutine};

pub fn destructure_subroutine(sub: &Subroutine) -> Subroutine {
    let sub = cssa::convert_to_cssa(sub);
    let (sub, copies) = phi::remove_phi_nodes(&sub);
    let sub = sequentialize::sequentialize_parallel_copies(&sub, copies);
    coalesce::coalesce_locals(&sub)
}

pub fn destructure_program(program: &Program) -> Program {
    Program {
        id: program.id.clone(),
        main: destructure_subroutine(&program.main),
        subroutines: program.subroutines.iter().map(destructure_subroutine).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{AType, BasicBlock, BlockId, Phi, Register, Terminator, Value};

    #[test]
    fn destructure_leaves_no_phis_behind() {
        let r = Register::new("x", 1, AType::U64);
        let mut b0 = BasicBlock::new(BlockId(0), Terminator::Goto(BlockId(2)));
        b0.refresh_successors();
        let mut b1 = BasicBlock::new(BlockId(1), Terminator::Goto(BlockId(2)));
        b1.refresh_successors();
        let mut b2 = BasicBlock::new(BlockId(2), Terminator::SubroutineReturn(vec![Value::Register(r.clone())]));
        b2.phis = vec![Phi {
            register: r,
            args: vec![
                (BlockId(0), Value::u64_const(1)),
                (BlockId(1), Value::u64_const(2)),
            ],
        }];
        b2.predecessors = vec![BlockId(0), BlockId(1)];
        let sub = Subroutine::new("f", vec![], vec![AType::U64], vec![b0, b1, b2]);
        let out = destructure_subroutine(&sub);
        assert!(out.body.iter().all(|b| b.phis.is_empty()));
    }
}
