//! Phi removal: after `cssa::convert_to_cssa`, every phi argument is a
//! fresh edge temporary, so a phi can be deleted outright once its
//! `register := value` pairs are recorded as parallel copies to run at the
//! end of the contributing predecessor block. Several phis in the same
//! successor sharing a predecessor all land in that predecessor's copy
//! set, to be resolved together by `sequentialize`.

use avm_ir::{BlockId, Register, Subroutine, Value};
use std::collections::HashMap;

pub type ParallelCopies = HashMap<BlockId, Vec<(Register, Value)>>;

pub fn remove_phi_nodes(sub: &Subroutine) -> (Subroutine, ParallelCopies) {
    let mut out = sub.clone();
    let mut copies: ParallelCopies = HashMap::new();
    for block in &mut out.body {
        for phi in block.phis.drain(..) {
            for (pred, value) in phi.args {
                copies.entry(pred).or_default().push((phi.register.clone(), value));
            }
        }
    }
    (out, copies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{AType, BasicBlock, Phi, Terminator};

    #[test]
    fn phi_args_become_copies_keyed_by_predecessor() {
        let r = Register::new("x", 1, AType::U64);
        let mut b2 = BasicBlock::new(BlockId(2), Terminator::SubroutineReturn(vec![Value::Register(r.clone())]));
        b2.phis = vec![Phi {
            register: r.clone(),
            args: vec![
                (BlockId(0), Value::u64_const(1)),
                (BlockId(1), Value::u64_const(2)),
            ],
        }];
        let sub = Subroutine::new("f", vec![], vec![AType::U64], vec![b2]);
        let (out, copies) = remove_phi_nodes(&sub);
        assert!(out.body[0].phis.is_empty());
        assert_eq!(copies[&BlockId(0)], vec![(r.clone(), Value::u64_const(1))]);
        assert_eq!(copies[&BlockId(1)], vec![(r, Value::u64_const(2))]);
    }
}
