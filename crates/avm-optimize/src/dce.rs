//! Dead-code elimination, dead-block elimination, and copy propagation.
//!
//! Three sweeps over a subroutine, run in sequence within one pass
//! invocation (the driver's fixed-point loop re-runs the whole pass set
//! until nothing changes further):
//!
//! 1. copy propagation -- replace every use of `y` where `y = x` (a trivial
//!    value-copy assignment) with `x` directly, and likewise for trivial
//!    phis (every operand the same value, modulo self-references).
//! 2. dead-block elimination -- drop blocks unreachable from the entry.
//! 3. dead-code elimination -- drop assignments and phis whose targets are
//!    never read anywhere in the surviving subroutine, provided the
//!    intrinsic or invocation has no side effect that must still execute.

use crate::sink::RegisterUsageCounter;
use avm_ir::{OpSource, Register, Subroutine, Terminator, Value};
use std::collections::HashMap;

/// Intrinsics whose evaluation has an effect beyond producing a value
/// (aborting the program, or deadening the stack) and so must never be
/// dropped even when their result is unused.
const SIDE_EFFECTING_OPS: &[&str] = &["assert", "err", "return", "log"];

pub fn dce_pass(sub: &Subroutine) -> (Subroutine, bool) {
    let mut changed = false;
    let mut out = sub.clone();

    let (propagated, copy_changed) = propagate_copies(&out);
    out = propagated;
    changed |= copy_changed;

    let (pruned, block_changed) = remove_dead_blocks(&out);
    out = pruned;
    changed |= block_changed;

    let (culled, dce_changed) = remove_dead_assignments(&out);
    out = culled;
    changed |= dce_changed;

    (out, changed)
}

/// Builds a substitution table from trivial-copy registers to the value
/// they copy, then rewrites every use in the subroutine through that table
/// (resolving chains of copies). The copy assignments/phis themselves are
/// left in place for the dead-code sweep to remove once no longer used.
fn propagate_copies(sub: &Subroutine) -> (Subroutine, bool) {
    let mut subst: HashMap<Register, Value> = HashMap::new();
    for block in &sub.body {
        for phi in &block.phis {
            if let Some(v) = phi.trivial_value() {
                subst.insert(phi.register.clone(), v);
            }
        }
        for op in &block.ops {
            if let (OpSource::Value(v), [target]) = (&op.source, op.targets.as_slice()) {
                subst.insert(target.clone(), v.clone());
            }
        }
    }
    if subst.is_empty() {
        return (sub.clone(), false);
    }

    let resolve = |v: &Value| -> Value {
        let mut cur = v.clone();
        let mut seen = std::collections::HashSet::new();
        loop {
            match &cur {
                Value::Register(r) if seen.insert(r.clone()) => match subst.get(r) {
                    Some(next) => cur = next.clone(),
                    None => break,
                },
                _ => break,
            }
        }
        cur
    };

    let mut out = sub.clone();
    let mut changed = false;
    for block in out.body.iter_mut() {
        for phi in block.phis.iter_mut() {
            for (_, v) in phi.args.iter_mut() {
                let resolved = resolve(v);
                if &resolved != v {
                    *v = resolved;
                    changed = true;
                }
            }
        }
        for op in block.ops.iter_mut() {
            let args = match &mut op.source {
                OpSource::Intrinsic(i) => &mut i.args,
                OpSource::Invoke(inv) => &mut inv.args,
                OpSource::Value(v) => std::slice::from_mut(v),
            };
            for v in args.iter_mut() {
                let resolved = resolve(v);
                if &resolved != v {
                    *v = resolved;
                    changed = true;
                }
            }
        }
        match &mut block.terminator {
            Terminator::CondBranch { cond, .. } => {
                let resolved = resolve(cond);
                if &resolved != cond {
                    *cond = resolved;
                    changed = true;
                }
            }
            Terminator::Switch { value, .. } | Terminator::GotoNth { value, .. } => {
                let resolved = resolve(value);
                if &resolved != value {
                    *value = resolved;
                    changed = true;
                }
            }
            Terminator::SubroutineReturn(vs) => {
                for v in vs.iter_mut() {
                    let resolved = resolve(v);
                    if &resolved != v {
                        *v = resolved;
                        changed = true;
                    }
                }
            }
            Terminator::ProgramExit(v) => {
                let resolved = resolve(v);
                if &resolved != v {
                    *v = resolved;
                    changed = true;
                }
            }
            Terminator::Goto(_) | Terminator::Fail(_) => {}
        }
    }
    (out, changed)
}

fn remove_dead_blocks(sub: &Subroutine) -> (Subroutine, bool) {
    let reachable = sub.reachable_blocks();
    let before = sub.body.len();
    let mut out = sub.clone();
    out.body.retain(|b| reachable.contains(&b.id));
    for block in out.body.iter_mut() {
        block.predecessors.retain(|p| reachable.contains(p));
    }
    let changed = out.body.len() != before;
    (out, changed)
}

fn remove_dead_assignments(sub: &Subroutine) -> (Subroutine, bool) {
    let usage = RegisterUsageCounter::count(sub);
    let mut out = sub.clone();
    let mut changed = false;

    for block in out.body.iter_mut() {
        let before = block.phis.len();
        block
            .phis
            .retain(|phi| usage.uses(&phi.register) > 0 || returned_directly(sub, &phi.register));
        changed |= block.phis.len() != before;

        let before = block.ops.len();
        block.ops.retain(|op| {
            let is_used = op.targets.iter().any(|t| usage.uses(t) > 0);
            let has_effect = match &op.source {
                OpSource::Intrinsic(i) => SIDE_EFFECTING_OPS.contains(&i.op_code.as_str()),
                OpSource::Invoke(_) => true,
                OpSource::Value(_) => false,
            };
            op.targets.is_empty() && has_effect || is_used || has_effect
        });
        changed |= block.ops.len() != before;
    }
    (out, changed)
}

fn returned_directly(sub: &Subroutine, reg: &Register) -> bool {
    sub.body.iter().any(|b| match &b.terminator {
        Terminator::SubroutineReturn(vs) => vs.iter().any(|v| v == &Value::Register(reg.clone())),
        Terminator::ProgramExit(v) => v == &Value::Register(reg.clone()),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{AType, Assignment, BasicBlock, BlockId, Intrinsic, Phi};

    #[test]
    fn copy_propagation_eliminates_indirection() {
        let x = Register::new("x", 0, AType::U64);
        let y = Register::new("y", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![Value::Register(y.clone())]));
        block.ops = vec![Assignment::single(y.clone(), OpSource::Value(Value::Register(x.clone())))];
        let sub = Subroutine::new("f", vec![x.clone()], vec![AType::U64], vec![block]);
        let (out, changed) = propagate_copies(&sub);
        assert!(changed);
        match &out.body[0].terminator {
            Terminator::SubroutineReturn(vs) => assert_eq!(vs[0], Value::Register(x)),
            other => panic!("unexpected terminator: {:?}", other),
        }
    }

    #[test]
    fn dead_block_is_removed() {
        let mut entry = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        entry.refresh_successors();
        let dead = BasicBlock::new(BlockId(1), Terminator::SubroutineReturn(vec![]));
        let sub = Subroutine::new("f", vec![], vec![], vec![entry, dead]);
        let (out, changed) = remove_dead_blocks(&sub);
        assert!(changed);
        assert_eq!(out.body.len(), 1);
    }

    #[test]
    fn unused_assignment_is_dropped() {
        let dead = Register::new("dead", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.ops = vec![Assignment::single(
            dead,
            OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(1), Value::u64_const(2)])),
        )];
        let sub = Subroutine::new("f", vec![], vec![], vec![block]);
        let (out, changed) = remove_dead_assignments(&sub);
        assert!(changed);
        assert!(out.body[0].ops.is_empty());
    }

    #[test]
    fn side_effecting_op_with_no_target_survives() {
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.ops = vec![Assignment::discard(OpSource::Intrinsic(Intrinsic::new(
            "assert",
            vec![Value::u64_const(1)],
        )))];
        let sub = Subroutine::new("f", vec![], vec![], vec![block]);
        let (out, changed) = remove_dead_assignments(&sub);
        assert!(!changed);
        assert_eq!(out.body[0].ops.len(), 1);
    }

    #[test]
    fn trivial_phi_with_no_other_uses_is_dropped() {
        let r = Register::new("r", 1, AType::U64);
        let x = Register::new("x", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.phis = vec![Phi {
            register: r,
            args: vec![(BlockId(1), Value::Register(x))],
        }];
        let sub = Subroutine::new("f", vec![], vec![], vec![block]);
        let (out, changed) = remove_dead_assignments(&sub);
        assert!(changed);
        assert!(out.body[0].phis.is_empty());
    }
}
