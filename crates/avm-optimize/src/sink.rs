//! Commutative-associative constant sinking.
//!
//! For each commutative op in `{+ * & | ^ b+ b* b& b| b^}`, given an
//! expression `f(const c1, f(const c2, reg r))` (in any orientation) where
//! `r` is used exactly once, rewrite to `f(r, fold(c1, c2))`. This sinks
//! constants toward a single pre-computed operand, exposing further folds.
//!
//! The use-count precondition is computed by a fresh traversal
//! (`RegisterUsageCounter`) over every op, phi, and terminator in the
//! subroutine -- re-run on every pass invocation since a prior pass may
//! have changed use counts.

use crate::fold::get_definition;
use avm_ir::{AType, BigUint, Constant, Encoding, Intrinsic, OpSource, Register, Subroutine, Terminator, Value};
use std::collections::HashMap;

const COMMUTATIVE_OPS: &[&str] = &["+", "*", "&", "|", "^", "b+", "b*", "b&", "b|", "b^"];

/// Counts every use of every register across a subroutine's ops, phis, and
/// terminators.
pub struct RegisterUsageCounter {
    counts: HashMap<Register, usize>,
}

impl RegisterUsageCounter {
    pub fn count(sub: &Subroutine) -> Self {
        let mut counts: HashMap<Register, usize> = HashMap::new();
        let mut note = |v: &Value, counts: &mut HashMap<Register, usize>| {
            if let Value::Register(r) = v {
                *counts.entry(r.clone()).or_insert(0) += 1;
            }
        };
        for block in &sub.body {
            for phi in &block.phis {
                for (_, v) in &phi.args {
                    note(v, &mut counts);
                }
            }
            for op in &block.ops {
                match &op.source {
                    OpSource::Intrinsic(i) => i.args.iter().for_each(|a| note(a, &mut counts)),
                    OpSource::Invoke(inv) => inv.args.iter().for_each(|a| note(a, &mut counts)),
                    OpSource::Value(v) => note(v, &mut counts),
                }
            }
            match &block.terminator {
                Terminator::CondBranch { cond, .. } => note(cond, &mut counts),
                Terminator::Switch { value, .. } => note(value, &mut counts),
                Terminator::GotoNth { value, .. } => note(value, &mut counts),
                Terminator::SubroutineReturn(vs) => vs.iter().for_each(|v| note(v, &mut counts)),
                Terminator::ProgramExit(v) => note(v, &mut counts),
                Terminator::Goto(_) | Terminator::Fail(_) => {}
            }
        }
        RegisterUsageCounter { counts }
    }

    pub fn uses(&self, r: &Register) -> usize {
        self.counts.get(r).copied().unwrap_or(0)
    }
}

pub fn sink_pass(sub: &Subroutine) -> (Subroutine, bool) {
    let usage = RegisterUsageCounter::count(sub);
    let mut out = sub.clone();
    let mut changed = false;
    for block in out.body.iter_mut() {
        for assignment in block.ops.iter_mut() {
            if let OpSource::Intrinsic(i) = &assignment.source {
                if !COMMUTATIVE_OPS.contains(&i.op_code.as_str()) || i.args.len() != 2 {
                    continue;
                }
                if let Some(rewrite) = try_sink(sub, &usage, &i.op_code, &i.args[0], &i.args[1]) {
                    assignment.source = rewrite;
                    changed = true;
                }
            }
        }
    }
    (out, changed)
}

fn try_sink(
    sub: &Subroutine,
    usage: &RegisterUsageCounter,
    op: &str,
    a: &Value,
    b: &Value,
) -> Option<OpSource> {
    // Try both orientations: outer const is `a` with inner expr `b`, or
    // vice versa (commutativity).
    try_sink_oriented(sub, usage, op, a, b).or_else(|| try_sink_oriented(sub, usage, op, b, a))
}

fn try_sink_oriented(
    sub: &Subroutine,
    usage: &RegisterUsageCounter,
    op: &str,
    outer_const: &Value,
    inner_expr: &Value,
) -> Option<OpSource> {
    let c1 = outer_const.as_constant()?;
    let r = inner_expr.as_register()?;
    let def = get_definition(sub, r)?;
    let inner = match &def.source {
        OpSource::Intrinsic(i) if i.op_code == op && i.args.len() == 2 => i,
        _ => return None,
    };
    if usage.uses(r) != 1 {
        return None;
    }
    let (inner_const, reg_operand) = match (inner.args[0].as_constant(), inner.args[1].as_constant()) {
        (Some(c2), None) => (c2, &inner.args[1]),
        (None, Some(c2)) => (c2, &inner.args[0]),
        _ => return None,
    };
    let folded = fold_commutative_consts(op, c1, inner_const)?;
    Some(OpSource::Intrinsic(Intrinsic::new(
        op,
        vec![reg_operand.clone(), folded],
    )))
}

fn fold_commutative_consts(op: &str, a: &Constant, b: &Constant) -> Option<Value> {
    match op {
        "+" | "*" | "&" | "|" | "^" => {
            let (Constant::U64Const(x), Constant::U64Const(y)) = (a, b) else {
                return None;
            };
            let result = match op {
                "+" => x.checked_add(*y)?,
                "*" => x.checked_mul(*y)?,
                "&" => x & y,
                "|" => x | y,
                "^" => x ^ y,
                _ => unreachable!(),
            };
            Some(Value::u64_const(result))
        }
        "b+" | "b*" | "b&" | "b|" | "b^" => {
            let (ab, ae) = bytes_of(a)?;
            let (bb, be) = bytes_of(b)?;
            let x = BigUint::from_bytes_be(&ab);
            let y = BigUint::from_bytes_be(&bb);
            let (result, len) = match op {
                "b+" => (x.add(&y), ab.len().max(bb.len())),
                "b*" => (x.mul(&y), ab.len() + bb.len()),
                "b&" => (x.bitand(&y), ab.len().max(bb.len())),
                "b|" => (x.bitor(&y), ab.len().max(bb.len())),
                "b^" => (x.bitxor(&y), ab.len().max(bb.len())),
                _ => unreachable!(),
            };
            let encoding = if ae == be { ae } else { Encoding::Base64 };
            Some(Value::bytes_const(result.to_bytes_be(len.max(1))?, encoding))
        }
        _ => None,
    }
}

fn bytes_of(c: &Constant) -> Option<(Vec<u8>, Encoding)> {
    match c {
        Constant::BytesConst(b, e) => Some((b.clone(), *e)),
        Constant::BigUIntConst(b) => Some((b.to_bytes_be_minimal(), Encoding::Unknown)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{BasicBlock, Assignment, BlockId, Terminator};

    fn sub_with(ops: Vec<Assignment>) -> Subroutine {
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.ops = ops;
        Subroutine::new("f", vec![], vec![], vec![block])
    }

    // S4: t = add(3, x); r = add(t, 4), t used once -> r = add(x, 7).
    #[test]
    fn s4_commutative_sinking() {
        let x = Register::new("x", 0, AType::U64);
        let t = Register::new("t", 0, AType::U64);
        let r = Register::new("r", 0, AType::U64);
        let sub = sub_with(vec![
            Assignment::single(
                t.clone(),
                OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(3), Value::Register(x.clone())])),
            ),
            Assignment::single(
                r,
                OpSource::Intrinsic(Intrinsic::new("+", vec![Value::Register(t), Value::u64_const(4)])),
            ),
        ]);
        let (out, changed) = sink_pass(&sub);
        assert!(changed);
        match &out.body[0].ops[1].source {
            OpSource::Intrinsic(i) => {
                assert_eq!(i.op_code, "+");
                assert_eq!(i.args[0], Value::Register(x));
                assert_eq!(i.args[1], Value::u64_const(7));
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn sinking_is_blocked_when_inner_register_used_twice() {
        let x = Register::new("x", 0, AType::U64);
        let t = Register::new("t", 0, AType::U64);
        let r = Register::new("r", 0, AType::U64);
        let sub = sub_with(vec![
            Assignment::single(
                t.clone(),
                OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(3), Value::Register(x.clone())])),
            ),
            Assignment::single(
                r,
                OpSource::Intrinsic(Intrinsic::new(
                    "+",
                    vec![Value::Register(t.clone()), Value::Register(t)],
                )),
            ),
        ]);
        let (_out, changed) = sink_pass(&sub);
        assert!(!changed);
    }

    #[test]
    fn usage_counter_counts_terminator_uses() {
        let x = Register::new("x", 0, AType::U64);
        let mut block = BasicBlock::new(
            BlockId(0),
            Terminator::SubroutineReturn(vec![Value::Register(x.clone()), Value::Register(x.clone())]),
        );
        block.refresh_successors();
        let sub = Subroutine::new("f", vec![], vec![], vec![block]);
        let usage = RegisterUsageCounter::count(&sub);
        assert_eq!(usage.uses(&x), 2);
    }
}
