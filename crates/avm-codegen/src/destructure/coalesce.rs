//! Local coalescing: merges a copy's destination and source onto one
//! physical local wherever their live ranges don't overlap, computed by
//! the standard per-block live-in/live-out backward dataflow run to a
//! fixed point over the subroutine's CFG. A copy's two sides never
//! interfere with each other at the copy itself (the classic
//! move-instruction exemption), so the only real question is whether
//! either side is live somewhere the other is redefined; that's exactly
//! what the interference graph built from the liveness result answers.
//!
//! By construction every copy reaching this pass came from
//! [`super::cssa`]'s edge-temporary insertion or [`super::sequentialize`]'s
//! scratch registers, so in practice almost every copy here turns out
//! non-interfering -- CSSA's whole point is to make a phi's congruence
//! class safe to merge -- but this pass checks rather than assumes it,
//! so a copy genuinely spanning overlapping live ranges (e.g. one
//! introduced by a future pass that doesn't preserve that property)
//! is left alone instead of silently miscompiled.
//!
//! Folding a group onto one local_id turns a former copy into a trivial
//! self-copy wherever both sides now share that local_id; those are
//! dropped as a final step.

use avm_ir::{Assignment, BasicBlock, BlockId, OpSource, Register, Subroutine, Terminator, Value};
use std::collections::{HashMap, HashSet};

use super::cssa::EDGE_TEMP_MARKER;

pub fn coalesce_locals(sub: &Subroutine) -> Subroutine {
    let mut out = sub.clone();
    let liveness = compute_liveness(&out);
    let interferes = build_interference(&out, &liveness);

    let mut parent: HashMap<Register, Register> = HashMap::new();
    let mut touched: HashSet<Register> = HashSet::new();

    for block in &out.body {
        for op in &block.ops {
            let Some(src) = single_copy_source(op) else { continue };
            let dst = op.targets[0].clone();
            if dst != src && !interferes.contains(&(dst.clone(), src.clone())) {
                union(&mut parent, dst.clone(), src.clone());
                touched.insert(dst);
                touched.insert(src);
            }
        }
    }

    if touched.is_empty() {
        return out;
    }

    let mut groups: HashMap<Register, Vec<Register>> = HashMap::new();
    for r in &touched {
        let root = find(&mut parent, r.clone());
        groups.entry(root).or_default().push(r.clone());
    }

    let mut canonical: HashMap<Register, String> = HashMap::new();
    for (root, members) in &groups {
        let pick = members
            .iter()
            .find(|r| !r.local_id.contains(EDGE_TEMP_MARKER))
            .unwrap_or(root)
            .local_id
            .clone();
        for m in members {
            canonical.insert(m.clone(), pick.clone());
        }
    }

    let rename = |r: &Register| -> Register {
        match canonical.get(r) {
            Some(local_id) => Register::new(local_id.clone(), r.version, r.atype),
            None => r.clone(),
        }
    };

    for block in &mut out.body {
        rename_block(block, &rename);
    }
    out.params = out.params.iter().map(&rename).collect();

    drop_trivial_self_copies(&mut out);
    out
}

fn single_copy_source(op: &Assignment) -> Option<Register> {
    if op.targets.len() == 1 {
        if let OpSource::Value(Value::Register(src)) = &op.source {
            return Some(src.clone());
        }
    }
    None
}

fn collect_value_use(v: &Value, out: &mut HashSet<Register>) {
    if let Value::Register(r) = v {
        out.insert(r.clone());
    }
}

fn collect_op_uses(op: &Assignment, out: &mut HashSet<Register>) {
    match &op.source {
        OpSource::Intrinsic(i) => i.args.iter().for_each(|a| collect_value_use(a, out)),
        OpSource::Invoke(inv) => inv.args.iter().for_each(|a| collect_value_use(a, out)),
        OpSource::Value(v) => collect_value_use(v, out),
    }
}

fn terminator_uses(term: &Terminator) -> HashSet<Register> {
    let mut out = HashSet::new();
    match term {
        Terminator::Goto(_) => {}
        Terminator::CondBranch { cond, .. } => collect_value_use(cond, &mut out),
        Terminator::Switch { value, .. } => collect_value_use(value, &mut out),
        Terminator::GotoNth { value, .. } => collect_value_use(value, &mut out),
        Terminator::SubroutineReturn(vs) => vs.iter().for_each(|v| collect_value_use(v, &mut out)),
        Terminator::ProgramExit(v) => collect_value_use(v, &mut out),
        Terminator::Fail(_) => {}
    }
    out
}

/// Per-block `(use, def)`: `use` is every register read before any local
/// redefinition within the block (an "upward-exposed" use), `def` is every
/// register the block assigns at all.
fn block_use_def(block: &BasicBlock) -> (HashSet<Register>, HashSet<Register>) {
    let mut use_set = HashSet::new();
    let mut def_set = HashSet::new();
    for op in &block.ops {
        let mut uses = HashSet::new();
        collect_op_uses(op, &mut uses);
        for r in uses {
            if !def_set.contains(&r) {
                use_set.insert(r);
            }
        }
        def_set.extend(op.targets.iter().cloned());
    }
    for r in terminator_uses(&block.terminator) {
        if !def_set.contains(&r) {
            use_set.insert(r);
        }
    }
    (use_set, def_set)
}

type Liveness = HashMap<BlockId, (HashSet<Register>, HashSet<Register>)>;

fn compute_liveness(sub: &Subroutine) -> Liveness {
    let use_def: HashMap<BlockId, (HashSet<Register>, HashSet<Register>)> =
        sub.body.iter().map(|b| (b.id, block_use_def(b))).collect();
    let mut live_in: HashMap<BlockId, HashSet<Register>> = sub.body.iter().map(|b| (b.id, HashSet::new())).collect();
    let mut live_out: HashMap<BlockId, HashSet<Register>> = sub.body.iter().map(|b| (b.id, HashSet::new())).collect();

    loop {
        let mut changed = false;
        for block in &sub.body {
            let mut out_set = HashSet::new();
            for succ in &block.successors {
                if let Some(s) = live_in.get(succ) {
                    out_set.extend(s.iter().cloned());
                }
            }
            let (use_set, def_set) = &use_def[&block.id];
            let mut in_set: HashSet<Register> = out_set.difference(def_set).cloned().collect();
            in_set.extend(use_set.iter().cloned());

            if &in_set != live_in.get(&block.id).unwrap() {
                live_in.insert(block.id, in_set);
                changed = true;
            }
            if &out_set != live_out.get(&block.id).unwrap() {
                live_out.insert(block.id, out_set);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    sub.body
        .iter()
        .map(|b| (b.id, (live_in.remove(&b.id).unwrap_or_default(), live_out.remove(&b.id).unwrap_or_default())))
        .collect()
}

fn add_interference(set: &mut HashSet<(Register, Register)>, a: Register, b: Register) {
    set.insert((a.clone(), b.clone()));
    set.insert((b, a));
}

/// Walks every block backward from its live-out set, recording an
/// interference edge between a just-defined register and everything else
/// live at that point -- except a copy's own source, which is the
/// exemption that lets move-related pairs coalesce at all.
fn build_interference(sub: &Subroutine, liveness: &Liveness) -> HashSet<(Register, Register)> {
    let mut interferes = HashSet::new();
    for block in &sub.body {
        let (_, live_out) = &liveness[&block.id];
        let mut live: HashSet<Register> = live_out.clone();
        live.extend(terminator_uses(&block.terminator));

        for op in block.ops.iter().rev() {
            let copy_src = single_copy_source(op);
            for target in &op.targets {
                for other in &live {
                    if other == target {
                        continue;
                    }
                    if op.targets.len() == 1 && copy_src.as_ref() == Some(other) {
                        continue;
                    }
                    add_interference(&mut interferes, target.clone(), other.clone());
                }
            }
            for target in &op.targets {
                live.remove(target);
            }
            let mut uses = HashSet::new();
            collect_op_uses(op, &mut uses);
            live.extend(uses);
        }
    }
    interferes
}

fn find(parent: &mut HashMap<Register, Register>, r: Register) -> Register {
    let mut cur = r;
    loop {
        match parent.get(&cur).cloned() {
            Some(p) if p != cur => cur = p,
            _ => return cur,
        }
    }
}

fn union(parent: &mut HashMap<Register, Register>, a: Register, b: Register) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent.insert(ra, rb);
    }
}

fn rename_block(block: &mut BasicBlock, rename: &impl Fn(&Register) -> Register) {
    for op in &mut block.ops {
        op.targets = op.targets.iter().map(rename).collect();
        match &mut op.source {
            OpSource::Intrinsic(i) => i.args.iter_mut().for_each(|a| rename_value(a, rename)),
            OpSource::Invoke(inv) => inv.args.iter_mut().for_each(|a| rename_value(a, rename)),
            OpSource::Value(v) => rename_value(v, rename),
        }
    }
    rename_terminator(&mut block.terminator, rename);
    block.refresh_successors();
}

fn rename_value(v: &mut Value, rename: &impl Fn(&Register) -> Register) {
    if let Value::Register(r) = v {
        *r = rename(r);
    }
}

fn rename_terminator(term: &mut Terminator, rename: &impl Fn(&Register) -> Register) {
    match term {
        Terminator::Goto(_) => {}
        Terminator::CondBranch { cond, .. } => rename_value(cond, rename),
        Terminator::Switch { value, .. } => rename_value(value, rename),
        Terminator::GotoNth { value, .. } => rename_value(value, rename),
        Terminator::SubroutineReturn(vs) => vs.iter_mut().for_each(|v| rename_value(v, rename)),
        Terminator::ProgramExit(v) => rename_value(v, rename),
        Terminator::Fail(_) => {}
    }
}

fn drop_trivial_self_copies(sub: &mut Subroutine) {
    for block in &mut sub.body {
        block.ops.retain(|op| {
            if op.targets.len() == 1 {
                if let OpSource::Value(Value::Register(src)) = &op.source {
                    return op.targets[0].local_id != src.local_id;
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::AType;

    #[test]
    fn edge_temp_folds_onto_real_local_and_self_copy_drops() {
        let x = Register::new("x", 1, AType::U64);
        let temp = Register::new("x__phi_edge_0", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![Value::Register(x.clone())]));
        block.ops = vec![
            Assignment::single(temp.clone(), OpSource::Value(Value::u64_const(9))),
            Assignment::single(x.clone(), OpSource::Value(Value::Register(temp))),
        ];
        let sub = Subroutine::new("f", vec![], vec![AType::U64], vec![block]);
        let out = coalesce_locals(&sub);
        assert_eq!(out.body[0].ops.len(), 1);
        assert_eq!(out.body[0].ops[0].targets[0].local_id, "x");
    }

    #[test]
    fn unrelated_copies_are_left_untouched() {
        let a = Register::new("a", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.ops = vec![Assignment::single(a, OpSource::Value(Value::u64_const(1)))];
        let sub = Subroutine::new("f", vec![], vec![], vec![block]);
        let out = coalesce_locals(&sub);
        assert_eq!(out.body[0].ops.len(), 1);
    }

    #[test]
    fn interfering_copy_is_left_uncoalesced() {
        // b <- a; use a again later; b <- a must not fold a and b together
        // since a is still live past the point b is redefined.
        let a = Register::new("a", 0, AType::U64);
        let b = Register::new("b", 0, AType::U64);
        let mut block = BasicBlock::new(
            BlockId(0),
            Terminator::SubroutineReturn(vec![Value::Register(a.clone()), Value::Register(b.clone())]),
        );
        block.ops = vec![Assignment::single(b.clone(), OpSource::Value(Value::Register(a.clone())))];
        let sub = Subroutine::new("f", vec![a], vec![AType::U64, AType::U64], vec![block]);
        let out = coalesce_locals(&sub);
        // a is live-out (returned) alongside b, so the copy must survive untouched.
        assert_eq!(out.body[0].ops.len(), 1);
        assert_eq!(out.body[0].ops[0].targets[0].local_id, "b");
    }

    #[test]
    fn swap_cycle_output_coalesces_without_clobbering() {
        // tmp <- a; a <- b; b <- tmp -- the sequentializer's own output for
        // a 2-cycle. tmp and b are not simultaneously live with anything
        // that would block the fold, but a's original value is still read
        // by the second copy, so a and tmp must stay distinct locals.
        let a = Register::new("a", 1, AType::U64);
        let b = Register::new("b", 1, AType::U64);
        let tmp = Register::new("__seq_scratch0_0", 0, AType::U64);
        let mut block = BasicBlock::new(
            BlockId(0),
            Terminator::SubroutineReturn(vec![Value::Register(a.clone()), Value::Register(b.clone())]),
        );
        block.ops = vec![
            Assignment::single(tmp.clone(), OpSource::Value(Value::Register(a.clone()))),
            Assignment::single(a.clone(), OpSource::Value(Value::Register(b.clone()))),
            Assignment::single(b.clone(), OpSource::Value(Value::Register(tmp))),
        ];
        let sub = Subroutine::new("f", vec![a, b], vec![AType::U64, AType::U64], vec![block]);
        let out = coalesce_locals(&sub);
        assert_eq!(out.body[0].ops.len(), 3);
    }
}
