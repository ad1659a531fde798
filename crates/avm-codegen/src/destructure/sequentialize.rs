//! Sequentializing a parallel-copy set: turning "all of these assignments
//! happen simultaneously" into a correct ordered sequence of ordinary
//! copies, breaking cycles with one scratch register at a time.
//!
//! Standard algorithm: repeatedly emit any pending copy whose destination
//! is not read as a source by another pending copy. When every remaining
//! copy's destination is needed elsewhere (a cycle), save one
//! destination's current value into a scratch register, redirect every
//! reference to that destination onto the scratch, and continue -- the
//! deferred copy becomes emittable once its destination is no longer
//! needed as anyone else's source.

use avm_ir::{Assignment, OpSource, Register, Subroutine, Value};

use super::phi::ParallelCopies;

pub fn sequentialize_parallel_copies(sub: &Subroutine, copies: ParallelCopies) -> Subroutine {
    let mut out = sub.clone();
    for (block_id, pairs) in copies {
        let sequence = sequentialize(pairs, block_id.0);
        if let Some(block) = out.block_mut(block_id) {
            for (dst, src) in sequence {
                block.ops.push(Assignment::single(dst, OpSource::Value(src)));
            }
        }
    }
    out
}

fn sequentialize(pairs: Vec<(Register, Value)>, scratch_seed: u32) -> Vec<(Register, Value)> {
    let mut pending = pairs;
    let mut result = Vec::new();
    let mut scratch_count = 0u32;

    while !pending.is_empty() {
        let ready_idx = pending.iter().position(|(dst, _)| {
            !pending
                .iter()
                .any(|(_, src)| src.as_register().map(|r| r == dst).unwrap_or(false))
        });

        if let Some(idx) = ready_idx {
            let (dst, src) = pending.remove(idx);
            result.push((dst, src));
            continue;
        }

        // Every remaining destination is read elsewhere: break the cycle by
        // saving one destination's current value before it is overwritten.
        let blocked_dst = pending[0].0.clone();
        let scratch = Register::new(
            format!("__seq_scratch{}_{}", scratch_seed, scratch_count),
            0,
            blocked_dst.atype,
        );
        scratch_count += 1;
        result.push((scratch.clone(), Value::Register(blocked_dst.clone())));
        for (_, src) in &mut pending {
            if src.as_register() == Some(&blocked_dst) {
                *src = Value::Register(scratch.clone());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{AType, BasicBlock, BlockId, Terminator};
    use std::collections::HashMap;

    fn leaf_block(id: u32) -> Subroutine {
        Subroutine::new(
            "f",
            vec![],
            vec![],
            vec![BasicBlock::new(BlockId(id), Terminator::SubroutineReturn(vec![]))],
        )
    }

    #[test]
    fn swap_cycle_breaks_with_one_scratch_register() {
        let a = Register::new("a", 0, AType::U64);
        let b = Register::new("b", 0, AType::U64);
        let pairs = vec![(a.clone(), Value::Register(b.clone())), (b.clone(), Value::Register(a.clone()))];
        let mut copies: ParallelCopies = HashMap::new();
        copies.insert(BlockId(0), pairs);
        let out = sequentialize_parallel_copies(&leaf_block(0), copies);
        let ops = &out.body[0].ops;
        assert_eq!(ops.len(), 3);
        let scratch = ops[0].targets[0].clone();
        assert_eq!(ops[0].source, OpSource::Value(Value::Register(a.clone())));
        assert_eq!(ops[1].targets[0], a);
        assert_eq!(ops[1].source, OpSource::Value(Value::Register(b.clone())));
        assert_eq!(ops[2].targets[0], b);
        assert_eq!(ops[2].source, OpSource::Value(Value::Register(scratch)));
    }

    #[test]
    fn acyclic_chain_preserves_dependency_order() {
        let a = Register::new("a", 0, AType::U64);
        let b = Register::new("b", 0, AType::U64);
        let c = Register::new("c", 0, AType::U64);
        let pairs = vec![(a.clone(), Value::Register(b.clone())), (b.clone(), Value::Register(c.clone()))];
        let mut copies: ParallelCopies = HashMap::new();
        copies.insert(BlockId(0), pairs);
        let out = sequentialize_parallel_copies(&leaf_block(0), copies);
        let ops = &out.body[0].ops;
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].targets[0], a);
        assert_eq!(ops[1].targets[0], b);
    }

    #[test]
    fn independent_copies_need_no_scratch() {
        let a = Register::new("a", 0, AType::U64);
        let b = Register::new("b", 0, AType::U64);
        let pairs = vec![(a.clone(), Value::u64_const(1)), (b.clone(), Value::u64_const(2))];
        let mut copies: ParallelCopies = HashMap::new();
        copies.insert(BlockId(0), pairs);
        let out = sequentialize_parallel_copies(&leaf_block(0), copies);
        assert_eq!(out.body[0].ops.len(), 2);
    }
}
