//! Property-based checks for the two invariants that are easiest to get
//! subtly wrong at the codegen layer: a sequentialized parallel copy must
//! behave exactly like the simultaneous assignment it replaces, and every
//! assembled branch must resolve to exactly one label at an in-range
//! offset.
//!
//! TEAL round-tripping (`parse(emit_teal(P)) == P`) already has a direct
//! unit test next to the printer/parser in `teal.rs`; repeating it here as
//! a property-based grid would just be another encode-then-decode sweep
//! over the same two functions, so this file covers the two properties
//! that unit tests don't already exercise end to end.

use avm_codegen::assembler::{assemble, AssemblerConfig};
use avm_codegen::destructure::phi::ParallelCopies;
use avm_codegen::destructure::sequentialize::sequentialize_parallel_copies;
use avm_codegen::mir::{MirBlock, MirOp, MirProgram, MirSubroutine};
use avm_ir::{AType, BasicBlock, BlockId, Constant, OpSource, Register, Subroutine, Terminator, Value};
use proptest::prelude::*;
use std::collections::HashMap;

fn reg(i: u32) -> Register {
    Register::new(format!("r{}", i), 0, AType::U64)
}

fn parallel_apply(pairs: &[(Register, Value)], env: &HashMap<Register, u64>) -> HashMap<Register, u64> {
    let mut out = env.clone();
    for (dst, src) in pairs {
        out.insert(dst.clone(), eval(env, src));
    }
    out
}

fn sequential_apply(ops: &[(Register, Value)], env: &HashMap<Register, u64>) -> HashMap<Register, u64> {
    let mut out = env.clone();
    for (dst, src) in ops {
        let v = eval(&out, src);
        out.insert(dst.clone(), v);
    }
    out
}

fn eval(env: &HashMap<Register, u64>, v: &Value) -> u64 {
    match v {
        Value::Register(r) => *env.get(r).expect("source register has a value"),
        Value::Constant(Constant::U64Const(n)) => *n,
        other => panic!("test harness does not model {:?}", other),
    }
}

fn sequentialized_pairs(n: u32, shift: u32) -> (Vec<(Register, Value)>, Vec<(Register, Value)>) {
    let regs: Vec<Register> = (0..n).map(reg).collect();
    // r_i := old value of r_{(i + shift) mod n} for every i -- a single
    // permutation applied simultaneously. shift=0 is the identity (every
    // pair trivial); other shifts produce one or more cycles, including
    // full n-cycles when gcd(shift, n) == 1.
    let parallel: Vec<(Register, Value)> = (0..n)
        .map(|i| {
            let src_idx = (i + shift) % n;
            (regs[i as usize].clone(), Value::Register(regs[src_idx as usize].clone()))
        })
        .collect();

    let sub = Subroutine::new(
        "f",
        regs.clone(),
        vec![],
        vec![BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]))],
    );

    let mut copies: ParallelCopies = ParallelCopies::new();
    copies.insert(BlockId(0), parallel.clone());
    let out = sequentialize_parallel_copies(&sub, copies);

    let sequential: Vec<(Register, Value)> = out.body[0]
        .ops
        .iter()
        .map(|op| {
            let dst = op.targets[0].clone();
            let src = match &op.source {
                OpSource::Value(v) => v.clone(),
                other => panic!("sequentializer only emits plain copies, got {:?}", other),
            };
            (dst, src)
        })
        .collect();

    (parallel, sequential)
}

proptest! {
    #[test]
    fn sequentialized_copies_match_simultaneous_semantics(n in 2u32..8, shift in 0u32..8) {
        let shift = shift % n;
        let (parallel, sequential) = sequentialized_pairs(n, shift);

        let env: HashMap<Register, u64> = (0..n).map(|i| (reg(i), (i as u64) * 10 + 1)).collect();
        let expected = parallel_apply(&parallel, &env);
        let actual = sequential_apply(&sequential, &env);

        for i in 0..n {
            let r = reg(i);
            prop_assert_eq!(expected.get(&r), actual.get(&r), "register r{} diverged", i);
        }
    }
}

fn chain_program(n: u32, back_edge: bool) -> MirProgram {
    let mut blocks = Vec::new();
    for i in 0..n {
        let label = format!("b{}", i);
        let mut ops = vec![MirOp::PushInt(1), MirOp::Pop(1)];
        if i + 1 < n {
            ops.push(MirOp::Branch { op_code: "b".into(), label: format!("b{}", i + 1) });
        } else if back_edge {
            ops.push(MirOp::Branch { op_code: "b".into(), label: "b0".into() });
        } else {
            ops.push(MirOp::Return);
        }
        blocks.push(MirBlock { label, ops });
    }
    MirProgram {
        version: 10,
        main: MirSubroutine { name: "main".into(), blocks, num_locals: 0 },
        subroutines: vec![],
    }
}

proptest! {
    #[test]
    fn assembled_chains_resolve_every_label_exactly_once(n in 1u32..40, back_edge in any::<bool>()) {
        let program = chain_program(n, back_edge);
        let distinct_labels: usize = program.main.blocks.len();

        let assembled = assemble(&program, &HashMap::new(), &HashMap::new(), AssemblerConfig::default())
            .expect("a tight chain of short blocks never exceeds the branch range");

        prop_assert_eq!(assembled.label_positions.len(), distinct_labels);
        for &pos in assembled.label_positions.values() {
            prop_assert!((pos as usize) < assembled.bytecode.len());
        }
    }
}
