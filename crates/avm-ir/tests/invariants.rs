//! Property-based checks for the two structural invariants every SSA
//! subroutine produced by lowering must hold: exactly one definition per
//! register, and a predecessor/successor list that agrees both ways.
//!
//! Test inputs are built from a seed by a tiny deterministic generator
//! (xorshift64) rather than a `proptest::Strategy` tree, since the shape
//! being generated -- nested `if`/`while` bodies over a growing variable
//! set -- is naturally recursive and easier to get right as a plain
//! function than as composed combinators.

use avm_ir::awst::{AwstExpr, AwstFunction, AwstStmt, AwstType};
use avm_ir::error::SourceLocation;
use avm_ir::lower::lower_program;
use avm_ir::{Register, Subroutine};
use proptest::prelude::*;
use std::collections::HashMap;

struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn range(&mut self, n: u64) -> u64 {
        self.next() % n.max(1)
    }
}

fn loc() -> SourceLocation {
    SourceLocation::unknown()
}

const OPS: &[&str] = &["+", "-", "*", "&", "|", "^"];

fn gen_expr(rng: &mut Rng, vars: &[String], depth: u32) -> AwstExpr {
    if depth == 0 || vars.is_empty() || rng.range(3) == 0 {
        if !vars.is_empty() && rng.range(2) == 0 {
            let name = vars[rng.range(vars.len() as u64) as usize].clone();
            return AwstExpr::Var(name, AwstType::U64, loc());
        }
        return AwstExpr::IntLiteral(rng.range(50), loc());
    }
    let op = OPS[rng.range(OPS.len() as u64) as usize].to_string();
    let a = gen_expr(rng, vars, depth - 1);
    let b = gen_expr(rng, vars, depth - 1);
    AwstExpr::Intrinsic {
        op_code: op,
        args: vec![a, b],
        result_type: AwstType::U64,
        loc: loc(),
    }
}

fn gen_stmts(rng: &mut Rng, vars: &mut Vec<String>, depth: u32, budget: &mut u32) -> Vec<AwstStmt> {
    let mut out = Vec::new();
    while *budget > 0 && rng.range(4) != 0 {
        *budget -= 1;
        let choice = if depth > 0 { rng.range(4) } else { rng.range(2) };
        match choice {
            0 => {
                let name = format!("v{}", vars.len());
                let value = gen_expr(rng, vars, 2);
                out.push(AwstStmt::Let { name: name.clone(), value, loc: loc() });
                vars.push(name);
            }
            1 if !vars.is_empty() => {
                let name = vars[rng.range(vars.len() as u64) as usize].clone();
                let value = gen_expr(rng, vars, 2);
                out.push(AwstStmt::Assign { name, value, loc: loc() });
            }
            2 => {
                let cond = gen_expr(rng, vars, 2);
                let mut then_vars = vars.clone();
                let then_body = gen_stmts(rng, &mut then_vars, depth - 1, budget);
                let mut else_vars = vars.clone();
                let else_body = gen_stmts(rng, &mut else_vars, depth - 1, budget);
                out.push(AwstStmt::If { cond, then_body, else_body, loc: loc() });
            }
            _ => {
                let cond = gen_expr(rng, vars, 2);
                let mut body_vars = vars.clone();
                let body = gen_stmts(rng, &mut body_vars, depth - 1, budget);
                out.push(AwstStmt::While { cond, body, loc: loc() });
            }
        }
    }
    out
}

fn gen_function(seed: u64) -> AwstFunction {
    let mut rng = Rng(seed | 1);
    let mut vars = vec!["v0".to_string()];
    let mut budget = 12u32;
    let mut body = vec![AwstStmt::Let {
        name: "v0".to_string(),
        value: AwstExpr::IntLiteral(1, loc()),
        loc: loc(),
    }];
    body.extend(gen_stmts(&mut rng, &mut vars, 3, &mut budget));
    let ret_var = vars[rng.range(vars.len() as u64) as usize].clone();
    body.push(AwstStmt::Return(vec![AwstExpr::Var(ret_var, AwstType::U64, loc())], loc()));
    AwstFunction {
        name: "main".to_string(),
        params: vec![],
        return_types: vec![AwstType::U64],
        body,
    }
}

fn check_single_def(sub: &Subroutine) {
    let mut count: HashMap<Register, u32> = HashMap::new();
    for block in &sub.body {
        for phi in &block.phis {
            *count.entry(phi.register.clone()).or_insert(0) += 1;
        }
        for op in &block.ops {
            for target in &op.targets {
                *count.entry(target.clone()).or_insert(0) += 1;
            }
        }
    }
    for (reg, n) in &count {
        assert_eq!(*n, 1, "register {} defined {} times", reg, n);
    }
}

fn check_cfg_symmetry(sub: &Subroutine) {
    for a in &sub.body {
        for succ in &a.successors {
            let b = sub.block(*succ).expect("successor block exists");
            assert!(
                b.predecessors.contains(&a.id),
                "block {:?} lists {:?} as successor but not vice versa",
                a.id,
                b.id
            );
        }
    }
    for b in &sub.body {
        for pred in &b.predecessors {
            let a = sub.block(*pred).expect("predecessor block exists");
            assert!(
                a.successors.contains(&b.id),
                "block {:?} lists {:?} as predecessor but not vice versa",
                b.id,
                a.id
            );
        }
    }
}

proptest! {
    #[test]
    fn lowered_subroutines_are_single_def_ssa(seed in any::<u64>()) {
        let func = gen_function(seed);
        let program = lower_program("prop", std::slice::from_ref(&func))
            .expect("lowering a well-formed generated program always succeeds");
        check_single_def(&program.main);
    }

    #[test]
    fn lowered_subroutines_have_symmetric_cfgs(seed in any::<u64>()) {
        let func = gen_function(seed);
        let program = lower_program("prop", std::slice::from_ref(&func))
            .expect("lowering a well-formed generated program always succeeds");
        check_cfg_symmetry(&program.main);
    }
}
