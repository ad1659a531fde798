//! The MIR model and the builder that lowers destructured (φ-free) SSA IR
//! into it: a linear stream of stack-machine operations per subroutine,
//! with explicit local stores/loads in place of SSA registers.
//!
//! One visitor method per `Op`/`Terminator` variant, values becoming
//! pushes or loads of virtual locals, right-to-left store order for
//! multi-target assignments, `Pop(n)` elision when a result is unused, and
//! comment-only "implicit fall-through" in place of a branch to the next
//! block in program order.

use avm_ir::{
    AType, Assignment, BasicBlock, BlockId, Constant, Encoding, Immediate, OpSource, OpTable,
    Program, Register, Subroutine, Terminator, Value,
};
use std::collections::HashMap;

use crate::error::CodegenError;

#[derive(Debug, Clone, PartialEq)]
pub enum MirOp {
    PushInt(u64),
    PushBytes(Vec<u8>, Encoding),
    PushAddress(String),
    PushMethod(String),
    PushTemplateVar {
        name: String,
        atype: AType,
    },
    PushCompiledReference {
        artifact: String,
        field: String,
        template_vars: Vec<(String, String)>,
    },
    LoadLocal(u8),
    StoreLocal(u8),
    Intrinsic {
        op_code: String,
        immediates: Vec<Immediate>,
    },
    Pop(u32),
    CallSub(String),
    Branch {
        op_code: &'static str,
        label: String,
    },
    Switch {
        op_code: &'static str,
        labels: Vec<String>,
    },
    Return,
    Fail(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct MirBlock {
    pub label: String,
    pub ops: Vec<MirOp>,
}

#[derive(Debug, Clone)]
pub struct MirSubroutine {
    pub name: String,
    pub blocks: Vec<MirBlock>,
    pub num_locals: u8,
}

#[derive(Debug, Clone)]
pub struct MirProgram {
    pub version: u32,
    pub main: MirSubroutine,
    pub subroutines: Vec<MirSubroutine>,
}

/// Picks, for every subroutine in `program`, the shortest name that is
/// unique among all chosen names -- trying `method_name`, then
/// `class.method`, then the full dotted name, in that order. `main` is
/// always pinned to `"main"` regardless of collisions.
pub fn assign_subroutine_names(program: &Program) -> HashMap<String, String> {
    let mut chosen: HashMap<String, String> = HashMap::new();
    let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();
    taken.insert("main".to_string());
    chosen.insert(program.main.name.clone(), "main".to_string());

    for sub in &program.subroutines {
        let segments: Vec<&str> = sub.name.split('.').collect();
        let candidates: Vec<String> = match segments.as_slice() {
            [] => vec![sub.name.clone()],
            [only] => vec![only.to_string()],
            [.., second_last, last] => vec![
                last.to_string(),
                format!("{}.{}", second_last, last),
                sub.name.clone(),
            ],
        };
        let pick = candidates
            .into_iter()
            .find(|c| !taken.contains(c))
            .unwrap_or_else(|| sub.name.clone());
        taken.insert(pick.clone());
        chosen.insert(sub.name.clone(), pick);
    }
    chosen
}

pub fn block_label(sub_name: &str, id: BlockId) -> String {
    format!("{}__block{}", sub_name, id.0)
}

struct Builder<'a> {
    sub: &'a Subroutine,
    program: &'a Program,
    names: &'a HashMap<String, String>,
    resolved_name: String,
    slot_of: HashMap<String, u8>,
    next_slot: u8,
}

impl<'a> Builder<'a> {
    fn new(sub: &'a Subroutine, program: &'a Program, names: &'a HashMap<String, String>) -> Self {
        let resolved_name = names.get(&sub.name).cloned().unwrap_or_else(|| sub.name.clone());
        Builder {
            sub,
            program,
            names,
            resolved_name,
            slot_of: HashMap::new(),
            next_slot: 0,
        }
    }

    fn slot(&mut self, reg: &Register) -> u8 {
        if let Some(&s) = self.slot_of.get(&reg.local_id) {
            return s;
        }
        let s = self.next_slot;
        self.next_slot += 1;
        self.slot_of.insert(reg.local_id.clone(), s);
        s
    }

    fn push_value(&mut self, ops: &mut Vec<MirOp>, v: &Value) {
        match v {
            Value::Register(r) => ops.push(MirOp::LoadLocal(self.slot(r))),
            Value::Constant(c) => ops.push(push_constant(c)),
        }
    }

    fn store_targets(&mut self, ops: &mut Vec<MirOp>, targets: &[Register]) {
        for target in targets.iter().rev() {
            ops.push(MirOp::StoreLocal(self.slot(target)));
        }
    }

    fn lower_assignment(&mut self, ops: &mut Vec<MirOp>, assignment: &Assignment) -> Result<(), CodegenError> {
        match &assignment.source {
            OpSource::Intrinsic(i) => {
                for arg in &i.args {
                    self.push_value(ops, arg);
                }
                let produced = OpTable::lookup(&i.op_code)?.stack_outputs.len();
                ops.push(MirOp::Intrinsic {
                    op_code: i.op_code.clone(),
                    immediates: i.immediates.clone(),
                });
                if assignment.targets.is_empty() {
                    if produced > 0 {
                        ops.push(MirOp::Pop(produced as u32));
                    }
                } else {
                    self.store_targets(ops, &assignment.targets);
                }
            }
            OpSource::Invoke(inv) => {
                for arg in &inv.args {
                    self.push_value(ops, arg);
                }
                let returns = self
                    .program
                    .find(&inv.target)
                    .map(|s| s.returns.len())
                    .unwrap_or(assignment.targets.len());
                let target = self.names.get(&inv.target).cloned().unwrap_or_else(|| inv.target.clone());
                ops.push(MirOp::CallSub(target));
                if assignment.targets.is_empty() {
                    if returns > 0 {
                        ops.push(MirOp::Pop(returns as u32));
                    }
                } else {
                    self.store_targets(ops, &assignment.targets);
                }
            }
            OpSource::Value(v) => {
                self.push_value(ops, v);
                self.store_targets(ops, &assignment.targets);
            }
        }
        Ok(())
    }

    fn lower_terminator(
        &mut self,
        ops: &mut Vec<MirOp>,
        block: &BasicBlock,
        next_block: Option<BlockId>,
    ) {
        let fallthrough = |target: BlockId, ops: &mut Vec<MirOp>, label: String| {
            if Some(target) == next_block {
                ops.push(MirOp::Comment("implicit fall-through".to_string()));
            } else {
                ops.push(MirOp::Branch { op_code: "b", label });
            }
        };

        match &block.terminator {
            Terminator::Goto(target) => {
                let label = block_label(&self.resolved_name, *target);
                fallthrough(*target, ops, label);
            }
            Terminator::CondBranch { cond, zero, non_zero } => {
                self.push_value(ops, cond);
                ops.push(MirOp::Branch {
                    op_code: "bnz",
                    label: block_label(&self.resolved_name, *non_zero),
                });
                let label = block_label(&self.resolved_name, *zero);
                fallthrough(*zero, ops, label);
            }
            Terminator::Switch { value, cases, default } => {
                for (constant, target) in cases {
                    self.push_value(ops, value);
                    ops.push(push_constant(constant));
                    ops.push(MirOp::Intrinsic {
                        op_code: "==".to_string(),
                        immediates: vec![],
                    });
                    ops.push(MirOp::Branch {
                        op_code: "bnz",
                        label: block_label(&self.resolved_name, *target),
                    });
                }
                let label = block_label(&self.resolved_name, *default);
                fallthrough(*default, ops, label);
            }
            Terminator::GotoNth { value, blocks, default } => {
                self.push_value(ops, value);
                ops.push(MirOp::Switch {
                    op_code: "switch",
                    labels: blocks.iter().map(|b| block_label(&self.resolved_name, *b)).collect(),
                });
                let label = block_label(&self.resolved_name, *default);
                fallthrough(*default, ops, label);
            }
            Terminator::SubroutineReturn(values) => {
                for v in values {
                    self.push_value(ops, v);
                }
                ops.push(MirOp::Return);
            }
            Terminator::ProgramExit(value) => {
                self.push_value(ops, value);
                ops.push(MirOp::Intrinsic {
                    op_code: "return".to_string(),
                    immediates: vec![],
                });
            }
            Terminator::Fail(comment) => {
                ops.push(MirOp::Comment(comment.clone()));
                ops.push(MirOp::Intrinsic {
                    op_code: "err".to_string(),
                    immediates: vec![],
                });
            }
        }
    }

    fn build(mut self) -> Result<MirSubroutine, CodegenError> {
        let mut blocks = Vec::with_capacity(self.sub.body.len());
        for (i, block) in self.sub.body.iter().enumerate() {
            if !block.phis.is_empty() {
                return Err(CodegenError::PhiSurvivedDestruction {
                    register: block.phis[0].register.to_string(),
                    block: block.id.0,
                });
            }
            let mut ops = Vec::new();
            if i == 0 {
                for param in self.sub.params.iter().rev() {
                    ops.push(MirOp::StoreLocal(self.slot(param)));
                }
            }
            for assignment in &block.ops {
                self.lower_assignment(&mut ops, assignment)?;
            }
            let next_block = self.sub.body.get(i + 1).map(|b| b.id);
            self.lower_terminator(&mut ops, block, next_block);
            blocks.push(MirBlock {
                label: block_label(&self.resolved_name, block.id),
                ops,
            });
        }
        Ok(MirSubroutine {
            name: self.resolved_name.clone(),
            blocks,
            num_locals: self.next_slot,
        })
    }
}

fn push_constant(c: &Constant) -> MirOp {
    match c {
        Constant::U64Const(v) => MirOp::PushInt(*v),
        Constant::BigUIntConst(b) => MirOp::PushBytes(b.to_bytes_be_minimal(), Encoding::Unknown),
        Constant::BytesConst(b, enc) => MirOp::PushBytes(b.clone(), *enc),
        Constant::AddressConst(a) => MirOp::PushAddress(a.clone()),
        Constant::MethodConst(m) => MirOp::PushMethod(m.clone()),
        Constant::TemplateVar(name, atype) => MirOp::PushTemplateVar {
            name: name.clone(),
            atype: *atype,
        },
        Constant::CompiledReference {
            artifact,
            field,
            template_vars,
        } => MirOp::PushCompiledReference {
            artifact: artifact.clone(),
            field: field.clone(),
            template_vars: template_vars.clone(),
        },
    }
}

pub fn build_mir_subroutine(
    sub: &Subroutine,
    program: &Program,
    names: &HashMap<String, String>,
) -> Result<MirSubroutine, CodegenError> {
    Builder::new(sub, program, names).build()
}

pub fn build_mir_program(program: &Program, version: u32) -> Result<MirProgram, CodegenError> {
    let names = assign_subroutine_names(program);
    let main = build_mir_subroutine(&program.main, program, &names)?;
    let subroutines = program
        .subroutines
        .iter()
        .map(|s| build_mir_subroutine(s, program, &names))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MirProgram {
        version,
        main,
        subroutines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use avm_ir::{Intrinsic, StateTotals};

    fn return_const_program() -> Program {
        let r = Register::new("r", 0, AType::U64);
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![Value::Register(r.clone())]));
        block.ops = vec![Assignment::single(
            r,
            OpSource::Intrinsic(Intrinsic::new("+", vec![Value::u64_const(1), Value::u64_const(2)])),
        )];
        let main = Subroutine::new("main", vec![], vec![AType::U64], vec![block]);
        Program {
            id: "p".into(),
            main,
            subroutines: vec![],
        }
    }

    #[test]
    fn builds_linear_push_intrinsic_store_stream() {
        let program = return_const_program();
        let mir = build_mir_program(&program, 10).unwrap();
        assert_eq!(mir.main.blocks.len(), 1);
        let ops = &mir.main.blocks[0].ops;
        assert_eq!(ops[0], MirOp::PushInt(1));
        assert_eq!(ops[1], MirOp::PushInt(2));
        assert!(matches!(&ops[2], MirOp::Intrinsic { op_code, .. } if op_code == "+"));
        assert_eq!(ops[3], MirOp::StoreLocal(0));
        assert_eq!(ops[4], MirOp::LoadLocal(0));
        assert_eq!(ops[5], MirOp::Return);
    }

    #[test]
    fn implicit_fallthrough_elides_branch_to_next_block() {
        let mut b0 = BasicBlock::new(BlockId(0), Terminator::Goto(BlockId(1)));
        b0.refresh_successors();
        let b1 = BasicBlock::new(BlockId(1), Terminator::SubroutineReturn(vec![]));
        let main = Subroutine::new("main", vec![], vec![], vec![b0, b1]);
        let program = Program {
            id: "p".into(),
            main,
            subroutines: vec![],
        };
        let mir = build_mir_program(&program, 10).unwrap();
        assert_eq!(mir.main.blocks[0].ops, vec![MirOp::Comment("implicit fall-through".to_string())]);
    }

    #[test]
    fn unused_intrinsic_result_emits_pop() {
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.ops = vec![Assignment::discard(OpSource::Intrinsic(Intrinsic::new(
            "+",
            vec![Value::u64_const(1), Value::u64_const(2)],
        )))];
        let main = Subroutine::new("main", vec![], vec![], vec![block]);
        let program = Program {
            id: "p".into(),
            main,
            subroutines: vec![],
        };
        let mir = build_mir_program(&program, 10).unwrap();
        assert!(mir.main.blocks[0].ops.contains(&MirOp::Pop(1)));
    }

    #[test]
    fn subroutine_naming_prefers_shortest_unique() {
        let leaf = |n: &str| Subroutine::new(n, vec![], vec![], vec![BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]))]);
        let main = leaf("main");
        let a = leaf("Foo.bar");
        let b = leaf("Baz.bar");
        let program = Program {
            id: "p".into(),
            main,
            subroutines: vec![a, b],
        };
        let names = assign_subroutine_names(&program);
        assert_eq!(names["main"], "main");
        assert_ne!(names["Foo.bar"], names["Baz.bar"]);
    }

    #[test]
    fn phi_surviving_destruction_is_an_error() {
        use avm_ir::Phi;
        let mut block = BasicBlock::new(BlockId(0), Terminator::SubroutineReturn(vec![]));
        block.phis = vec![Phi {
            register: Register::new("x", 0, AType::U64),
            args: vec![],
        }];
        let main = Subroutine::new("main", vec![], vec![], vec![block]);
        let program = Program {
            id: "p".into(),
            main,
            subroutines: vec![],
        };
        assert!(build_mir_program(&program, 10).is_err());
    }

    #[test]
    fn state_totals_default_is_zeroed() {
        assert_eq!(StateTotals::default().global_ints, 0);
    }
}
