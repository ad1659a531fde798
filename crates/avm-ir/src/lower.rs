//! AWST to SSA IR lowering.
//!
//! SSA is built with the on-the-fly ("incomplete blocks") construction:
//! each block under construction tracks its own `local_id -> Value` map.
//! A read of a variable not yet defined in the current block recurses to
//! predecessors; if the block is not yet *sealed* (not all predecessors
//! known -- true of a loop header before its latch edge exists), an empty
//! phi placeholder is recorded and filled in once the block seals. This
//! avoids the two-pass "build CFG, then insert phis at dominance
//! frontiers" shape in favor of one pass that may emit trivial phis, which
//! `avm-optimize`'s copy-propagation pass later collapses -- the same
//! division of labor the optimizer's dead-code pass already performs for
//! plain copies.

use crate::awst::{AwstExpr, AwstFunction, AwstStmt, AwstType};
use crate::block::{BasicBlock, Terminator};
use crate::error::{IrError, SourceLocation};
use crate::id::BlockId;
use crate::ops::{Assignment, Intrinsic, InvokeSubroutine, OpSource, Phi};
use crate::optable::OpTable;
use crate::subroutine::{Program, Subroutine};
use crate::value::{AType, Register, Value};
use std::collections::{HashMap, HashSet};

struct FunctionBuilder {
    blocks: Vec<BasicBlock>,
    defs: HashMap<BlockId, HashMap<String, Value>>,
    sealed: HashSet<BlockId>,
    incomplete_phi_vars: HashMap<BlockId, Vec<String>>,
    local_version: HashMap<String, u32>,
    known_locals: HashSet<String>,
    var_atype: HashMap<String, AType>,
}

impl FunctionBuilder {
    fn new() -> Self {
        FunctionBuilder {
            blocks: Vec::new(),
            defs: HashMap::new(),
            sealed: HashSet::new(),
            incomplete_phi_vars: HashMap::new(),
            local_version: HashMap::new(),
            known_locals: HashSet::new(),
            var_atype: HashMap::new(),
        }
    }

    fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks
            .push(BasicBlock::new(id, Terminator::Fail("unterminated block".into())));
        id
    }

    fn block(&self, id: BlockId) -> &BasicBlock {
        self.blocks.iter().find(|b| b.id == id).expect("block exists")
    }

    fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        self.blocks.iter_mut().find(|b| b.id == id).expect("block exists")
    }

    fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        let targets = term.successors();
        self.block_mut(block).terminator = term;
        self.block_mut(block).refresh_successors();
        for t in targets {
            self.block_mut(t).predecessors.push(block);
        }
    }

    fn seal_block(&mut self, block: BlockId) {
        self.sealed.insert(block);
        if let Some(names) = self.incomplete_phi_vars.remove(&block) {
            for name in names {
                self.fill_phi_operands(block, &name);
            }
        }
    }

    fn fresh_register(&mut self, name: &str, atype: AType) -> Register {
        let v = self.local_version.entry(name.to_string()).or_insert(0);
        let reg = Register::new(name, *v, atype);
        *v += 1;
        reg
    }

    fn write_variable(&mut self, block: BlockId, name: &str, value: Value) {
        self.defs.entry(block).or_default().insert(name.to_string(), value);
    }

    fn read_variable(&mut self, block: BlockId, name: &str, atype: AType) -> Value {
        if let Some(v) = self.defs.get(&block).and_then(|m| m.get(name)) {
            return v.clone();
        }
        self.read_variable_recursive(block, name, atype)
    }

    fn read_variable_recursive(&mut self, block: BlockId, name: &str, atype: AType) -> Value {
        let value = if !self.sealed.contains(&block) {
            let reg = self.fresh_register(name, atype);
            self.block_mut(block).phis.push(Phi {
                register: reg.clone(),
                args: Vec::new(),
            });
            self.incomplete_phi_vars
                .entry(block)
                .or_default()
                .push(name.to_string());
            Value::Register(reg)
        } else {
            let preds = self.block(block).predecessors.clone();
            match preds.as_slice() {
                [] => Value::Constant(default_const(atype)),
                [single] => self.read_variable(*single, name, atype),
                _ => {
                    let reg = self.fresh_register(name, atype);
                    self.block_mut(block).phis.push(Phi {
                        register: reg.clone(),
                        args: Vec::new(),
                    });
                    // Break potential cycles through this variable before
                    // recursing into predecessors.
                    self.write_variable(block, name, Value::Register(reg.clone()));
                    self.fill_phi_operands(block, name);
                    Value::Register(reg)
                }
            }
        };
        self.write_variable(block, name, value.clone());
        value
    }

    fn fill_phi_operands(&mut self, block: BlockId, name: &str) {
        let reg = self
            .block(block)
            .phis
            .iter()
            .rev()
            .find(|p| p.register.local_id == name)
            .map(|p| p.register.clone())
            .expect("phi was registered for this (block, name)");
        let preds = self.block(block).predecessors.clone();
        let mut args = Vec::with_capacity(preds.len());
        for p in preds {
            let v = self.read_variable(p, name, reg.atype);
            args.push((p, v));
        }
        if let Some(phi) = self
            .block_mut(block)
            .phis
            .iter_mut()
            .find(|p| p.register == reg)
        {
            phi.args = args;
        }
    }
}

fn default_const(atype: AType) -> crate::value::Constant {
    match atype {
        AType::U64 => crate::value::Constant::U64Const(0),
        AType::Bytes => crate::value::Constant::BytesConst(Vec::new(), crate::value::Encoding::Unknown),
    }
}

/// Lowers one function into a [`Subroutine`].
pub fn lower_function(func: &AwstFunction) -> Result<Subroutine, IrError> {
    let mut b = FunctionBuilder::new();
    let entry = b.new_block();
    for (name, ty) in &func.params {
        b.known_locals.insert(name.clone());
        let atype = ty.atype().ok_or_else(|| IrError::TypeMismatch {
            loc: SourceLocation::unknown(),
            expected: "non-void parameter type".into(),
            found: "void".into(),
        })?;
        b.var_atype.insert(name.clone(), atype);
        let reg = b.fresh_register(name, atype);
        b.write_variable(entry, name, Value::Register(reg));
    }
    collect_declared_locals(&func.body, &mut b.known_locals);

    let mut cur = entry;
    b.seal_block(entry); // entry has no predecessors, sealing is a no-op but keeps invariants explicit
    let terminated = lower_block(&mut b, &mut cur, &func.body)?;
    if !terminated {
        b.set_terminator(cur, Terminator::SubroutineReturn(Vec::new()));
    }

    let params = func
        .params
        .iter()
        .map(|(name, ty)| Register::new(name.clone(), 0, ty.atype().unwrap()))
        .collect();
    let returns = func
        .return_types
        .iter()
        .filter_map(|t| t.atype())
        .collect();

    Ok(Subroutine::new(func.name.clone(), params, returns, b.blocks))
}

/// Lowers a whole AWST program (a collection of functions with one
/// designated entry point named `main`) into a [`Program`].
pub fn lower_program(id: impl Into<String>, functions: &[AwstFunction]) -> Result<Program, IrError> {
    let mut subs = Vec::new();
    let mut main = None;
    for f in functions {
        let sub = lower_function(f)?;
        if f.name == "main" {
            main = Some(sub);
        } else {
            subs.push(sub);
        }
    }
    let main = main.ok_or_else(|| IrError::UndefinedSymbol {
        name: "main".into(),
        loc: SourceLocation::unknown(),
    })?;
    Ok(Program {
        id: id.into(),
        main,
        subroutines: subs,
    })
}

fn collect_declared_locals(stmts: &[AwstStmt], out: &mut HashSet<String>) {
    for s in stmts {
        match s {
            AwstStmt::Let { name, .. } => {
                out.insert(name.clone());
            }
            AwstStmt::If {
                then_body, else_body, ..
            } => {
                collect_declared_locals(then_body, out);
                collect_declared_locals(else_body, out);
            }
            AwstStmt::While { body, .. } => collect_declared_locals(body, out),
            _ => {}
        }
    }
}

/// Lowers a statement sequence starting at `*cur`, updating `*cur` to the
/// block control falls through to. Returns `true` if the sequence ended in
/// a terminator (return) so the caller should not add a fallthrough edge.
fn lower_block(
    b: &mut FunctionBuilder,
    cur: &mut BlockId,
    stmts: &[AwstStmt],
) -> Result<bool, IrError> {
    for stmt in stmts {
        match stmt {
            AwstStmt::Let { name, value, loc } | AwstStmt::Assign { name, value, loc } => {
                let atype = value.result_type().atype().ok_or_else(|| IrError::TypeMismatch {
                    loc: loc.clone(),
                    expected: "non-void expression".into(),
                    found: "void".into(),
                })?;
                b.var_atype.insert(name.clone(), atype);
                let v = lower_expr(b, *cur, value)?;
                b.write_variable(*cur, name, v);
            }
            AwstStmt::ExprStmt(expr) => {
                lower_expr(b, *cur, expr)?;
            }
            AwstStmt::Return(values, _loc) => {
                let mut lowered = Vec::with_capacity(values.len());
                for v in values {
                    lowered.push(lower_expr(b, *cur, v)?);
                }
                b.set_terminator(*cur, Terminator::SubroutineReturn(lowered));
                return Ok(true);
            }
            AwstStmt::If {
                cond,
                then_body,
                else_body,
                loc,
            } => {
                let cond_val = lower_expr(b, *cur, cond)?;
                if cond_val.atype() != AType::U64 {
                    return Err(IrError::TypeMismatch {
                        loc: loc.clone(),
                        expected: "u64".into(),
                        found: cond_val.atype().to_string(),
                    });
                }
                let then_block = b.new_block();
                let else_block = b.new_block();
                let merge_block = b.new_block();
                b.set_terminator(
                    *cur,
                    Terminator::CondBranch {
                        cond: cond_val,
                        zero: else_block,
                        non_zero: then_block,
                    },
                );

                b.seal_block(then_block);
                let mut then_cur = then_block;
                let then_terminated = lower_block(b, &mut then_cur, then_body)?;
                if !then_terminated {
                    b.set_terminator(then_cur, Terminator::Goto(merge_block));
                }

                b.seal_block(else_block);
                let mut else_cur = else_block;
                let else_terminated = lower_block(b, &mut else_cur, else_body)?;
                if !else_terminated {
                    b.set_terminator(else_cur, Terminator::Goto(merge_block));
                }

                b.seal_block(merge_block);
                if then_terminated && else_terminated {
                    // Merge block is unreachable; leave it with no
                    // predecessors -- dead-block elimination prunes it.
                    return Ok(true);
                }
                *cur = merge_block;
            }
            AwstStmt::While { cond, body, loc } => {
                let header = b.new_block();
                b.set_terminator(*cur, Terminator::Goto(header));
                // header is not sealed yet: the latch edge from the body's
                // tail does not exist until the body is lowered below.
                let cond_val = lower_expr(b, header, cond)?;
                if cond_val.atype() != AType::U64 {
                    return Err(IrError::TypeMismatch {
                        loc: loc.clone(),
                        expected: "u64".into(),
                        found: cond_val.atype().to_string(),
                    });
                }
                let body_block = b.new_block();
                let after_block = b.new_block();
                b.set_terminator(
                    header,
                    Terminator::CondBranch {
                        cond: cond_val,
                        zero: after_block,
                        non_zero: body_block,
                    },
                );
                b.seal_block(body_block);
                let mut body_cur = body_block;
                let body_terminated = lower_block(b, &mut body_cur, body)?;
                if !body_terminated {
                    b.set_terminator(body_cur, Terminator::Goto(header));
                }
                // All predecessors of `header` now exist: the preheader and
                // (unless the body always returns) the latch.
                b.seal_block(header);
                b.seal_block(after_block);
                *cur = after_block;
            }
        }
    }
    Ok(false)
}

fn lower_expr(b: &mut FunctionBuilder, block: BlockId, expr: &AwstExpr) -> Result<Value, IrError> {
    match expr {
        AwstExpr::IntLiteral(v, _) => Ok(Value::u64_const(*v)),
        AwstExpr::BytesLiteral(bytes, enc, _) => Ok(Value::bytes_const(bytes.clone(), *enc)),
        AwstExpr::Var(name, ty, loc) => {
            if !b.known_locals.contains(name) {
                return Err(IrError::UndefinedSymbol {
                    name: name.clone(),
                    loc: loc.clone(),
                });
            }
            let atype = ty.atype().ok_or_else(|| IrError::TypeMismatch {
                loc: loc.clone(),
                expected: "non-void variable type".into(),
                found: "void".into(),
            })?;
            Ok(b.read_variable(block, name, atype))
        }
        AwstExpr::Intrinsic {
            op_code,
            args,
            result_type,
            loc,
        } => {
            let sig = OpTable::lookup(op_code).map_err(|_| IrError::UnknownOp {
                op_code: op_code.clone(),
                loc: loc.clone(),
            })?;
            if sig.stack_inputs.len() != args.len() {
                return Err(IrError::ArityMismatch {
                    op_code: op_code.clone(),
                    expected: sig.stack_inputs.len(),
                    found: args.len(),
                });
            }
            let mut lowered_args = Vec::with_capacity(args.len());
            for (slot, arg) in sig.stack_inputs.iter().zip(args.iter()) {
                let v = lower_expr(b, block, arg)?;
                if !slot.accepts(v.atype()) {
                    return Err(IrError::TypeMismatch {
                        loc: loc.clone(),
                        expected: format!("{:?}", slot.allowed),
                        found: v.atype().to_string(),
                    });
                }
                lowered_args.push(v);
            }
            let out_atype = result_type.atype().ok_or_else(|| IrError::TypeMismatch {
                loc: loc.clone(),
                expected: "non-void intrinsic result".into(),
                found: "void".into(),
            })?;
            let target = b.fresh_register("_t", out_atype);
            let assignment = Assignment::single(
                target.clone(),
                OpSource::Intrinsic(Intrinsic::new(op_code.clone(), lowered_args)),
            );
            b.block_mut(block).ops.push(assignment);
            Ok(Value::Register(target))
        }
        AwstExpr::Call {
            target,
            args,
            result_type,
            loc,
        } => {
            let mut lowered_args = Vec::with_capacity(args.len());
            for a in args {
                lowered_args.push(lower_expr(b, block, a)?);
            }
            let out_atype = result_type.atype().ok_or_else(|| IrError::TypeMismatch {
                loc: loc.clone(),
                expected: "non-void call result".into(),
                found: "void".into(),
            })?;
            let dest = b.fresh_register("_t", out_atype);
            let assignment = Assignment::single(
                dest.clone(),
                OpSource::Invoke(InvokeSubroutine {
                    target: target.clone(),
                    args: lowered_args,
                }),
            );
            b.block_mut(block).ops.push(assignment);
            Ok(Value::Register(dest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::unknown()
    }

    #[test]
    fn lowers_straight_line_arithmetic() {
        let func = AwstFunction {
            name: "main".into(),
            params: vec![],
            return_types: vec![AwstType::U64],
            body: vec![AwstStmt::Return(
                vec![AwstExpr::Intrinsic {
                    op_code: "+".into(),
                    args: vec![
                        AwstExpr::IntLiteral(3, loc()),
                        AwstExpr::IntLiteral(4, loc()),
                    ],
                    result_type: AwstType::U64,
                    loc: loc(),
                }],
                loc(),
            )],
        };
        let sub = lower_function(&func).unwrap();
        assert_eq!(sub.body.len(), 1);
        assert_eq!(sub.body[0].ops.len(), 1);
        assert!(matches!(
            sub.body[0].terminator,
            Terminator::SubroutineReturn(_)
        ));
    }

    #[test]
    fn undefined_symbol_is_reported() {
        let func = AwstFunction {
            name: "main".into(),
            params: vec![],
            return_types: vec![AwstType::U64],
            body: vec![AwstStmt::Return(
                vec![AwstExpr::Var("nope".into(), AwstType::U64, loc())],
                loc(),
            )],
        };
        let err = lower_function(&func).unwrap_err();
        assert!(matches!(err, IrError::UndefinedSymbol { .. }));
    }

    #[test]
    fn if_else_inserts_phi_at_merge() {
        let func = AwstFunction {
            name: "main".into(),
            params: vec![("x".into(), AwstType::U64)],
            return_types: vec![AwstType::U64],
            body: vec![
                AwstStmt::Let {
                    name: "y".into(),
                    value: AwstExpr::IntLiteral(0, loc()),
                    loc: loc(),
                },
                AwstStmt::If {
                    cond: AwstExpr::Var("x".into(), AwstType::U64, loc()),
                    then_body: vec![AwstStmt::Assign {
                        name: "y".into(),
                        value: AwstExpr::IntLiteral(1, loc()),
                        loc: loc(),
                    }],
                    else_body: vec![AwstStmt::Assign {
                        name: "y".into(),
                        value: AwstExpr::IntLiteral(2, loc()),
                        loc: loc(),
                    }],
                    loc: loc(),
                },
                AwstStmt::Return(vec![AwstExpr::Var("y".into(), AwstType::U64, loc())], loc()),
            ],
        };
        let sub = lower_function(&func).unwrap();
        let merge = sub.body.last().unwrap();
        assert_eq!(merge.phis.len(), 1);
        assert_eq!(merge.phis[0].args.len(), 2);
    }

    #[test]
    fn while_loop_seals_header_after_latch_exists() {
        let func = AwstFunction {
            name: "main".into(),
            params: vec![("n".into(), AwstType::U64)],
            return_types: vec![AwstType::U64],
            body: vec![
                AwstStmt::Let {
                    name: "i".into(),
                    value: AwstExpr::IntLiteral(0, loc()),
                    loc: loc(),
                },
                AwstStmt::While {
                    cond: AwstExpr::Var("n".into(), AwstType::U64, loc()),
                    body: vec![AwstStmt::Assign {
                        name: "i".into(),
                        value: AwstExpr::Intrinsic {
                            op_code: "+".into(),
                            args: vec![
                                AwstExpr::Var("i".into(), AwstType::U64, loc()),
                                AwstExpr::IntLiteral(1, loc()),
                            ],
                            result_type: AwstType::U64,
                            loc: loc(),
                        },
                        loc: loc(),
                    }],
                    loc: loc(),
                },
                AwstStmt::Return(vec![AwstExpr::Var("i".into(), AwstType::U64, loc())], loc()),
            ],
        };
        let sub = lower_function(&func).unwrap();
        // header block has two predecessors: preheader and the loop latch
        let header = sub.body.iter().find(|b| b.predecessors.len() == 2).unwrap();
        assert!(!header.phis.is_empty());
        assert_eq!(header.phis[0].args.len(), 2);
    }

    #[test]
    fn lower_program_requires_main() {
        let helper = AwstFunction {
            name: "helper".into(),
            params: vec![],
            return_types: vec![],
            body: vec![AwstStmt::Return(vec![], loc())],
        };
        let err = lower_program("p", &[helper]).unwrap_err();
        assert!(matches!(err, IrError::UndefinedSymbol { .. }));
    }
}
