//! Pseudo-op lowering: turns each [`MirOp`] into one or more [`AsmOp`]s,
//! resolving everything that needs outside information to do so --
//! `Method`/`Address` hashing, template-variable substitution, and
//! compiled-reference bytes supplied by the cache -- so every later
//! assembler stage only ever sees concrete pushes and jumps.

use std::collections::HashMap;

use avm_ir::{AType, Immediate};
use sha2::{Digest, Sha512_256};

use crate::address::decode_address;
use crate::error::CodegenError;
use crate::mir::{MirBlock, MirOp, MirProgram, MirSubroutine};
use crate::template::TemplateValue;

/// A fully-resolved, label-relative assembly instruction. Everything that
/// depended on outside data (template variables, compiled references,
/// method/address literals) has already been turned into raw bytes by the
/// time a value reaches this type.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmOp {
    Label(String),
    PushInt(u64),
    PushBytes(Vec<u8>),
    /// Index into the subroutine's `intcblock`, produced by constant pooling.
    Intc(u8),
    /// Index into the subroutine's `bytecblock`, produced by constant pooling.
    Bytec(u8),
    IntcBlock(Vec<u64>),
    BytecBlock(Vec<Vec<u8>>),
    /// Combined run of non-pooled int pushes (`match_algod_bytecode == false`).
    PushInts(Vec<u64>),
    /// Combined run of non-pooled bytes pushes (`match_algod_bytecode == false`).
    PushBytess(Vec<Vec<u8>>),
    /// Internal locals load/store and every other fixed-arity intrinsic.
    Intrinsic { op_code: String, immediates: Vec<Immediate> },
    Jump { op_code: String, label: String },
    MultiJump { op_code: String, labels: Vec<String> },
}

pub fn lower_mir_program(
    program: &MirProgram,
    template_vars: &HashMap<String, TemplateValue>,
    compiled_refs: &HashMap<(String, String), Vec<u8>>,
) -> Result<Vec<AsmOp>, CodegenError> {
    let mut out = Vec::new();
    // main is never a `callsub` target, so -- matching `teal::print_teal` --
    // it gets no entry label of its own, just its blocks.
    for block in &program.main.blocks {
        lower_mir_block(block, template_vars, compiled_refs, &mut out)?;
    }
    for sub in &program.subroutines {
        lower_mir_subroutine(sub, template_vars, compiled_refs, &mut out)?;
    }
    Ok(out)
}

fn lower_mir_subroutine(
    sub: &MirSubroutine,
    template_vars: &HashMap<String, TemplateValue>,
    compiled_refs: &HashMap<(String, String), Vec<u8>>,
    out: &mut Vec<AsmOp>,
) -> Result<(), CodegenError> {
    // `CallSub` targets the subroutine's own name, not its entry block's
    // label, so that name needs a label of its own ahead of the blocks.
    out.push(AsmOp::Label(sub.name.clone()));
    for block in &sub.blocks {
        lower_mir_block(block, template_vars, compiled_refs, out)?;
    }
    Ok(())
}

fn lower_mir_block(
    block: &MirBlock,
    template_vars: &HashMap<String, TemplateValue>,
    compiled_refs: &HashMap<(String, String), Vec<u8>>,
    out: &mut Vec<AsmOp>,
) -> Result<(), CodegenError> {
    out.push(AsmOp::Label(block.label.clone()));
    for op in &block.ops {
        lower_mir_op(op, template_vars, compiled_refs, out)?;
    }
    Ok(())
}

fn lower_mir_op(
    op: &MirOp,
    template_vars: &HashMap<String, TemplateValue>,
    compiled_refs: &HashMap<(String, String), Vec<u8>>,
    out: &mut Vec<AsmOp>,
) -> Result<(), CodegenError> {
    match op {
        MirOp::PushInt(v) => out.push(AsmOp::PushInt(*v)),
        MirOp::PushBytes(b, _) => out.push(AsmOp::PushBytes(b.clone())),
        MirOp::PushAddress(addr) => {
            let bytes = decode_address(addr).ok_or_else(|| CodegenError::InvalidAddress(addr.clone()))?;
            out.push(AsmOp::PushBytes(bytes));
        }
        MirOp::PushMethod(method) => {
            let mut hasher = Sha512_256::new();
            hasher.update(method.as_bytes());
            let digest = hasher.finalize();
            out.push(AsmOp::PushBytes(digest[..4].to_vec()));
        }
        MirOp::PushTemplateVar { name, atype } => {
            let value = template_vars
                .get(name)
                .ok_or_else(|| CodegenError::TemplateError(name.clone()))?;
            match (atype, value) {
                (AType::U64, TemplateValue::U64(v)) => out.push(AsmOp::PushInt(*v)),
                (AType::Bytes, TemplateValue::Bytes(b)) => out.push(AsmOp::PushBytes(b.clone())),
                _ => return Err(CodegenError::TemplateError(name.clone())),
            }
        }
        MirOp::PushCompiledReference { artifact, field, .. } => {
            let key = (artifact.clone(), field.clone());
            let bytes = compiled_refs
                .get(&key)
                .ok_or_else(|| CodegenError::TemplateError(format!("{}.{}", artifact, field)))?;
            out.push(AsmOp::PushBytes(bytes.clone()));
        }
        MirOp::LoadLocal(slot) => out.push(AsmOp::Intrinsic {
            op_code: "load".to_string(),
            immediates: vec![Immediate::U8(*slot)],
        }),
        MirOp::StoreLocal(slot) => out.push(AsmOp::Intrinsic {
            op_code: "store".to_string(),
            immediates: vec![Immediate::U8(*slot)],
        }),
        MirOp::Intrinsic { op_code, immediates } => out.push(AsmOp::Intrinsic {
            op_code: op_code.clone(),
            immediates: immediates.clone(),
        }),
        MirOp::Pop(n) => {
            for _ in 0..*n {
                out.push(AsmOp::Intrinsic {
                    op_code: "pop".to_string(),
                    immediates: vec![],
                });
            }
        }
        MirOp::CallSub(target) => out.push(AsmOp::Jump {
            op_code: "callsub".to_string(),
            label: target.clone(),
        }),
        MirOp::Branch { op_code, label } => out.push(AsmOp::Jump {
            op_code: (*op_code).to_string(),
            label: label.clone(),
        }),
        MirOp::Switch { op_code, labels } => out.push(AsmOp::MultiJump {
            op_code: (*op_code).to_string(),
            labels: labels.clone(),
        }),
        MirOp::Return => out.push(AsmOp::Intrinsic {
            op_code: "retsub".to_string(),
            immediates: vec![],
        }),
        MirOp::Fail(_) => out.push(AsmOp::Intrinsic {
            op_code: "err".to_string(),
            immediates: vec![],
        }),
        MirOp::Comment(_) => {}
    }
    Ok(())
}
