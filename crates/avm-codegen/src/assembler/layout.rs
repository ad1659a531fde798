//! Label/offset resolution and final byte encoding.
//!
//! Two passes over the flat [`AsmOp`] stream: the first walks every op in
//! order to assign each a program-counter position and record every
//! label's position (erroring on a label defined twice); the second
//! re-walks the same stream encoding each op to bytes, resolving jump
//! targets to a signed 16-bit big-endian offset counted from the end of
//! the jump instruction itself, and erroring if a target label was never
//! defined or the offset doesn't fit.
//!
//! Concrete per-opcode byte values are an internal, self-consistent
//! numbering scheme, not algod's real bytecode table -- that table is
//! generated from `langspec.json`, a data artifact this crate treats as
//! out of scope (see `avm_ir::optable`). `match_algod_bytecode` therefore
//! only governs constant-pool combining (see `pool.rs`), not opcode byte
//! identity.

use std::collections::HashMap;
use std::sync::OnceLock;

use avm_ir::Immediate;

use super::lower::AsmOp;
use crate::error::CodegenError;

const CONTROL_OPS: &[&str] = &[
    "pop", "load", "store", "err", "return", "retsub", "callsub", "b", "bz", "bnz", "switch", "match", "intcblock",
    "bytecblock", "intc", "bytec", "pushint", "pushbytes", "pushints", "pushbytess",
];

const INTRINSIC_OPS: &[&str] = &[
    "not", "~", "b~", "btoi", "itob", "bzero", "len", "setbit", "getbit", "extract_uint16", "extract_uint32",
    "extract_uint64", "concat", "extract", "extract3", "substring", "substring3", "+", "-", "*", "/", "%", "<", "<=",
    ">", ">=", "==", "!=", "&&", "||", "<<", ">>", "**", "&", "|", "^", "exp", "b+", "b-", "b*", "b/", "b%", "b<",
    "b<=", "b>", "b>=", "b==", "b!=", "b&", "b|", "b^", "assert",
];

static OPCODE_TABLE: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();

fn opcode_byte(op_code: &str) -> u8 {
    let table = OPCODE_TABLE.get_or_init(|| {
        CONTROL_OPS
            .iter()
            .chain(INTRINSIC_OPS.iter())
            .enumerate()
            .map(|(i, &name)| (name, i as u8))
            .collect()
    });
    *table.get(op_code).unwrap_or(&0xFF)
}

fn leb128(mut v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
    out
}

fn immediate_len(imm: &Immediate) -> usize {
    match imm {
        Immediate::U8(_) | Immediate::I8(_) => 1,
        Immediate::U64(v) => leb128(*v).len(),
        Immediate::Str(s) => leb128(s.len() as u64).len() + s.len(),
    }
}

fn encode_immediate(imm: &Immediate, out: &mut Vec<u8>) {
    match imm {
        Immediate::U8(v) => out.push(*v),
        Immediate::I8(v) => out.push(*v as u8),
        Immediate::U64(v) => out.extend(leb128(*v)),
        Immediate::Str(s) => {
            out.extend(leb128(s.len() as u64));
            out.extend(s.as_bytes());
        }
    }
}

fn op_len(op: &AsmOp) -> usize {
    match op {
        AsmOp::Label(_) => 0,
        AsmOp::PushInt(v) => 1 + leb128(*v).len(),
        AsmOp::PushBytes(b) => 1 + leb128(b.len() as u64).len() + b.len(),
        AsmOp::Intc(_) | AsmOp::Bytec(_) => 2,
        AsmOp::IntcBlock(vals) => 1 + leb128(vals.len() as u64).len() + vals.iter().map(|v| leb128(*v).len()).sum::<usize>(),
        AsmOp::BytecBlock(vals) => {
            1 + leb128(vals.len() as u64).len()
                + vals.iter().map(|b| leb128(b.len() as u64).len() + b.len()).sum::<usize>()
        }
        AsmOp::PushInts(vs) => 1 + leb128(vs.len() as u64).len() + vs.iter().map(|v| leb128(*v).len()).sum::<usize>(),
        AsmOp::PushBytess(bs) => {
            1 + leb128(bs.len() as u64).len()
                + bs.iter().map(|b| leb128(b.len() as u64).len() + b.len()).sum::<usize>()
        }
        AsmOp::Intrinsic { immediates, .. } => 1 + immediates.iter().map(immediate_len).sum::<usize>(),
        AsmOp::Jump { .. } => 3,
        AsmOp::MultiJump { labels, .. } => 2 + 2 * labels.len(),
    }
}

/// Assigns a program-counter position to every op and records every
/// label's position. Errors if the same label is defined twice.
pub fn compute_label_positions(ops: &[AsmOp]) -> Result<HashMap<String, u32>, CodegenError> {
    let mut labels = HashMap::new();
    let mut pc: u32 = 0;
    for op in ops {
        if let AsmOp::Label(name) = op {
            if labels.insert(name.clone(), pc).is_some() {
                return Err(CodegenError::DuplicateLabel(name.clone()));
            }
            continue;
        }
        pc += op_len(op) as u32;
    }
    Ok(labels)
}

fn signed_offset(target: u32, after_instruction: u32, label: &str) -> Result<i16, CodegenError> {
    let offset = target as i64 - after_instruction as i64;
    if !(i16::MIN as i64..=i16::MAX as i64).contains(&offset) {
        return Err(CodegenError::BranchTooFar { label: label.to_string(), offset });
    }
    Ok(offset as i16)
}

/// Encodes the full op stream to bytes, resolving every jump against
/// `labels` (from [`compute_label_positions`]).
pub fn encode(ops: &[AsmOp], labels: &HashMap<String, u32>) -> Result<Vec<u8>, CodegenError> {
    let mut out = Vec::new();
    let mut pc: u32 = 0;
    for op in ops {
        match op {
            AsmOp::Label(_) => continue,
            AsmOp::PushInt(v) => {
                out.push(opcode_byte("pushint"));
                out.extend(leb128(*v));
            }
            AsmOp::PushBytes(b) => {
                out.push(opcode_byte("pushbytes"));
                out.extend(leb128(b.len() as u64));
                out.extend(b);
            }
            AsmOp::Intc(idx) => {
                out.push(opcode_byte("intc"));
                out.push(*idx);
            }
            AsmOp::Bytec(idx) => {
                out.push(opcode_byte("bytec"));
                out.push(*idx);
            }
            AsmOp::IntcBlock(vals) => {
                out.push(opcode_byte("intcblock"));
                out.extend(leb128(vals.len() as u64));
                for v in vals {
                    out.extend(leb128(*v));
                }
            }
            AsmOp::BytecBlock(vals) => {
                out.push(opcode_byte("bytecblock"));
                out.extend(leb128(vals.len() as u64));
                for b in vals {
                    out.extend(leb128(b.len() as u64));
                    out.extend(b);
                }
            }
            AsmOp::PushInts(vs) => {
                out.push(opcode_byte("pushints"));
                out.extend(leb128(vs.len() as u64));
                for v in vs {
                    out.extend(leb128(*v));
                }
            }
            AsmOp::PushBytess(bs) => {
                out.push(opcode_byte("pushbytess"));
                out.extend(leb128(bs.len() as u64));
                for b in bs {
                    out.extend(leb128(b.len() as u64));
                    out.extend(b);
                }
            }
            AsmOp::Intrinsic { op_code, immediates } => {
                out.push(opcode_byte(op_code));
                for imm in immediates {
                    encode_immediate(imm, &mut out);
                }
            }
            AsmOp::Jump { op_code, label } => {
                let after = pc + op_len(op) as u32;
                let target = *labels.get(label).ok_or_else(|| CodegenError::UndefinedLabel(label.clone()))?;
                let offset = signed_offset(target, after, label)?;
                out.push(opcode_byte(op_code));
                out.extend(offset.to_be_bytes());
            }
            AsmOp::MultiJump { op_code, labels: targets } => {
                let after = pc + op_len(op) as u32;
                out.push(opcode_byte(op_code));
                out.push(targets.len() as u8);
                for label in targets {
                    let target = *labels.get(label).ok_or_else(|| CodegenError::UndefinedLabel(label.clone()))?;
                    let offset = signed_offset(target, after, label)?;
                    out.extend(offset.to_be_bytes());
                }
            }
        }
        pc += op_len(op) as u32;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_branch_encodes_five_byte_distance() {
        // pushint 1 (2 bytes) ; b target (3 bytes) ; 5 bytes of filler ; target: retsub (1 byte)
        // so the distance from the end of `b` to `target:` is exactly 5.
        let ops = vec![
            AsmOp::Label("entry".into()),
            AsmOp::PushInt(1),
            AsmOp::Jump { op_code: "b".into(), label: "target".into() },
            AsmOp::Intrinsic { op_code: "pop".into(), immediates: vec![] },
            AsmOp::Intrinsic { op_code: "pop".into(), immediates: vec![] },
            AsmOp::Intrinsic { op_code: "pop".into(), immediates: vec![] },
            AsmOp::Intrinsic { op_code: "pop".into(), immediates: vec![] },
            AsmOp::Intrinsic { op_code: "pop".into(), immediates: vec![] },
            AsmOp::Label("target".into()),
            AsmOp::Intrinsic { op_code: "retsub".into(), immediates: vec![] },
        ];
        let labels = compute_label_positions(&ops).unwrap();
        let bytes = encode(&ops, &labels).unwrap();
        // pushint opcode + 1-byte leb128(1) = 2 bytes, then branch opcode + 2-byte offset.
        assert_eq!(bytes[2], opcode_byte("b"));
        assert_eq!(&bytes[3..5], &5i16.to_be_bytes());
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let ops = vec![
            AsmOp::Label("x".into()),
            AsmOp::Label("x".into()),
        ];
        assert!(compute_label_positions(&ops).is_err());
    }

    #[test]
    fn undefined_label_is_an_error() {
        let ops = vec![AsmOp::Jump { op_code: "b".into(), label: "nowhere".into() }];
        let labels = compute_label_positions(&ops).unwrap();
        assert!(encode(&ops, &labels).is_err());
    }

    #[test]
    fn branch_too_far_is_an_error() {
        let mut ops = vec![AsmOp::Jump { op_code: "b".into(), label: "target".into() }];
        for _ in 0..40_000 {
            ops.push(AsmOp::Intrinsic { op_code: "pop".into(), immediates: vec![] });
        }
        ops.push(AsmOp::Label("target".into()));
        let labels = compute_label_positions(&ops).unwrap();
        assert!(matches!(encode(&ops, &labels), Err(CodegenError::BranchTooFar { .. })));
    }
}
