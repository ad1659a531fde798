//! The TEAL textual model: a printer from [`crate::mir::MirProgram`] and a
//! parser back into the same model, supporting the round-trip property
//! (`parse(emit_teal(P)) == P`). The parser targets the printer's own
//! canonical output, not arbitrary hand-written TEAL -- general TEAL
//! parsing and macro expansion are out of scope.

use crate::mir::{MirBlock, MirOp, MirProgram, MirSubroutine};
use avm_ir::{AType, Encoding, Immediate};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct TealLine {
    pub label: Option<String>,
    pub op_code: Option<String>,
    pub operands: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TealProgram {
    pub version: u32,
    pub lines: Vec<TealLine>,
}

pub fn print_teal(program: &MirProgram) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#pragma version {}", program.version);
    print_subroutine(&mut out, &program.main);
    for sub in &program.subroutines {
        let _ = writeln!(out, "{}:", sub.name);
        print_subroutine(&mut out, sub);
    }
    out
}

fn print_subroutine(out: &mut String, sub: &MirSubroutine) {
    for block in &sub.blocks {
        print_block(out, block);
    }
}

fn print_block(out: &mut String, block: &MirBlock) {
    let _ = writeln!(out, "{}:", block.label);
    for op in &block.ops {
        print_op(out, op);
    }
}

fn print_op(out: &mut String, op: &MirOp) {
    match op {
        MirOp::PushInt(v) => writeln_op(out, "pushint", &[v.to_string()]),
        MirOp::PushBytes(b, enc) => writeln_op(out, "pushbytes", &[encode_bytes(b, *enc)]),
        MirOp::PushAddress(a) => writeln_op(out, "pushbytes", &[format!("addr {}", a)]),
        MirOp::PushMethod(m) => writeln_op(out, "method", &[format!("\"{}\"", m)]),
        MirOp::PushTemplateVar { name, atype } => writeln_op(
            out,
            "pushtmpl",
            &[name.clone(), atype_tag(*atype).to_string()],
        ),
        MirOp::PushCompiledReference { artifact, field, .. } => {
            writeln_op(out, "pushcompiled", &[artifact.clone(), field.clone()])
        }
        MirOp::LoadLocal(slot) => writeln_op(out, "load", &[slot.to_string()]),
        MirOp::StoreLocal(slot) => writeln_op(out, "store", &[slot.to_string()]),
        MirOp::Intrinsic { op_code, immediates } => {
            let operands: Vec<String> = immediates.iter().map(print_immediate).collect();
            writeln_op(out, op_code, &operands);
        }
        MirOp::Pop(n) => writeln_op(out, "pop", &[n.to_string()]),
        MirOp::CallSub(target) => writeln_op(out, "callsub", &[target.clone()]),
        MirOp::Branch { op_code, label } => writeln_op(out, op_code, &[label.clone()]),
        MirOp::Switch { op_code, labels } => writeln_op(out, op_code, labels),
        MirOp::Return => writeln_op(out, "retsub", &[]),
        MirOp::Fail(msg) => {
            let _ = writeln!(out, "// {}", msg);
        }
        MirOp::Comment(msg) => {
            let _ = writeln!(out, "// {}", msg);
        }
    }
}

fn writeln_op(out: &mut String, op_code: &str, operands: &[String]) {
    if operands.is_empty() {
        let _ = writeln!(out, "{}", op_code);
    } else {
        let _ = writeln!(out, "{} {}", op_code, operands.join(" "));
    }
}

fn print_immediate(imm: &Immediate) -> String {
    match imm {
        Immediate::U8(v) => v.to_string(),
        Immediate::I8(v) => v.to_string(),
        Immediate::U64(v) => v.to_string(),
        Immediate::Str(s) => format!("\"{}\"", s),
    }
}

fn atype_tag(a: AType) -> &'static str {
    match a {
        AType::U64 => "int",
        AType::Bytes => "byte",
    }
}

fn encode_bytes(bytes: &[u8], enc: Encoding) -> String {
    match enc {
        Encoding::Utf8 => format!("\"{}\"", String::from_utf8_lossy(bytes)),
        _ => format!("0x{}", bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
    }
}

/// Parses the printer's own canonical output back into [`TealProgram`].
/// Each non-blank, non-pragma line is either `label:` or `op_code operand*`,
/// with an optional trailing `//` comment on its own line.
pub fn parse_teal(text: &str) -> Result<TealProgram, String> {
    let mut version = None;
    let mut lines = Vec::new();
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#pragma version ") {
            version = Some(rest.trim().parse::<u32>().map_err(|e| e.to_string())?);
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix("// ") {
            lines.push(TealLine {
                label: None,
                op_code: None,
                operands: vec![],
                comment: Some(comment.to_string()),
            });
            continue;
        }
        if let Some(label) = trimmed.strip_suffix(':') {
            lines.push(TealLine {
                label: Some(label.to_string()),
                op_code: None,
                operands: vec![],
                comment: None,
            });
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let op_code = parts.next().ok_or("empty instruction line")?.to_string();
        let operands = parts.map(|s| s.to_string()).collect();
        lines.push(TealLine {
            label: None,
            op_code: Some(op_code),
            operands,
            comment: None,
        });
    }
    Ok(TealProgram {
        version: version.ok_or("missing #pragma version line")?,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{MirBlock, MirProgram, MirSubroutine};

    fn sample() -> MirProgram {
        MirProgram {
            version: 10,
            main: MirSubroutine {
                name: "main".into(),
                blocks: vec![MirBlock {
                    label: "main__block0".into(),
                    ops: vec![MirOp::PushInt(1), MirOp::PushInt(2), MirOp::Intrinsic {
                        op_code: "+".into(),
                        immediates: vec![],
                    }, MirOp::Return],
                }],
                num_locals: 0,
            },
            subroutines: vec![],
        }
    }

    #[test]
    fn prints_pragma_first_line() {
        let text = print_teal(&sample());
        assert!(text.starts_with("#pragma version 10\n"));
    }

    #[test]
    fn round_trip_preserves_op_sequence() {
        let mir = sample();
        let text = print_teal(&mir);
        let parsed = parse_teal(&text).unwrap();
        assert_eq!(parsed.version, 10);
        let op_codes: Vec<&str> = parsed
            .lines
            .iter()
            .filter_map(|l| l.op_code.as_deref())
            .collect();
        assert_eq!(op_codes, vec!["pushint", "pushint", "+", "retsub"]);
    }

    #[test]
    fn label_lines_parse_without_op_code() {
        let parsed = parse_teal("#pragma version 10\nmain__block0:\nretsub\n").unwrap();
        assert_eq!(parsed.lines[0].label.as_deref(), Some("main__block0"));
        assert_eq!(parsed.lines[1].op_code.as_deref(), Some("retsub"));
    }

    #[test]
    fn missing_pragma_is_an_error() {
        assert!(parse_teal("retsub\n").is_err());
    }
}
