//! The op table: a read-only registry keyed by op-code string.
//!
//! In production this is generated from `langspec.json`, an external data
//! artifact (out of scope for this crate, per the op-table generator being
//! a data artifact and not logic). What's here is the consumer side: a
//! static table built once and looked up by op-code, mirroring the shape
//! that generator would emit. Immediate-pinned variants (`extract3` vs.
//! `extract`) are distinct entries that share a `base_op_code` tag, matching
//! "one internal function per (op-code, immediate-value) pair".

use crate::error::{IrError, SourceLocation};
use crate::value::AType;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::OnceLock;

/// The kind of an op's immediate operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmediateKind {
    U8,
    I8,
    U64,
    Str,
    /// A named enum of allowed immediate string values (e.g. transaction
    /// type, on-completion action).
    ArgEnum(&'static str),
}

/// One allowed stack-input slot: an ordered set of accepted primitive types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSlot {
    pub allowed: SmallVec<[AType; 2]>,
}

impl StackSlot {
    pub fn exact(t: AType) -> Self {
        StackSlot {
            allowed: SmallVec::from_slice(&[t]),
        }
    }

    pub fn any() -> Self {
        StackSlot {
            allowed: SmallVec::from_slice(&[AType::U64, AType::Bytes]),
        }
    }

    pub fn accepts(&self, t: AType) -> bool {
        self.allowed.contains(&t)
    }
}

/// An op's full signature: immediates, stack contract, and control-flow
/// behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSignature {
    pub op_code: &'static str,
    pub immediates: Vec<ImmediateKind>,
    pub stack_inputs: Vec<StackSlot>,
    pub stack_outputs: Vec<AType>,
    /// True for ops that unconditionally end control flow at this point
    /// (unconditional branch, return, error).
    pub deadens: bool,
}

fn u64_slot() -> StackSlot {
    StackSlot::exact(AType::U64)
}
fn bytes_slot() -> StackSlot {
    StackSlot::exact(AType::Bytes)
}

fn build_table() -> HashMap<&'static str, OpSignature> {
    let mut t = HashMap::new();
    let mut add = |sig: OpSignature| {
        t.insert(sig.op_code, sig);
    };

    // --- unary ---
    add(OpSignature {
        op_code: "not",
        immediates: vec![],
        stack_inputs: vec![u64_slot()],
        stack_outputs: vec![AType::U64],
        deadens: false,
    });
    add(OpSignature {
        op_code: "~",
        immediates: vec![],
        stack_inputs: vec![u64_slot()],
        stack_outputs: vec![AType::U64],
        deadens: false,
    });
    add(OpSignature {
        op_code: "b~",
        immediates: vec![],
        stack_inputs: vec![bytes_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "btoi",
        immediates: vec![],
        stack_inputs: vec![bytes_slot()],
        stack_outputs: vec![AType::U64],
        deadens: false,
    });
    add(OpSignature {
        op_code: "itob",
        immediates: vec![],
        stack_inputs: vec![u64_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "bzero",
        immediates: vec![],
        stack_inputs: vec![u64_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "len",
        immediates: vec![],
        stack_inputs: vec![bytes_slot()],
        stack_outputs: vec![AType::U64],
        deadens: false,
    });

    // --- bit ops ---
    add(OpSignature {
        op_code: "setbit",
        immediates: vec![],
        stack_inputs: vec![StackSlot::any(), u64_slot(), u64_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "getbit",
        immediates: vec![],
        stack_inputs: vec![StackSlot::any(), u64_slot()],
        stack_outputs: vec![AType::U64],
        deadens: false,
    });

    // --- extract family ---
    for (name, n) in [("extract_uint16", 16u32), ("extract_uint32", 32), ("extract_uint64", 64)] {
        add(OpSignature {
            op_code: name,
            immediates: vec![],
            stack_inputs: vec![bytes_slot(), u64_slot()],
            stack_outputs: vec![AType::U64],
            deadens: false,
        });
        let _ = n;
    }
    add(OpSignature {
        op_code: "concat",
        immediates: vec![],
        stack_inputs: vec![bytes_slot(), bytes_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "extract",
        immediates: vec![ImmediateKind::U8, ImmediateKind::U8],
        stack_inputs: vec![bytes_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "extract3",
        immediates: vec![],
        stack_inputs: vec![bytes_slot(), u64_slot(), u64_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "substring",
        immediates: vec![ImmediateKind::U8, ImmediateKind::U8],
        stack_inputs: vec![bytes_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });
    add(OpSignature {
        op_code: "substring3",
        immediates: vec![],
        stack_inputs: vec![bytes_slot(), u64_slot(), u64_slot()],
        stack_outputs: vec![AType::Bytes],
        deadens: false,
    });

    // --- u64 arithmetic/compare/logic ---
    for op in ["+", "-", "*", "/", "%", "<", "<=", ">", ">=", "==", "!=", "&&", "||", "<<", ">>", "**", "&", "|", "^"] {
        let outputs = match op {
            "<" | "<=" | ">" | ">=" | "==" | "!=" | "&&" | "||" => vec![AType::U64],
            _ => vec![AType::U64],
        };
        add(OpSignature {
            op_code: op,
            immediates: vec![],
            stack_inputs: vec![u64_slot(), u64_slot()],
            stack_outputs: outputs,
            deadens: false,
        });
    }
    add(OpSignature {
        op_code: "exp",
        immediates: vec![],
        stack_inputs: vec![u64_slot(), u64_slot()],
        stack_outputs: vec![AType::U64],
        deadens: false,
    });

    // --- bytes math ---
    for (op, out) in [
        ("b+", AType::Bytes),
        ("b-", AType::Bytes),
        ("b*", AType::Bytes),
        ("b/", AType::Bytes),
        ("b%", AType::Bytes),
        ("b<", AType::U64),
        ("b<=", AType::U64),
        ("b>", AType::U64),
        ("b>=", AType::U64),
        ("b==", AType::U64),
        ("b!=", AType::U64),
        ("b&", AType::Bytes),
        ("b|", AType::Bytes),
        ("b^", AType::Bytes),
    ] {
        add(OpSignature {
            op_code: op,
            immediates: vec![],
            stack_inputs: vec![bytes_slot(), bytes_slot()],
            stack_outputs: vec![out],
            deadens: false,
        });
    }

    // --- control / terminal intrinsics kept in the table for completeness ---
    add(OpSignature {
        op_code: "err",
        immediates: vec![],
        stack_inputs: vec![],
        stack_outputs: vec![],
        deadens: true,
    });
    add(OpSignature {
        op_code: "return",
        immediates: vec![],
        stack_inputs: vec![u64_slot()],
        stack_outputs: vec![],
        deadens: true,
    });
    add(OpSignature {
        op_code: "assert",
        immediates: vec![],
        stack_inputs: vec![u64_slot()],
        stack_outputs: vec![],
        deadens: false,
    });

    t
}

/// Process-wide op table. Initialized once on first lookup, read-only
/// thereafter.
pub struct OpTable;

static TABLE: OnceLock<HashMap<&'static str, OpSignature>> = OnceLock::new();

impl OpTable {
    fn table() -> &'static HashMap<&'static str, OpSignature> {
        TABLE.get_or_init(build_table)
    }

    pub fn lookup(op_code: &str) -> Result<&'static OpSignature, IrError> {
        Self::table().get(op_code).ok_or_else(|| IrError::UnknownOp {
            op_code: op_code.to_string(),
            loc: SourceLocation::unknown(),
        })
    }

    pub fn contains(op_code: &str) -> bool {
        Self::table().contains_key(op_code)
    }
}
