//! Values: registers and constants.
//!
//! A `Value` is either a [`Register`] (an SSA name) or a [`Constant`]. Every
//! value carries an [`AType`], one of the VM's two primitive stack types.

use crate::bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two primitive stack types of the target VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AType {
    U64,
    Bytes,
}

impl fmt::Display for AType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AType::U64 => write!(f, "u64"),
            AType::Bytes => write!(f, "bytes"),
        }
    }
}

/// How a byte-string constant's source literal was written; carried through
/// folds so a merged constant can pick a sensible encoding to print back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    Unknown,
    Base16,
    Base32,
    Base64,
    Utf8,
}

/// An SSA register. The SSA name is `local_id#version`; two registers are
/// equal iff all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    pub local_id: String,
    pub version: u32,
    pub atype: AType,
}

impl Register {
    pub fn new(local_id: impl Into<String>, version: u32, atype: AType) -> Self {
        Register {
            local_id: local_id.into(),
            version,
            atype,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.local_id, self.version)
    }
}

/// A constant value. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    U64Const(u64),
    BigUIntConst(BigUint),
    BytesConst(Vec<u8>, Encoding),
    AddressConst(String),
    MethodConst(String),
    TemplateVar(String, AType),
    CompiledReference {
        artifact: String,
        field: String,
        template_vars: Vec<(String, String)>,
    },
}

impl Constant {
    pub fn atype(&self) -> AType {
        match self {
            Constant::U64Const(_) => AType::U64,
            Constant::BigUIntConst(_) => AType::Bytes,
            Constant::BytesConst(..) => AType::Bytes,
            Constant::AddressConst(_) => AType::Bytes,
            Constant::MethodConst(_) => AType::Bytes,
            Constant::TemplateVar(_, t) => *t,
            Constant::CompiledReference { .. } => AType::Bytes,
        }
    }
}

/// A value flowing through the IR: a register (SSA name) or a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Register(Register),
    Constant(Constant),
}

impl Value {
    pub fn atype(&self) -> AType {
        match self {
            Value::Register(r) => r.atype,
            Value::Constant(c) => c.atype(),
        }
    }

    pub fn as_register(&self) -> Option<&Register> {
        match self {
            Value::Register(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn u64_const(v: u64) -> Value {
        Value::Constant(Constant::U64Const(v))
    }

    pub fn bytes_const(bytes: Vec<u8>, encoding: Encoding) -> Value {
        Value::Constant(Constant::BytesConst(bytes, encoding))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Register(r) => write!(f, "{}", r),
            Value::Constant(Constant::U64Const(v)) => write!(f, "{}", v),
            Value::Constant(Constant::BytesConst(b, _)) => write!(f, "0x{}", hex_encode(b)),
            Value::Constant(Constant::BigUIntConst(b)) => write!(f, "{:?}", b),
            Value::Constant(Constant::AddressConst(a)) => write!(f, "{}", a),
            Value::Constant(Constant::MethodConst(m)) => write!(f, "method({})", m),
            Value::Constant(Constant::TemplateVar(n, _)) => write!(f, "TMPL_{}", n),
            Value::Constant(Constant::CompiledReference { artifact, field, .. }) => {
                write!(f, "compiled({}.{})", artifact, field)
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
