//! The constant-fold registry: looks up a register's defining op and
//! extracts constant values from it, chasing a small set of
//! constant-producing intrinsics (`itob`, `bzero`) beyond direct constants.

use avm_ir::{AType, Assignment, BigUint, Constant, Encoding, OpSource, Register, Subroutine, Value};

/// Finds the sole assignment defining `reg` in `sub`, or `None` if `reg` is
/// a parameter or defined by a phi (phis never carry a constant value).
pub fn get_definition<'a>(sub: &'a Subroutine, reg: &Register) -> Option<&'a Assignment> {
    sub.body
        .iter()
        .flat_map(|b| b.ops.iter())
        .find(|a| a.targets.contains(reg))
}

/// Matches a `U64Const`.
pub fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Constant(Constant::U64Const(n)) => Some(*n),
        _ => None,
    }
}

/// Matches a `BigUIntConst`, a `BytesConst` of length <= 64 (interpreted
/// big-endian unsigned), or a `U64Const`.
pub fn as_biguint(sub: &Subroutine, v: &Value) -> Option<BigUint> {
    match v {
        Value::Constant(Constant::BigUIntConst(b)) => Some(b.clone()),
        Value::Constant(Constant::U64Const(n)) => Some(BigUint::from_u64(*n)),
        Value::Constant(Constant::BytesConst(b, _)) if b.len() <= 64 => {
            Some(BigUint::from_bytes_be(b))
        }
        Value::Register(r) => {
            let (bytes, _) = as_bytes(sub, &Value::Register(r.clone()))?;
            if bytes.len() <= 64 {
                Some(BigUint::from_bytes_be(&bytes))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Direct `BytesConst` match; also folds `itob(const u64)` to its 8-byte
/// big-endian encoding and `bzero(const u64 <= 64)` to a zero-filled byte
/// string of that length.
pub fn as_bytes(sub: &Subroutine, v: &Value) -> Option<(Vec<u8>, Encoding)> {
    match v {
        Value::Constant(Constant::BytesConst(b, enc)) => Some((b.clone(), *enc)),
        Value::Register(r) => {
            let def = get_definition(sub, r)?;
            match &def.source {
                OpSource::Intrinsic(i) if i.op_code == "itob" => {
                    let n = as_u64(&i.args[0])?;
                    Some((n.to_be_bytes().to_vec(), Encoding::Unknown))
                }
                OpSource::Intrinsic(i) if i.op_code == "bzero" => {
                    let n = as_u64(&i.args[0])?;
                    if n <= 64 {
                        Some((vec![0u8; n as usize], Encoding::Unknown))
                    } else {
                        None
                    }
                }
                OpSource::Value(v) => as_bytes(sub, v),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Picks the encoding for a merged bytes constant: shared encoding if both
/// operands agree, `base64` otherwise.
pub fn merge_encoding(a: Encoding, b: Encoding) -> Encoding {
    if a == b {
        a
    } else {
        Encoding::Base64
    }
}

/// Two registers denote the same SSA value iff they are literally equal
/// (same local_id, version, atype) or alias the same definition through a
/// chain of trivial value-copies.
pub fn same_value(sub: &Subroutine, a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    let resolve = |v: &Value| -> Value {
        let mut cur = v.clone();
        loop {
            match &cur {
                Value::Register(r) => match get_definition(sub, r) {
                    Some(Assignment {
                        source: OpSource::Value(inner),
                        ..
                    }) => cur = inner.clone(),
                    _ => break,
                },
                _ => break,
            }
        }
        cur
    };
    resolve(a) == resolve(b)
}

pub fn atype_of(v: &Value) -> AType {
    v.atype()
}
