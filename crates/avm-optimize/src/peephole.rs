//! Peephole rules: per-op algebraic identities and constant folds, applied
//! exhaustively to every intrinsic-producing assignment in a subroutine.
//!
//! The optimizer must never replace an op whose runtime behavior would
//! differ from the fold (4.D.5): division/modulo by a statically-zero
//! divisor, out-of-range `extract_uintN`, `exp(0, 0)`, and negative u64
//! subtraction are all left unmodified so the VM raises at runtime, which
//! matches source semantics.

use crate::diagnostics::Diagnostics;
use crate::fold::{as_biguint, as_bytes, as_u64, get_definition, merge_encoding};
use crate::sink::RegisterUsageCounter;
use avm_ir::{AType, Assignment, BigUint, Constant, Encoding, Intrinsic, OpSource, Subroutine, Value};

/// Runs the peephole rules once over every op in `sub`. Returns the
/// rewritten subroutine and whether anything changed.
pub fn peephole_pass(sub: &Subroutine, diagnostics: &mut Diagnostics) -> (Subroutine, bool) {
    let mut out = sub.clone();
    let mut changed = false;
    for block in out.body.iter_mut() {
        for assignment in block.ops.iter_mut() {
            if let OpSource::Intrinsic(intrinsic) = &assignment.source {
                if let Some(rewrite) = try_fold(sub, assignment, intrinsic, diagnostics) {
                    assignment.source = rewrite;
                    changed = true;
                }
            }
        }
    }
    (out, changed)
}

fn try_fold(
    sub: &Subroutine,
    assignment: &Assignment,
    i: &Intrinsic,
    diagnostics: &mut Diagnostics,
) -> Option<OpSource> {
    let _ = assignment;
    match (i.op_code.as_str(), i.args.as_slice()) {
        ("not", [x]) => as_u64(x).map(|v| val_u64(if v == 0 { 1 } else { 0 })),
        ("~", [x]) => as_u64(x).map(|v| val_u64(v ^ u64::MAX)),
        ("b~", [x]) => as_bytes(sub, x).map(|(b, enc)| {
            let flipped: Vec<u8> = b.iter().map(|byte| byte ^ 0xFF).collect();
            val_bytes(flipped, enc)
        }),
        ("btoi", [x]) => as_bytes(sub, x).and_then(|(b, _)| {
            if b.len() > 8 {
                None // runtime failure preserved
            } else {
                let mut buf = [0u8; 8];
                buf[8 - b.len()..].copy_from_slice(&b);
                Some(val_u64(u64::from_be_bytes(buf)))
            }
        }),
        ("len", [x]) => as_bytes(sub, x).map(|(b, _)| val_u64(b.len() as u64)),
        ("getbit", [b, idx]) => {
            let idx = as_u64(idx)?;
            fold_getbit(sub, b, idx)
        }
        ("setbit", [b, idx, bit]) => {
            let idx = as_u64(idx)?;
            let bit = as_u64(bit)?;
            fold_setbit(sub, b, idx, bit)
        }
        ("extract_uint16", [b, off]) => fold_extract_uint(sub, b, as_u64(off)?, 2),
        ("extract_uint32", [b, off]) => fold_extract_uint(sub, b, as_u64(off)?, 4),
        ("extract_uint64", [b, off]) => fold_extract_uint(sub, b, as_u64(off)?, 8),
        ("concat", [a, bb]) => {
            fold_concat_reassoc(sub, a, bb).or_else(|| fold_concat(sub, a, bb))
        }
        ("extract", [b]) => {
            let (start, length) = extract_immediates(i)?;
            let (bytes, enc) = as_bytes(sub, b)?;
            let length = if length == 0 { bytes.len().saturating_sub(start) } else { length };
            if start + length > bytes.len() {
                return None;
            }
            Some(val_bytes(bytes[start..start + length].to_vec(), enc))
        }
        ("substring", [b]) => {
            let (start, end) = extract_immediates(i)?;
            if end < start {
                return None;
            }
            let (bytes, enc) = as_bytes(sub, b)?;
            if end > bytes.len() {
                return None;
            }
            Some(val_bytes(bytes[start..end].to_vec(), enc))
        }
        ("substring3", [b, s, e]) => {
            let (bytes, enc) = as_bytes(sub, b)?;
            let s = as_u64(s)? as usize;
            let e = as_u64(e)? as usize;
            if e < s || e > bytes.len() {
                return None;
            }
            Some(val_bytes(bytes[s..e].to_vec(), enc))
        }
        ("extract3", [b, s, l]) => {
            let (bytes, enc) = as_bytes(sub, b)?;
            let s = as_u64(s)? as usize;
            let l = as_u64(l)? as usize;
            if s + l > bytes.len() {
                return None;
            }
            Some(val_bytes(bytes[s..s + l].to_vec(), enc))
        }
        ("==" | "!=" | "b&" | "b|" | "b^", [a, bb]) => fold_bytes_bitwise_or_eq(sub, &i.op_code, a, bb),
        ("-", [a, bb]) if a == bb => Some(val_u64(0)),
        ("==", [a, bb]) if a == bb => Some(val_u64(1)),
        ("<=", [a, bb]) if a == bb => Some(val_u64(1)),
        (">=", [a, bb]) if a == bb => Some(val_u64(1)),
        ("/", [a, bb]) if a == bb && a.atype() == AType::U64 => Some(val_u64(1)),
        ("^", [a, bb]) if a == bb => Some(val_u64(0)),
        ("&", [a, bb]) if a == bb => Some(OpSource::Value(a.clone())),
        ("|", [a, bb]) if a == bb => Some(OpSource::Value(a.clone())),
        ("==", [a, bb]) if is_zero_u64(a) || is_zero_u64(bb) => {
            let non_zero = if is_zero_u64(a) { bb } else { a };
            Some(OpSource::Intrinsic(Intrinsic::new("not", vec![non_zero.clone()])))
        }
        ("*", [a, bb]) if is_one_u64(a) => Some(OpSource::Value(bb.clone())),
        ("*", [a, bb]) if is_one_u64(bb) => Some(OpSource::Value(a.clone())),
        ("+", [a, bb]) if is_zero_u64(a) => Some(OpSource::Value(bb.clone())),
        ("+", [a, bb]) if is_zero_u64(bb) => Some(OpSource::Value(a.clone())),
        ("-", [a, bb]) if is_zero_u64(bb) => Some(OpSource::Value(a.clone())),
        ("*", [a, bb]) if is_zero_u64(a) || is_zero_u64(bb) => Some(val_u64(0)),
        ("&", [a, bb]) if is_zero_u64(a) || is_zero_u64(bb) => Some(val_u64(0)),
        (op, [a, bb]) if is_generic_u64_op(op) => fold_generic_u64(op, a, bb, diagnostics),
        (op, [a, bb]) if is_generic_bytes_op(op) => fold_generic_bytes(sub, op, a, bb),
        _ => None,
    }
}

fn extract_immediates(i: &Intrinsic) -> Option<(usize, usize)> {
    use avm_ir::Immediate;
    match i.immediates.as_slice() {
        [Immediate::U8(a), Immediate::U8(b)] => Some((*a as usize, *b as usize)),
        _ => None,
    }
}

fn val_u64(v: u64) -> OpSource {
    OpSource::Value(Value::u64_const(v))
}

fn val_bytes(b: Vec<u8>, enc: Encoding) -> OpSource {
    OpSource::Value(Value::bytes_const(b, enc))
}

fn is_zero_u64(v: &Value) -> bool {
    as_u64(v) == Some(0)
}

fn is_one_u64(v: &Value) -> bool {
    as_u64(v) == Some(1)
}

fn fold_getbit(sub: &Subroutine, b: &Value, idx: u64) -> Option<OpSource> {
    if let Some(n) = as_u64(b) {
        if idx >= 64 {
            return None;
        }
        return Some(val_u64((n >> idx) & 1));
    }
    let (bytes, _) = as_bytes(sub, b)?;
    let total_bits = bytes.len() as u64 * 8;
    if idx >= total_bits {
        return None;
    }
    let byte_idx = (idx / 8) as usize;
    let bit_in_byte = 7 - (idx % 8);
    Some(val_u64(((bytes[byte_idx] >> bit_in_byte) & 1) as u64))
}

fn fold_setbit(sub: &Subroutine, b: &Value, idx: u64, bit: u64) -> Option<OpSource> {
    if bit > 1 {
        return None;
    }
    if let Some(n) = as_u64(b) {
        if idx >= 64 {
            return None;
        }
        let mask = 1u64 << idx;
        let out = if bit == 1 { n | mask } else { n & !mask };
        return Some(val_u64(out));
    }
    let (mut bytes, enc) = as_bytes(sub, b)?;
    let total_bits = bytes.len() as u64 * 8;
    if idx >= total_bits {
        return None;
    }
    let byte_idx = (idx / 8) as usize;
    let bit_in_byte = 7 - (idx % 8);
    if bit == 1 {
        bytes[byte_idx] |= 1 << bit_in_byte;
    } else {
        bytes[byte_idx] &= !(1 << bit_in_byte);
    }
    Some(val_bytes(bytes, enc))
}

fn fold_extract_uint(sub: &Subroutine, b: &Value, off: u64, n_bytes: usize) -> Option<OpSource> {
    let (bytes, _) = as_bytes(sub, b)?;
    let off = off as usize;
    if off + n_bytes > bytes.len() {
        return None; // out of range: runtime failure preserved
    }
    let slice = &bytes[off..off + n_bytes];
    let mut buf = [0u8; 8];
    buf[8 - n_bytes..].copy_from_slice(slice);
    Some(val_u64(u64::from_be_bytes(buf)))
}

fn fold_concat(sub: &Subroutine, a: &Value, b: &Value) -> Option<OpSource> {
    if let Some((ab, _)) = as_bytes(sub, a) {
        if ab.is_empty() {
            return Some(OpSource::Value(b.clone()));
        }
    }
    if let Some((bb, _)) = as_bytes(sub, b) {
        if bb.is_empty() {
            return Some(OpSource::Value(a.clone()));
        }
    }
    if let (Some((ab, ae)), Some((bb, be))) = (as_bytes(sub, a), as_bytes(sub, b)) {
        let mut merged = ab;
        merged.extend_from_slice(&bb);
        return Some(val_bytes(merged, merge_encoding(ae, be)));
    }
    None
}

/// `concat(concat(x, a), b)` where `a` and `b` are const and the inner
/// concat's result is used exactly once here -- rewrite to
/// `concat(x, fold(concat(a, b)))`, sinking both constants to the tail.
/// Requires the single-use precondition so the rewrite does not strand the
/// inner concat's result needed elsewhere (the open question in 4.D.2).
fn fold_concat_reassoc(sub: &Subroutine, a: &Value, b: &Value) -> Option<OpSource> {
    let (b_bytes, b_enc) = as_bytes(sub, b)?;
    let reg = a.as_register()?;
    let def = get_definition(sub, reg)?;
    let inner = match &def.source {
        OpSource::Intrinsic(i) if i.op_code == "concat" && i.args.len() == 2 => i,
        _ => return None,
    };
    let (a_bytes, a_enc) = as_bytes(sub, &inner.args[1])?;
    if RegisterUsageCounter::count(sub).uses(reg) != 1 {
        return None;
    }
    let mut merged = a_bytes;
    merged.extend_from_slice(&b_bytes);
    let folded_tail = Value::bytes_const(merged, merge_encoding(a_enc, b_enc));
    Some(OpSource::Intrinsic(Intrinsic::new(
        "concat",
        vec![inner.args[0].clone(), folded_tail],
    )))
}

fn fold_bytes_bitwise_or_eq(sub: &Subroutine, op: &str, a: &Value, b: &Value) -> Option<OpSource> {
    let (ab, ae) = as_bytes(sub, a)?;
    let (bb, be) = as_bytes(sub, b)?;
    match op {
        "==" => Some(val_u64((ab == bb) as u64)),
        "!=" => Some(val_u64((ab != bb) as u64)),
        "b&" => Some(val_bytes(
            BigUint::from_bytes_be(&ab)
                .bitand(&BigUint::from_bytes_be(&bb))
                .to_bytes_be(ab.len().max(bb.len()))?,
            merge_encoding(ae, be),
        )),
        "b|" => Some(val_bytes(
            BigUint::from_bytes_be(&ab)
                .bitor(&BigUint::from_bytes_be(&bb))
                .to_bytes_be(ab.len().max(bb.len()))?,
            merge_encoding(ae, be),
        )),
        "b^" => Some(val_bytes(
            BigUint::from_bytes_be(&ab)
                .bitxor(&BigUint::from_bytes_be(&bb))
                .to_bytes_be(ab.len().max(bb.len()))?,
            merge_encoding(ae, be),
        )),
        _ => None,
    }
}

fn is_generic_u64_op(op: &str) -> bool {
    matches!(
        op,
        "+" | "-" | "*" | "/" | "%" | "<" | "<=" | ">" | ">=" | "==" | "!=" | "&&" | "||" | "<<"
            | ">>" | "**" | "&" | "|" | "^"
    )
}

fn is_generic_bytes_op(op: &str) -> bool {
    matches!(
        op,
        "b+" | "b-" | "b*" | "b/" | "b%" | "b<" | "b<=" | "b>" | "b>=" | "b==" | "b!="
    )
}

fn fold_generic_u64(op: &str, a: &Value, b: &Value, diagnostics: &mut Diagnostics) -> Option<OpSource> {
    let x = as_u64(a)?;
    let y = as_u64(b)?;
    let result: Option<u64> = match op {
        "+" => x.checked_add(y),
        "-" => x.checked_sub(y),
        "*" => x.checked_mul(y),
        "/" => {
            if y == 0 {
                None
            } else {
                Some(x / y)
            }
        }
        "%" => {
            if y == 0 {
                None
            } else {
                Some(x % y)
            }
        }
        "<" => Some((x < y) as u64),
        "<=" => Some((x <= y) as u64),
        ">" => Some((x > y) as u64),
        ">=" => Some((x >= y) as u64),
        "==" => Some((x == y) as u64),
        "!=" => Some((x != y) as u64),
        "&&" => Some(((x != 0) && (y != 0)) as u64),
        "||" => Some(((x != 0) || (y != 0)) as u64),
        "<<" => if y < 64 { x.checked_shl(y as u32) } else { None },
        ">>" => if y < 64 { Some(x >> y) } else { None },
        "**" => {
            if x == 0 && y == 0 {
                // Open question: left unfolded, VM behavior unspecified.
                diagnostics.info("exp(0, 0) left unfolded: runtime behavior unspecified", None);
                None
            } else {
                checked_pow_u64(x, y)
            }
        }
        "&" => Some(x & y),
        "|" => Some(x | y),
        "^" => Some(x ^ y),
        _ => None,
    };
    result.map(val_u64)
}

fn checked_pow_u64(base: u64, exp: u64) -> Option<u64> {
    let mut result: u64 = 1;
    for _ in 0..exp {
        result = result.checked_mul(base)?;
    }
    Some(result)
}

fn fold_generic_bytes(sub: &Subroutine, op: &str, a: &Value, b: &Value) -> Option<OpSource> {
    let (ab, ae) = as_biguint_bytes(sub, a)?;
    let (bb, be) = as_biguint_bytes(sub, b)?;
    let x = BigUint::from_bytes_be(&ab);
    let y = BigUint::from_bytes_be(&bb);
    let max_len = ab.len().max(bb.len());
    match op {
        "b+" => Some(val_bytes(x.add(&y).to_bytes_be(max_len.max(1))?, merge_encoding(ae, be))),
        "b-" => {
            let diff = x.checked_sub(&y)?; // negative result rejected
            Some(val_bytes(diff.to_bytes_be(max_len.max(1))?, merge_encoding(ae, be)))
        }
        "b*" => {
            let product = x.mul(&y);
            let len = ab.len() + bb.len();
            Some(val_bytes(product.to_bytes_be(len.max(1))?, merge_encoding(ae, be)))
        }
        "b/" => {
            let (q, _) = x.div_rem(&y)?;
            Some(val_bytes(q.to_bytes_be(bb.len().max(1))?, merge_encoding(ae, be)))
        }
        "b%" => {
            let (_, r) = x.div_rem(&y)?;
            Some(val_bytes(r.to_bytes_be(bb.len().max(1))?, merge_encoding(ae, be)))
        }
        "b<" => Some(val_u64((x < y) as u64)),
        "b<=" => Some(val_u64((x <= y) as u64)),
        "b>" => Some(val_u64((x > y) as u64)),
        "b>=" => Some(val_u64((x >= y) as u64)),
        "b==" => Some(val_u64((x == y) as u64)),
        "b!=" => Some(val_u64((x != y) as u64)),
        _ => None,
    }
}

fn as_biguint_bytes(sub: &Subroutine, v: &Value) -> Option<(Vec<u8>, Encoding)> {
    if let Some((b, e)) = as_bytes(sub, v) {
        return Some((b, e));
    }
    let n = as_biguint(sub, v)?;
    Some((n.to_bytes_be_minimal(), Encoding::Unknown))
}
