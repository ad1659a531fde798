//! A minimal arbitrary-precision unsigned integer.
//!
//! The op table's `bigint` primitive and the bytes-math intrinsics (`b+`,
//! `b-`, `b*`, `b/`, `b%`, and the byte-string comparisons) are specified
//! over exact unbounded-integer arithmetic on big-endian byte strings up to
//! 512 bits. This is purpose-built for that: schoolbook arithmetic over a
//! big-endian `Vec<u8>`, with no leading zero bytes in canonical form.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A non-negative arbitrary-precision integer stored as big-endian bytes
/// with no leading zero byte (the zero value is the empty vector).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BigUint(Vec<u8>);

impl BigUint {
    pub fn zero() -> Self {
        BigUint(Vec::new())
    }

    pub fn from_u64(v: u64) -> Self {
        BigUint::from_bytes_be(&v.to_be_bytes())
    }

    /// Builds from big-endian bytes, stripping leading zero bytes.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        let first_nonzero = bytes.iter().position(|&b| b != 0);
        match first_nonzero {
            Some(idx) => BigUint(bytes[idx..].to_vec()),
            None => BigUint::zero(),
        }
    }

    /// Big-endian bytes, left-padded with zeros to `len`. Returns `None` if
    /// the value does not fit in `len` bytes.
    pub fn to_bytes_be(&self, len: usize) -> Option<Vec<u8>> {
        if self.0.len() > len {
            return None;
        }
        let mut out = vec![0u8; len - self.0.len()];
        out.extend_from_slice(&self.0);
        Some(out)
    }

    /// Minimal-length big-endian bytes (no padding).
    pub fn to_bytes_be_minimal(&self) -> Vec<u8> {
        if self.0.is_empty() {
            vec![0]
        } else {
            self.0.clone()
        }
    }

    pub fn bit_len(&self) -> u32 {
        match self.0.first() {
            None => 0,
            Some(&b) => (self.0.len() as u32 - 1) * 8 + (8 - b.leading_zeros()),
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        if self.0.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[8 - self.0.len()..].copy_from_slice(&self.0);
        Some(u64::from_be_bytes(buf))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn add(&self, other: &BigUint) -> BigUint {
        let mut result = Vec::with_capacity(self.0.len().max(other.0.len()) + 1);
        let mut carry = 0u16;
        let a = self.0.iter().rev();
        let b = other.0.iter().rev();
        let mut a = a.copied().chain(std::iter::repeat(0));
        let mut b = b.copied().chain(std::iter::repeat(0));
        for _ in 0..self.0.len().max(other.0.len()) {
            let sum = a.next().unwrap() as u16 + b.next().unwrap() as u16 + carry;
            result.push((sum & 0xFF) as u8);
            carry = sum >> 8;
        }
        if carry > 0 {
            result.push(carry as u8);
        }
        result.reverse();
        BigUint::from_bytes_be(&result)
    }

    /// Returns `None` on underflow (this < other), matching the fold
    /// rejection rule for negative subtraction results.
    pub fn checked_sub(&self, other: &BigUint) -> Option<BigUint> {
        if self.cmp(other) == Ordering::Less {
            return None;
        }
        let len = self.0.len();
        let mut result = vec![0u8; len];
        let mut borrow = 0i16;
        for i in 0..len {
            let a = self.0[len - 1 - i] as i16;
            let b = *other.0.iter().rev().nth(i).unwrap_or(&0) as i16;
            let mut diff = a - b - borrow;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            result[len - 1 - i] = diff as u8;
        }
        Some(BigUint::from_bytes_be(&result))
    }

    pub fn mul(&self, other: &BigUint) -> BigUint {
        if self.is_zero() || other.is_zero() {
            return BigUint::zero();
        }
        let mut acc = vec![0u32; self.0.len() + other.0.len()];
        for (i, &a) in self.0.iter().rev().enumerate() {
            for (j, &b) in other.0.iter().rev().enumerate() {
                acc[i + j] += a as u32 * b as u32;
            }
        }
        let mut carry = 0u32;
        for slot in acc.iter_mut() {
            let total = *slot + carry;
            *slot = total & 0xFF;
            carry = total >> 8;
        }
        while carry > 0 {
            acc.push(carry & 0xFF);
            carry >>= 8;
        }
        let bytes: Vec<u8> = acc.iter().rev().map(|&b| b as u8).collect();
        BigUint::from_bytes_be(&bytes)
    }

    /// Returns `None` when dividing by zero.
    pub fn div_rem(&self, divisor: &BigUint) -> Option<(BigUint, BigUint)> {
        if divisor.is_zero() {
            return None;
        }
        if self.cmp(divisor) == Ordering::Less {
            return Some((BigUint::zero(), self.clone()));
        }
        let mut remainder = BigUint::zero();
        let mut quotient_bits = vec![0u8; self.bit_len() as usize];
        for i in (0..self.bit_len()).rev() {
            remainder = remainder.shl(1);
            if self.bit(i) {
                remainder = remainder.add(&BigUint::from_u64(1));
            }
            if remainder.cmp(divisor) != Ordering::Less {
                remainder = remainder.checked_sub(divisor).expect("remainder >= divisor");
                quotient_bits[(self.bit_len() - 1 - i) as usize] = 1;
            }
        }
        let mut quotient = BigUint::zero();
        for (i, &bit) in quotient_bits.iter().enumerate() {
            if bit == 1 {
                let shift = quotient_bits.len() - 1 - i;
                quotient = quotient.add(&BigUint::from_u64(1).shl(shift as u32));
            }
        }
        Some((quotient, remainder))
    }

    fn bit(&self, i: u32) -> bool {
        if i >= self.bit_len() {
            return false;
        }
        let byte_from_end = (i / 8) as usize;
        let bit_in_byte = i % 8;
        let idx = self.0.len() - 1 - byte_from_end;
        (self.0[idx] >> bit_in_byte) & 1 == 1
    }

    pub fn shl(&self, bits: u32) -> BigUint {
        if self.is_zero() || bits == 0 {
            return self.clone();
        }
        let new_bit_len = self.bit_len() + bits;
        let new_bytes = ((new_bit_len + 7) / 8) as usize;
        let byte_shift = (bits / 8) as usize;
        let bit_shift = bits % 8;
        let mut out = vec![0u8; new_bytes];
        let src = &self.0;
        for i in 0..src.len() {
            let dst_idx = out.len() - 1 - byte_shift - (src.len() - 1 - i);
            out[dst_idx] |= src[i] << bit_shift;
            if bit_shift > 0 && dst_idx > 0 {
                out[dst_idx - 1] |= src[i] >> (8 - bit_shift);
            }
        }
        BigUint::from_bytes_be(&out)
    }

    pub fn shr(&self, bits: u32) -> BigUint {
        if bits >= self.bit_len() {
            return BigUint::zero();
        }
        let keep_bits = self.bit_len() - bits;
        let mut bytes = vec![0u8; ((keep_bits + 7) / 8) as usize];
        for i in 0..keep_bits {
            if self.bit(i + bits) {
                let byte_from_end = (i / 8) as usize;
                let idx = bytes.len() - 1 - byte_from_end;
                bytes[idx] |= 1 << (i % 8);
            }
        }
        BigUint::from_bytes_be(&bytes)
    }

    /// Bitwise op over zero-extended equal-length byte strings, matching
    /// the AVM bytes bitwise intrinsics (result length = max of inputs).
    fn bitwise(&self, other: &BigUint, f: impl Fn(u8, u8) -> u8) -> BigUint {
        let len = self.0.len().max(other.0.len());
        let a = self.to_bytes_be(len).expect("len is max of both");
        let b = other.to_bytes_be(len).expect("len is max of both");
        let out: Vec<u8> = a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect();
        BigUint::from_bytes_be(&out)
    }

    pub fn bitand(&self, other: &BigUint) -> BigUint {
        self.bitwise(other, |a, b| a & b)
    }

    pub fn bitor(&self, other: &BigUint) -> BigUint {
        self.bitwise(other, |a, b| a | b)
    }

    pub fn bitxor(&self, other: &BigUint) -> BigUint {
        self.bitwise(other, |a, b| a ^ b)
    }

    pub fn cmp(&self, other: &BigUint) -> Ordering {
        self.bit_len()
            .cmp(&other.bit_len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for BigUint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigUint {
    fn cmp(&self, other: &Self) -> Ordering {
        BigUint::cmp(self, other)
    }
}
