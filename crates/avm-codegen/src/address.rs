//! Algorand-style address decoding: RFC 4648 base32 (no padding) over a
//! 32-byte public key plus a 4-byte truncated SHA-512/256 checksum. No
//! base32 crate appears anywhere in the retrieval pack, so this is a small
//! hand-rolled decoder rather than a fabricated dependency.

use sha2::{Digest, Sha512_256};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn decode_base32(s: &str) -> Option<Vec<u8>> {
    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut out = Vec::new();
    for c in s.chars() {
        let c = c.to_ascii_uppercase();
        let value = ALPHABET.iter().position(|&a| a as char == c)? as u64;
        bits = (bits << 5) | value;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            out.push(((bits >> bit_count) & 0xFF) as u8);
        }
    }
    Some(out)
}

/// Decodes a 58-character base32 Algorand address into its 32-byte public
/// key, verifying the trailing 4-byte checksum. Returns `None` on malformed
/// input or checksum mismatch.
pub fn decode_address(addr: &str) -> Option<Vec<u8>> {
    if addr.len() != 58 {
        return None;
    }
    let raw = decode_base32(addr)?;
    if raw.len() < 36 {
        return None;
    }
    let pubkey = &raw[..32];
    let checksum = &raw[32..36];
    let mut hasher = Sha512_256::new();
    hasher.update(pubkey);
    let digest = hasher.finalize();
    if &digest[28..32] != checksum {
        return None;
    }
    Some(pubkey.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(decode_address("short").is_none());
    }

    #[test]
    fn rejects_bad_checksum() {
        let fake = "A".repeat(58);
        assert!(decode_address(&fake).is_none());
    }

    #[test]
    fn round_trip_accepts_self_computed_address() {
        let pubkey = [7u8; 32];
        let mut hasher = Sha512_256::new();
        hasher.update(pubkey);
        let digest = hasher.finalize();
        let mut raw = pubkey.to_vec();
        raw.extend_from_slice(&digest[28..32]);
        let encoded = encode_base32_for_test(&raw);
        assert_eq!(decode_address(&encoded).unwrap(), pubkey.to_vec());
    }

    fn encode_base32_for_test(bytes: &[u8]) -> String {
        let mut bits: u64 = 0;
        let mut bit_count = 0u32;
        let mut out = String::new();
        for &b in bytes {
            bits = (bits << 8) | b as u64;
            bit_count += 8;
            while bit_count >= 5 {
                bit_count -= 5;
                let idx = ((bits >> bit_count) & 0x1F) as usize;
                out.push(ALPHABET[idx] as char);
            }
        }
        if bit_count > 0 {
            let idx = ((bits << (5 - bit_count)) & 0x1F) as usize;
            out.push(ALPHABET[idx] as char);
        }
        out
    }
}
