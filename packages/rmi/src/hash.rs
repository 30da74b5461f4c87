//! Keccak256 helper for interface signature digests

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 over the input and return the digest bytes.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(input);
    hasher.finalize(&mut output);
    output
}

/// Compute keccak256 over the input and return the lowercase hex digest.
pub fn keccak_hex(input: &[u8]) -> String {
    hex::encode(keccak256(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_deterministic() {
        assert_eq!(keccak256(b"vaultpair"), keccak256(b"vaultpair"));
        assert_ne!(keccak256(b"vaultpair"), keccak256(b"vaultpair2"));
    }

    #[test]
    fn test_keccak_hex_shape() {
        let digest = keccak_hex(b"abc");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
