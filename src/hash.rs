use serde::{Deserialize, Serialize};
use std::fmt;
use tiny_keccak::{Hasher, Sha3};

pub const HASH32_SIZE: usize = 32;

/// A SHA3-256 digest. Seeds the proposer permutation and the hash coin.
#[derive(Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Hash32([u8; HASH32_SIZE]);

impl Hash32 {
    pub fn calculate(data: &[u8]) -> Self {
        let mut sha3 = Sha3::v256();
        let mut digest = [0; HASH32_SIZE];
        sha3.update(data);
        sha3.finalize(&mut digest);
        Self(digest)
    }

    pub fn as_fixed_bytes(&self) -> &[u8; HASH32_SIZE] {
        &self.0
    }

    /// The lowest bit of the first byte.
    pub fn low_bit(&self) -> bool {
        self.0[0] & 1 == 1
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", hex::encode(&self.0[..6]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_256() {
        let digest = Hash32::calculate(b"abcd");
        assert_eq!(
            digest.to_string(),
            "6f6f129471590d2c91804c812b5750cd44cbdfb7238541c451e1ea2bc0193177"
        );
        assert!(digest.low_bit());
        assert_eq!(format!("{digest:?}"), "Hash32(6f6f12947159)");
    }

    #[test]
    fn test_low_bit_follows_first_byte() {
        let digest = Hash32::calculate(b"");
        assert_eq!(digest.low_bit(), digest.as_fixed_bytes()[0] % 2 == 1);
    }
}
