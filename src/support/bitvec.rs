use super::error::{Error, Result};
use std::fmt;

/// Fixed-length vector of bits, one per cluster member.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BitVec(Vec<bool>);

impl BitVec {
    pub fn zeros(len: usize) -> Self {
        Self(vec![false; len])
    }

    /// Parses a string of '0' and '1' characters. Surrounding whitespace is
    /// ignored, anything else that is not exactly `len` bits is rejected.
    pub fn decode(bits: &str, len: usize) -> Result<Self> {
        let invalid = || Error::InvalidBitVector {
            bits: bits.to_string(),
            expected: len,
        };

        let trimmed = bits.trim();
        if trimmed.len() != len {
            return Err(invalid());
        }
        trimmed
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn encode(&self) -> String {
        self.0.iter().map(|b| if *b { '1' } else { '0' }).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    pub fn set(&mut self, index: usize) {
        if let Some(bit) = self.0.get_mut(index) {
            *bit = true;
        }
    }

    /// Bitwise OR with `other`. Both vectors must have the same length.
    pub fn or_assign(&mut self, other: &BitVec) {
        debug_assert_eq!(self.len(), other.len());
        for (bit, o) in self.0.iter_mut().zip(other.0.iter()) {
            *bit |= o;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|b| **b).count()
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BitVec({})", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_decode() {
        let bits = BitVec::decode(" 1011\n", 4).unwrap();
        assert_eq!(bits.get(0), Some(true));
        assert_eq!(bits.get(1), Some(false));
        assert_eq!(bits.get(4), None);
        assert_eq!(bits.count_ones(), 3);
        assert_eq!(bits.to_string(), "1011");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(BitVec::decode("101", 4).is_err());
        assert!(BitVec::decode("10111", 4).is_err());
        assert_eq!(
            BitVec::decode("10x1", 4),
            Err(Error::InvalidBitVector {
                bits: "10x1".to_string(),
                expected: 4
            })
        );
    }

    #[test]
    fn test_or_assign() {
        let mut bits = BitVec::zeros(4);
        bits.set(3);
        bits.or_assign(&BitVec::decode("1100", 4).unwrap());
        assert_eq!(bits.encode(), "1101");
    }

    #[quickcheck]
    fn prop_bitvec_round_trip(bits: Vec<bool>) -> bool {
        let vector = BitVec(bits.clone());
        let encoded = vector.encode();
        encoded.len() == bits.len()
            && BitVec::decode(&encoded, bits.len()) == Ok(vector)
    }

    #[quickcheck]
    fn prop_malformed_bitvec_is_rejected(bits: Vec<bool>, extra: bool, junk: char) -> bool {
        let encoded = BitVec(bits.clone()).encode();

        // one bit too many or too few
        let wrong_length = if extra || bits.is_empty() {
            BitVec::decode(&format!("{encoded}1"), bits.len()).is_err()
        } else {
            BitVec::decode(&encoded[1..], bits.len()).is_err()
        };

        // a character other than '0' and '1' in place of the first bit
        let bad_char = if bits.is_empty() || junk == '0' || junk == '1' || junk.is_whitespace() {
            true
        } else {
            let mut tampered = junk.to_string();
            tampered.push_str(&encoded[1..]);
            BitVec::decode(&tampered, bits.len()).is_err()
        };

        wrong_length && bad_char
    }
}
