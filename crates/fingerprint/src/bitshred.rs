//! Bitshred: a presence sketch of hashed byte n-grams.
//!
//! Every `n`-byte window of the payload is hashed and the bit at
//! `hash % m` is set. Bits are never cleared, so the vector behaves like a
//! single-hash Bloom filter over the payload's n-grams. Two sketches are
//! compared with the Jaccard distance of their set bits.

use serde::{Deserialize, Serialize};

use crate::config::{BitshredConfig, FingerprintError};

/// Fixed-length bit vector packed most-significant-bit first.
///
/// Deserialization goes through [`BitVector::from_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PackedBits", into = "PackedBits")]
pub struct BitVector {
    len: usize,
    bytes: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct PackedBits {
    len: usize,
    bytes: Vec<u8>,
}

impl TryFrom<PackedBits> for BitVector {
    type Error = FingerprintError;

    fn try_from(packed: PackedBits) -> Result<Self, Self::Error> {
        BitVector::from_bytes(packed.len, &packed.bytes)
    }
}

impl From<BitVector> for PackedBits {
    fn from(bits: BitVector) -> Self {
        PackedBits {
            len: bits.len,
            bytes: bits.bytes,
        }
    }
}

impl BitVector {
    /// All-zero vector of `len` bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            bytes: vec![0; len.div_ceil(8)],
        }
    }

    /// Rebuild a vector from its packed representation.
    ///
    /// `bytes` must be exactly `ceil(len / 8)` long and the padding bits of the
    /// last byte must be zero.
    pub fn from_bytes(len: usize, bytes: &[u8]) -> Result<Self, FingerprintError> {
        let expected = len.div_ceil(8);
        if bytes.len() != expected {
            return Err(FingerprintError::Decode(format!(
                "bit vector of {len} bits needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        let padding = expected * 8 - len;
        if padding > 0 && bytes[expected - 1] & ((1u8 << padding) - 1) != 0 {
            return Err(FingerprintError::Decode(
                "bit vector padding bits are set".into(),
            ));
        }
        Ok(Self {
            len,
            bytes: bytes.to_vec(),
        })
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed bytes, bit `i` in byte `i / 8` under mask `0x80 >> (i % 8)`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.len);
        self.bytes[bit / 8] |= 0x80 >> (bit % 8);
    }

    #[inline]
    pub fn get(&self, bit: usize) -> bool {
        bit < self.len && self.bytes[bit / 8] & (0x80 >> (bit % 8)) != 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Fraction of bits that are set.
    pub fn density(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            f64::from(self.count_ones()) / self.len as f64
        }
    }

    /// Indices of the set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&bit| self.get(bit))
    }

    /// Jaccard distance `1 - |A ∩ B| / |A ∪ B|`.
    ///
    /// Two empty sets are identical, so a zero union yields `0.0`.
    pub fn jaccard_distance(&self, other: &BitVector) -> Result<f64, FingerprintError> {
        if self.len != other.len {
            return Err(FingerprintError::FingerprintMismatch(format!(
                "bit vectors of {} and {} bits",
                self.len, other.len
            )));
        }
        let (intersection, union) = self
            .bytes
            .iter()
            .zip(&other.bytes)
            .fold((0u64, 0u64), |(inter, uni), (&a, &b)| {
                (
                    inter + u64::from((a & b).count_ones()),
                    uni + u64::from((a | b).count_ones()),
                )
            });
        if union == 0 {
            return Ok(0.0);
        }
        Ok(1.0 - intersection as f64 / union as f64)
    }
}

/// Compute the Bitshred sketch of `payload`.
///
/// The window slides over every offset `0..=len - n`, so a payload of exactly
/// `n` bytes yields one window.
pub fn bitshred(payload: &[u8], cfg: &BitshredConfig) -> Result<BitVector, FingerprintError> {
    cfg.validate()?;
    let n = cfg.n as usize;
    if payload.len() < n {
        return Err(FingerprintError::InputTooShort {
            required: n,
            actual: payload.len(),
        });
    }

    let m = cfg.m as usize;
    let mut bits = BitVector::zeros(m);
    for window in payload.windows(n) {
        let bucket = cfg.hash.hash(window) as usize % m;
        bits.set(bucket);
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{jenkins_one_at_a_time, HashFunction};

    fn cfg(m: u32, n: u32) -> BitshredConfig {
        BitshredConfig::new().with_m(m).with_n(n)
    }

    #[test]
    fn repeated_ngram_sets_single_bit() {
        let bits = bitshred(b"AAAA", &cfg(16, 2)).unwrap();
        assert_eq!(bits.count_ones(), 1);
        let expected = jenkins_one_at_a_time(b"AA") as usize % 16;
        assert_eq!(bits.ones().collect::<Vec<_>>(), vec![expected]);
    }

    #[test]
    fn payload_of_exactly_n_bytes_has_one_window() {
        let bits = bitshred(b"xyz", &cfg(64, 3)).unwrap();
        assert_eq!(bits.count_ones(), 1);
        assert!(bits.get(jenkins_one_at_a_time(b"xyz") as usize % 64));
    }

    #[test]
    fn last_window_is_included() {
        // "ab", "bc" for n = 2; the final window must not be dropped.
        let bits = bitshred(b"abc", &cfg(1 << 16, 2).with_hash(HashFunction::Djb2)).unwrap();
        let last = crate::hash::djb2(b"bc") as usize % (1 << 16);
        assert!(bits.get(last));
    }

    #[test]
    fn short_payload_is_rejected() {
        let err = bitshred(b"abc", &cfg(64, 4)).unwrap_err();
        assert_eq!(
            err,
            FingerprintError::InputTooShort {
                required: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn invalid_config_is_rejected_before_hashing() {
        assert!(matches!(
            bitshred(b"abcdef", &cfg(0, 2)),
            Err(FingerprintError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bitshred_is_deterministic() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        for hash in HashFunction::ALL {
            let c = cfg(1024, 4).with_hash(hash);
            assert_eq!(bitshred(&payload, &c).unwrap(), bitshred(&payload, &c).unwrap());
        }
    }

    #[test]
    fn disjoint_vectors_have_distance_one() {
        let mut a = BitVector::zeros(16);
        let mut b = BitVector::zeros(16);
        a.set(1);
        a.set(3);
        b.set(2);
        b.set(15);
        assert_eq!(a.jaccard_distance(&b).unwrap(), 1.0);
    }

    #[test]
    fn identical_vectors_have_distance_zero() {
        let mut a = BitVector::zeros(16);
        a.set(0);
        a.set(9);
        assert_eq!(a.jaccard_distance(&a.clone()).unwrap(), 0.0);
    }

    #[test]
    fn empty_vectors_have_distance_zero() {
        let a = BitVector::zeros(32);
        assert_eq!(a.jaccard_distance(&BitVector::zeros(32)).unwrap(), 0.0);
    }

    #[test]
    fn jaccard_distance_partial_overlap_is_symmetric() {
        let mut a = BitVector::zeros(24);
        let mut b = BitVector::zeros(24);
        for bit in [0, 1, 2, 3] {
            a.set(bit);
        }
        for bit in [2, 3, 4, 5, 6, 7] {
            b.set(bit);
        }
        // |A ∩ B| = 2, |A ∪ B| = 8
        let ab = a.jaccard_distance(&b).unwrap();
        assert!((ab - 0.75).abs() < 1e-12);
        assert_eq!(ab, b.jaccard_distance(&a).unwrap());
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let err = BitVector::zeros(8)
            .jaccard_distance(&BitVector::zeros(16))
            .unwrap_err();
        assert!(matches!(err, FingerprintError::FingerprintMismatch(_)));
    }

    #[test]
    fn packing_is_msb_first() {
        let mut bits = BitVector::zeros(10);
        bits.set(0);
        bits.set(9);
        assert_eq!(bits.as_bytes(), &[0b1000_0000, 0b0100_0000]);
        assert_eq!(BitVector::from_bytes(10, bits.as_bytes()).unwrap(), bits);
    }

    #[test]
    fn from_bytes_checks_width_and_padding() {
        assert!(matches!(
            BitVector::from_bytes(16, &[0]),
            Err(FingerprintError::Decode(_))
        ));
        assert!(matches!(
            BitVector::from_bytes(10, &[0, 0b0000_0001]),
            Err(FingerprintError::Decode(_))
        ));
    }

    #[test]
    fn density_reports_fill_ratio() {
        let mut bits = BitVector::zeros(8);
        bits.set(2);
        bits.set(5);
        assert_eq!(bits.count_ones(), 2);
        assert!((bits.density() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialization_checks_the_packed_width() {
        let err = serde_json::from_str::<BitVector>(r#"{"len":64,"bytes":[]}"#).unwrap_err();
        assert!(err.to_string().contains("needs 8 bytes"));

        let mut bits = BitVector::zeros(12);
        bits.set(11);
        let json = serde_json::to_string(&bits).unwrap();
        assert_eq!(serde_json::from_str::<BitVector>(&json).unwrap(), bits);
    }
}
