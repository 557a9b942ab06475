//! TLSH digests via the `tlsh2` crate.
//!
//! Uses the default 128-bucket, 1-byte-checksum variant. Digests are stored as
//! their hex text and compared with TLSH's diff score including the length
//! component, which is a distance.

use tlsh2::{TlshDefault, TlshDefaultBuilder};

use crate::config::FingerprintError;
use crate::external::{FuzzyHasher, ScoreMetric};

/// TLSH needs at least this many bytes to produce a digest.
pub const TLSH_MIN_INPUT: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct Tlsh;

fn parse(digest: &str) -> Result<TlshDefault, FingerprintError> {
    digest.parse::<TlshDefault>()
        .map_err(|_| FingerprintError::Decode(format!("invalid tlsh digest '{digest}'")))
}

impl FuzzyHasher for Tlsh {
    fn name(&self) -> &str {
        "tlsh"
    }

    fn hash(&self, payload: &[u8]) -> Result<String, FingerprintError> {
        let mut builder = TlshDefaultBuilder::new();
        builder.update(payload);
        let tlsh = builder
            .build()
            .ok_or_else(|| FingerprintError::BackendComputationFailure {
                backend: "tlsh".into(),
                reason: "not enough variation in input".into(),
            })?;
        Ok(String::from_utf8_lossy(&tlsh.hash()).into_owned())
    }

    fn compare(&self, left: &str, right: &str) -> Result<f64, FingerprintError> {
        let left = parse(left)?;
        let right = parse(right)?;
        Ok(left.diff(&right, true) as f64)
    }

    fn metric(&self) -> ScoreMetric {
        ScoreMetric::Distance
    }

    fn min_input_len(&self) -> usize {
        TLSH_MIN_INPUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seed: u64, len: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 56) as u8
            })
            .collect()
    }

    #[test]
    fn digest_is_stable_and_self_distance_is_zero() {
        let payload = sample(1, 2048);
        let a = Tlsh.hash(&payload).unwrap();
        assert_eq!(a, Tlsh.hash(&payload).unwrap());
        assert!(!a.is_empty());
        assert_eq!(Tlsh.compare(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn small_edits_stay_closer_than_unrelated_content() {
        let base = sample(2, 4096);
        let mut edited = base.clone();
        for byte in edited.iter_mut().step_by(128) {
            *byte = !*byte;
        }
        let other = sample(3, 4096);

        let b = Tlsh.hash(&base).unwrap();
        let e = Tlsh.hash(&edited).unwrap();
        let o = Tlsh.hash(&other).unwrap();
        assert!(Tlsh.compare(&b, &e).unwrap() < Tlsh.compare(&b, &o).unwrap());
        assert_eq!(Tlsh.compare(&b, &o).unwrap(), Tlsh.compare(&o, &b).unwrap());
    }

    #[test]
    fn garbage_digest_is_a_decode_error() {
        assert!(matches!(
            Tlsh.compare("not a digest", "T1"),
            Err(FingerprintError::Decode(_))
        ));
    }
}
