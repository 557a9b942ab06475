//! ssdeep context-triggered piecewise hashes via the `fuzzyhash` crate.
//!
//! The native score is a similarity in `0..=100`, 100 meaning identical.

use fuzzyhash::FuzzyHash;

use crate::config::FingerprintError;
use crate::external::{FuzzyHasher, ScoreMetric};

/// Highest ssdeep match score.
pub const SSDEEP_MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ssdeep;

impl FuzzyHasher for Ssdeep {
    fn name(&self) -> &str {
        "ssdeep"
    }

    fn hash(&self, payload: &[u8]) -> Result<String, FingerprintError> {
        Ok(FuzzyHash::new(payload).to_string())
    }

    fn compare(&self, left: &str, right: &str) -> Result<f64, FingerprintError> {
        FuzzyHash::compare(left, right)
            .map(f64::from)
            .map_err(|e| FingerprintError::Decode(format!("ssdeep compare: {e:?}")))
    }

    fn metric(&self) -> ScoreMetric {
        ScoreMetric::Similarity {
            max: SSDEEP_MAX_SCORE,
        }
    }
}
