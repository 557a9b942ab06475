//! Adapters for externally supplied fuzzy-hash algorithms.
//!
//! TLSH-style locality-sensitive hashes and ssdeep-style context-triggered
//! piecewise hashes plug in through [`FuzzyHasher`]. The adapter persists the
//! encoded digest and maps the algorithm's native score onto the crate-wide
//! "smaller is closer" convention.
//!
//! Two implementations backed by registry crates ship behind features:
//! [`tlsh::Tlsh`] (feature `tlsh`) and [`ssdeep::Ssdeep`] (feature `ssdeep`).

use std::fmt;
use std::sync::Arc;

use crate::config::FingerprintError;

#[cfg(feature = "ssdeep")]
pub mod ssdeep;
#[cfg(feature = "tlsh")]
pub mod tlsh;

/// How an external algorithm reports the relation between two digests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreMetric {
    /// Smaller is closer, `0` means identical (TLSH `totalDiff`).
    Distance,
    /// Larger is closer, `max` means identical (ssdeep match score).
    Similarity { max: f64 },
}

impl ScoreMetric {
    /// Map a native score onto an ascending distance.
    pub fn normalize(self, score: f64) -> f64 {
        match self {
            ScoreMetric::Distance => score,
            ScoreMetric::Similarity { max } => (max - score).max(0.0),
        }
    }
}

/// Capability contract for an external fuzzy-hash algorithm.
pub trait FuzzyHasher: Send + Sync {
    /// Algorithm identifier, e.g. `"tlsh"`.
    fn name(&self) -> &str;

    /// Digest `payload` into the algorithm's textual encoding.
    ///
    /// Degenerate inputs (too short, too uniform) should be reported as
    /// [`FingerprintError::BackendComputationFailure`].
    fn hash(&self, payload: &[u8]) -> Result<String, FingerprintError>;

    /// Native comparison score of two digests.
    fn compare(&self, left: &str, right: &str) -> Result<f64, FingerprintError>;

    fn metric(&self) -> ScoreMetric;

    /// Payloads shorter than this are skipped without calling [`hash`](Self::hash).
    fn min_input_len(&self) -> usize {
        0
    }
}

/// Which family of external algorithm an adapter wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalKind {
    /// Locality-sensitive hash (TLSH).
    Lsh,
    /// Context-triggered piecewise hash (ssdeep).
    Ctph,
}

impl ExternalKind {
    pub fn name(self) -> &'static str {
        match self {
            ExternalKind::Lsh => "lsh",
            ExternalKind::Ctph => "ctph",
        }
    }
}

/// Binds a [`FuzzyHasher`] to the fingerprint pipeline.
#[derive(Clone)]
pub struct ExternalAdapter {
    kind: ExternalKind,
    hasher: Arc<dyn FuzzyHasher>,
}

impl ExternalAdapter {
    pub fn new(kind: ExternalKind, hasher: Arc<dyn FuzzyHasher>) -> Self {
        Self { kind, hasher }
    }

    pub fn kind(&self) -> ExternalKind {
        self.kind
    }

    pub fn algorithm(&self) -> &str {
        self.hasher.name()
    }

    pub fn min_input_len(&self) -> usize {
        self.hasher.min_input_len()
    }

    /// Digest a payload, refusing inputs below the algorithm's threshold.
    ///
    /// Whatever the algorithm reports for a single payload comes back as a
    /// record-level error (`InputTooShort` or `BackendComputationFailure`).
    pub fn compute(&self, payload: &[u8]) -> Result<String, FingerprintError> {
        let required = self.hasher.min_input_len();
        if payload.len() < required {
            return Err(FingerprintError::InputTooShort {
                required,
                actual: payload.len(),
            });
        }
        let digest = self.hasher.hash(payload).map_err(|err| match err {
            FingerprintError::InputTooShort { .. }
            | FingerprintError::BackendComputationFailure { .. } => err,
            other => self.failure(other.to_string()),
        })?;
        if digest.is_empty() {
            return Err(self.failure("empty digest".into()));
        }
        Ok(digest)
    }

    fn failure(&self, reason: String) -> FingerprintError {
        FingerprintError::BackendComputationFailure {
            backend: self.hasher.name().to_string(),
            reason,
        }
    }

    /// Normalized distance between two digests.
    pub fn distance(&self, left: &str, right: &str) -> Result<f64, FingerprintError> {
        let native = self.hasher.compare(left, right)?;
        if !native.is_finite() {
            return Err(self.failure(format!("non-finite score {native}")));
        }
        Ok(self.hasher.metric().normalize(native))
    }
}

impl fmt::Debug for ExternalAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAdapter")
            .field("kind", &self.kind)
            .field("algorithm", &self.hasher.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Toy digest: hex of the first eight bytes, compared by differing
    /// characters. Only used to exercise the adapter plumbing.
    pub(crate) struct PrefixHasher {
        pub metric: ScoreMetric,
        pub min_len: usize,
    }

    impl FuzzyHasher for PrefixHasher {
        fn name(&self) -> &str {
            "prefix"
        }

        fn hash(&self, payload: &[u8]) -> Result<String, FingerprintError> {
            if payload.iter().all(|&b| b == payload[0]) {
                return Err(FingerprintError::BackendComputationFailure {
                    backend: "prefix".into(),
                    reason: "uniform input".into(),
                });
            }
            Ok(payload.iter().take(8).map(|b| format!("{b:02x}")).collect())
        }

        fn compare(&self, left: &str, right: &str) -> Result<f64, FingerprintError> {
            let diff = left
                .chars()
                .zip(right.chars())
                .filter(|(a, b)| a != b)
                .count()
                + left.len().abs_diff(right.len());
            Ok(match self.metric {
                ScoreMetric::Distance => diff as f64,
                ScoreMetric::Similarity { max } => max - diff as f64,
            })
        }

        fn metric(&self) -> ScoreMetric {
            self.metric
        }

        fn min_input_len(&self) -> usize {
            self.min_len
        }
    }

    pub(crate) fn adapter(kind: ExternalKind, metric: ScoreMetric, min_len: usize) -> ExternalAdapter {
        ExternalAdapter::new(kind, Arc::new(PrefixHasher { metric, min_len }))
    }

    #[test]
    fn similarity_scores_are_inverted() {
        let metric = ScoreMetric::Similarity { max: 100.0 };
        assert_eq!(metric.normalize(100.0), 0.0);
        assert_eq!(metric.normalize(40.0), 60.0);
        assert_eq!(ScoreMetric::Distance.normalize(17.0), 17.0);
    }

    #[test]
    fn adapter_refuses_short_input() {
        let lsh = adapter(ExternalKind::Lsh, ScoreMetric::Distance, 50);
        let err = lsh.compute(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            FingerprintError::InputTooShort {
                required: 50,
                actual: 3
            }
        );
    }

    #[test]
    fn adapter_surfaces_backend_failure() {
        let ctph = adapter(ExternalKind::Ctph, ScoreMetric::Similarity { max: 100.0 }, 0);
        let err = ctph.compute(&[7; 64]).unwrap_err();
        assert!(matches!(err, FingerprintError::BackendComputationFailure { .. }));
    }

    #[test]
    fn adapter_distance_is_zero_for_identical_digests() {
        let ctph = adapter(ExternalKind::Ctph, ScoreMetric::Similarity { max: 100.0 }, 0);
        let digest = ctph.compute(b"0123456789").unwrap();
        assert_eq!(ctph.distance(&digest, &digest).unwrap(), 0.0);

        let lsh = adapter(ExternalKind::Lsh, ScoreMetric::Distance, 0);
        let other = lsh.compute(b"9123456789").unwrap();
        let d = lsh.distance(&digest, &other).unwrap();
        assert!(d > 0.0);
        assert_eq!(d, lsh.distance(&other, &digest).unwrap());
    }

    /// Rejects one specific payload with a non record-level error.
    struct PickyHasher;

    impl FuzzyHasher for PickyHasher {
        fn name(&self) -> &str {
            "picky"
        }

        fn hash(&self, payload: &[u8]) -> Result<String, FingerprintError> {
            if payload.starts_with(b"bad") {
                return Err(FingerprintError::Decode("malformed header".into()));
            }
            Ok(format!("{}", payload.len()))
        }

        fn compare(&self, _left: &str, _right: &str) -> Result<f64, FingerprintError> {
            Ok(f64::NAN)
        }

        fn metric(&self) -> ScoreMetric {
            ScoreMetric::Distance
        }
    }

    #[test]
    fn hasher_errors_become_record_level_failures() {
        let picky = ExternalAdapter::new(ExternalKind::Lsh, Arc::new(PickyHasher));
        let err = picky.compute(b"bad payload").unwrap_err();
        assert!(err.is_record_level());
        assert_eq!(
            err,
            FingerprintError::BackendComputationFailure {
                backend: "picky".into(),
                reason: "fingerprint decode error: malformed header".into(),
            }
        );
        assert_eq!(picky.compute(b"good payload").unwrap(), "12");
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let picky = ExternalAdapter::new(ExternalKind::Lsh, Arc::new(PickyHasher));
        assert!(matches!(
            picky.distance("1", "2"),
            Err(FingerprintError::BackendComputationFailure { .. })
        ));
    }
}
