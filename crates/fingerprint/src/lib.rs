//! # sid-fingerprint
//!
//! Similarity fingerprints over raw content bytes.
//!
//! ## Contract
//!
//! - Every backend is a pure function of `(payload, config)`. No I/O, no
//!   clocks, no global state.
//! - A [`Fingerprint`] is only comparable with another fingerprint of the same
//!   [`FingerprintSpace`].
//! - [`Backend::compare`] always returns a distance: `0.0` for identical
//!   content and larger values for more dissimilar content, whatever the
//!   backend's native score looks like.
//!
//! ## Backends
//!
//! 1. **Bitshred**: hashes every `n`-byte window into an `m`-bit vector and
//!    compares vectors with the Jaccard distance of their set bits.
//! 2. **Histogram**: counts byte bigrams and compares the max-normalized
//!    matrices with the Euclidean distance. Only meant for explicitly
//!    requested pairs.
//! 3. **External**: TLSH/ssdeep style digests supplied through
//!    [`FuzzyHasher`]. [`Backend::tlsh`] and [`Backend::ssdeep`] wrap the
//!    registry implementations when the `tlsh` / `ssdeep` features are on.
//!
//! ## Example
//!
//! ```
//! use fingerprint::{Backend, BitshredConfig};
//!
//! let backend = Backend::Bitshred(BitshredConfig::new().with_m(1024).with_n(4));
//! let a = backend.compute(b"the quick brown fox jumps over the lazy dog").unwrap();
//! let b = backend.compute(b"the quick brown fox jumps over the lazy cat").unwrap();
//!
//! assert_eq!(backend.compare(&a, &a).unwrap(), 0.0);
//! let d = backend.compare(&a, &b).unwrap();
//! assert!(d > 0.0 && d < 1.0);
//! assert_eq!(backend.space().tag(), "bitshred:m=1024:n=4:hash=jenkins");
//! ```

pub mod bitshred;
pub mod codec;
pub mod config;
pub mod external;
pub mod fingerprint;
pub mod hash;
pub mod histogram;

pub use crate::bitshred::{bitshred, BitVector};
pub use crate::config::{BitshredConfig, FingerprintError};
pub use crate::external::{ExternalAdapter, ExternalKind, FuzzyHasher, ScoreMetric};
#[cfg(feature = "ssdeep")]
pub use crate::external::ssdeep::Ssdeep;
#[cfg(feature = "tlsh")]
pub use crate::external::tlsh::Tlsh;
pub use crate::fingerprint::{ContentId, Fingerprint, FingerprintSpace};
pub use crate::hash::HashFunction;
pub use crate::histogram::{bigram_histogram, BigramHistogram, BIGRAM_CELLS};

/// Closed set of fingerprint backends.
#[derive(Debug, Clone)]
pub enum Backend {
    Bitshred(BitshredConfig),
    Histogram,
    External(ExternalAdapter),
}

impl Backend {
    /// TLSH digests ranked by diff score.
    #[cfg(feature = "tlsh")]
    pub fn tlsh() -> Self {
        Backend::External(ExternalAdapter::new(
            ExternalKind::Lsh,
            std::sync::Arc::new(external::tlsh::Tlsh),
        ))
    }

    /// ssdeep digests ranked by `100 - match score`.
    #[cfg(feature = "ssdeep")]
    pub fn ssdeep() -> Self {
        Backend::External(ExternalAdapter::new(
            ExternalKind::Ctph,
            std::sync::Arc::new(external::ssdeep::Ssdeep),
        ))
    }

    /// Select a backend by name: `bitshred` (with `bitshred`), `histogram`,
    /// and `tlsh` / `ssdeep` when their features are enabled.
    pub fn named(name: &str, bitshred: BitshredConfig) -> Result<Self, FingerprintError> {
        match name {
            "bitshred" => Ok(Backend::Bitshred(bitshred)),
            "histogram" => Ok(Backend::Histogram),
            #[cfg(feature = "tlsh")]
            "tlsh" => Ok(Backend::tlsh()),
            #[cfg(feature = "ssdeep")]
            "ssdeep" => Ok(Backend::ssdeep()),
            other => Err(FingerprintError::InvalidConfig(format!(
                "unknown or disabled backend '{other}'"
            ))),
        }
    }

    /// Backend name, the first component of the fingerprint space.
    pub fn name(&self) -> String {
        match self {
            Backend::Bitshred(_) => "bitshred".to_string(),
            Backend::Histogram => "histogram".to_string(),
            Backend::External(adapter) => adapter.algorithm().to_string(),
        }
    }

    /// Space that fingerprints of this backend live in.
    pub fn space(&self) -> FingerprintSpace {
        match self {
            Backend::Bitshred(cfg) => FingerprintSpace::new(
                "bitshred",
                format!("bitshred:m={}:n={}:hash={}", cfg.m, cfg.n, cfg.hash),
            ),
            Backend::Histogram => FingerprintSpace::new("histogram", "histogram"),
            Backend::External(adapter) => FingerprintSpace::new(
                adapter.algorithm(),
                format!("{}:{}", adapter.kind().name(), adapter.algorithm()),
            ),
        }
    }

    /// Payloads shorter than this are never fetched for computation.
    pub fn skip_below(&self) -> usize {
        match self {
            Backend::External(adapter) => adapter.min_input_len(),
            _ => 0,
        }
    }

    /// Whether fingerprints of this backend may be scanned corpus-wide.
    ///
    /// Histogram comparison walks 65536 cells per pair and is restricted to
    /// explicitly requested pairs.
    pub fn supports_ranking(&self) -> bool {
        !matches!(self, Backend::Histogram)
    }

    /// Validate backend parameters.
    pub fn validate(&self) -> Result<(), FingerprintError> {
        match self {
            Backend::Bitshred(cfg) => cfg.validate(),
            _ => Ok(()),
        }
    }

    pub fn compute(&self, payload: &[u8]) -> Result<Fingerprint, FingerprintError> {
        match self {
            Backend::Bitshred(cfg) => bitshred(payload, cfg).map(Fingerprint::Bits),
            Backend::Histogram => bigram_histogram(payload).map(Fingerprint::Bigrams),
            Backend::External(adapter) => adapter.compute(payload).map(Fingerprint::Digest),
        }
    }

    /// Normalized distance between two fingerprints of this backend.
    pub fn compare(&self, left: &Fingerprint, right: &Fingerprint) -> Result<f64, FingerprintError> {
        match (self, left, right) {
            (Backend::Bitshred(_), Fingerprint::Bits(a), Fingerprint::Bits(b)) => {
                a.jaccard_distance(b)
            }
            (Backend::Histogram, Fingerprint::Bigrams(a), Fingerprint::Bigrams(b)) => {
                Ok(a.euclidean_distance(b))
            }
            (Backend::External(adapter), Fingerprint::Digest(a), Fingerprint::Digest(b)) => {
                adapter.distance(a, b)
            }
            _ => Err(FingerprintError::FingerprintMismatch(format!(
                "{} backend cannot compare {} with {}",
                self.name(),
                left.kind(),
                right.kind()
            ))),
        }
    }

    /// Storage form of a fingerprint produced by this backend.
    pub fn encode(&self, fingerprint: &Fingerprint) -> Result<Vec<u8>, FingerprintError> {
        match (self, fingerprint) {
            (Backend::Bitshred(cfg), Fingerprint::Bits(bits)) => {
                if bits.len() != cfg.m as usize {
                    return Err(FingerprintError::FingerprintMismatch(format!(
                        "{} bit vector in a space of m={}",
                        bits.len(),
                        cfg.m
                    )));
                }
                Ok(codec::encode_bits(bits))
            }
            (Backend::Histogram, Fingerprint::Bigrams(hist)) => codec::encode_bigrams(hist),
            (Backend::External(_), Fingerprint::Digest(digest)) => Ok(codec::encode_digest(digest)),
            _ => Err(FingerprintError::FingerprintMismatch(format!(
                "{} backend cannot encode a {} fingerprint",
                self.name(),
                fingerprint.kind()
            ))),
        }
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(&self, bytes: &[u8]) -> Result<Fingerprint, FingerprintError> {
        match self {
            Backend::Bitshred(cfg) => codec::decode_bits(cfg.m as usize, bytes).map(Fingerprint::Bits),
            Backend::Histogram => codec::decode_bigrams(bytes).map(Fingerprint::Bigrams),
            Backend::External(_) => codec::decode_digest(bytes).map(Fingerprint::Digest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::tests::adapter;

    fn sample(seed: u32, len: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            })
            .collect()
    }

    fn backends() -> Vec<Backend> {
        vec![
            Backend::Bitshred(BitshredConfig::new().with_m(2048)),
            Backend::Histogram,
            Backend::External(adapter(ExternalKind::Lsh, ScoreMetric::Distance, 0)),
            Backend::External(adapter(
                ExternalKind::Ctph,
                ScoreMetric::Similarity { max: 100.0 },
                0,
            )),
        ]
    }

    #[test]
    fn self_distance_is_zero_for_every_backend() {
        let payload = sample(7, 512);
        for backend in backends() {
            let fp = backend.compute(&payload).unwrap();
            assert_eq!(backend.compare(&fp, &fp).unwrap(), 0.0, "{}", backend.name());
        }
    }

    #[test]
    fn distances_are_symmetric_and_non_negative() {
        let a = sample(1, 300);
        let b = sample(2, 300);
        for backend in backends() {
            let fa = backend.compute(&a).unwrap();
            let fb = backend.compute(&b).unwrap();
            let ab = backend.compare(&fa, &fb).unwrap();
            assert!(ab >= 0.0);
            assert_eq!(ab, backend.compare(&fb, &fa).unwrap(), "{}", backend.name());
        }
    }

    #[test]
    fn jaccard_stays_in_unit_range() {
        let backend = Backend::Bitshred(BitshredConfig::new().with_m(256).with_n(3));
        for seed in 0..8 {
            let a = backend.compute(&sample(seed, 200)).unwrap();
            let b = backend.compute(&sample(seed + 100, 50)).unwrap();
            let d = backend.compare(&a, &b).unwrap();
            assert!((0.0..=1.0).contains(&d));
        }
    }

    #[test]
    fn encode_decode_preserves_fingerprints() {
        let payload = sample(3, 128);
        for backend in backends() {
            let fp = backend.compute(&payload).unwrap();
            let bytes = backend.encode(&fp).unwrap();
            assert_eq!(backend.decode(&bytes).unwrap(), fp, "{}", backend.name());
        }
    }

    #[test]
    fn cross_backend_fingerprints_are_rejected() {
        let bits = Backend::Bitshred(BitshredConfig::new());
        let hist = Backend::Histogram;
        let fp = hist.compute(b"some payload").unwrap();
        assert!(matches!(
            bits.compare(&fp, &fp),
            Err(FingerprintError::FingerprintMismatch(_))
        ));
        assert!(bits.encode(&fp).is_err());
    }

    #[test]
    fn encode_rejects_vector_from_another_space() {
        let small = Backend::Bitshred(BitshredConfig::new().with_m(64));
        let large = Backend::Bitshred(BitshredConfig::new().with_m(128));
        let fp = small.compute(b"abcdefgh").unwrap();
        assert!(large.encode(&fp).is_err());
    }

    #[test]
    fn space_tags_name_backend_and_parameters() {
        let tags: Vec<String> = backends().iter().map(|b| b.space().tag().to_string()).collect();
        assert_eq!(
            tags,
            vec![
                "bitshred:m=2048:n=4:hash=jenkins",
                "histogram",
                "lsh:prefix",
                "ctph:prefix",
            ]
        );
        assert_eq!(
            Backend::Bitshred(BitshredConfig::new().with_hash(HashFunction::Sbox))
                .space()
                .tag(),
            "bitshred:m=8192:n=4:hash=sbox"
        );
    }

    #[test]
    fn only_histogram_is_excluded_from_ranking() {
        let flags: Vec<bool> = backends().iter().map(Backend::supports_ranking).collect();
        assert_eq!(flags, vec![true, false, true, true]);
    }

    #[test]
    fn skip_threshold_comes_from_the_external_algorithm() {
        let lsh = Backend::External(adapter(ExternalKind::Lsh, ScoreMetric::Distance, 50));
        assert_eq!(lsh.skip_below(), 50);
        assert_eq!(Backend::Histogram.skip_below(), 0);
    }

    #[test]
    fn similar_payloads_are_closer_than_unrelated_ones() {
        let backend = Backend::Bitshred(BitshredConfig::new().with_m(4096));
        let base = sample(11, 2000);
        let mut tweaked = base.clone();
        tweaked[1000] ^= 0xff;
        let other = sample(12, 2000);

        let fb = backend.compute(&base).unwrap();
        let ft = backend.compute(&tweaked).unwrap();
        let fo = backend.compute(&other).unwrap();
        assert!(backend.compare(&fb, &ft).unwrap() < backend.compare(&fb, &fo).unwrap());
    }

    #[test]
    fn backends_are_selected_by_name() {
        let cfg = BitshredConfig::new().with_m(512);
        assert_eq!(
            Backend::named("bitshred", cfg).unwrap().space().tag(),
            "bitshred:m=512:n=4:hash=jenkins"
        );
        assert_eq!(Backend::named("histogram", cfg).unwrap().name(), "histogram");
        assert!(matches!(
            Backend::named("md5", cfg),
            Err(FingerprintError::InvalidConfig(_))
        ));
    }

    #[cfg(feature = "tlsh")]
    #[test]
    fn tlsh_backend_lives_in_the_lsh_space() {
        let backend = Backend::named("tlsh", BitshredConfig::new()).unwrap();
        assert_eq!(backend.space().tag(), "lsh:tlsh");
        assert_eq!(backend.skip_below(), 50);
        assert!(backend.supports_ranking());
    }

    #[cfg(feature = "ssdeep")]
    #[test]
    fn ssdeep_backend_lives_in_the_ctph_space() {
        let backend = Backend::named("ssdeep", BitshredConfig::new()).unwrap();
        assert_eq!(backend.space().tag(), "ctph:ssdeep");
        assert_eq!(backend.skip_below(), 0);
    }
}
