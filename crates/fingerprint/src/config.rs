//! Configuration and error types for the fingerprint backends.
//!
//! Nothing in here performs I/O. A backend is a pure function of
//! `(payload, config)`, so two runs with equal configs over equal bytes always
//! produce bit-identical fingerprints.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::HashFunction;

/// Parameters of the Bitshred n-gram sketch.
///
/// Together with the backend name these form the fingerprint space: two
/// Bitshred fingerprints are only comparable when all three fields agree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BitshredConfig {
    /// Length of the bit vector in bits.
    pub m: u32,
    /// Length of the sliding byte window.
    pub n: u32,
    /// Hash function used to bucket each window.
    #[serde(default)]
    pub hash: HashFunction,
}

impl BitshredConfig {
    /// Create a configuration with the default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bit-vector length. Typical values are powers of two from 1024
    /// to 65536; larger vectors saturate more slowly on long payloads.
    pub fn with_m(mut self, m: u32) -> Self {
        self.m = m;
        self
    }

    /// Set the n-gram length in bytes.
    pub fn with_n(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn with_hash(mut self, hash: HashFunction) -> Self {
        self.hash = hash;
        self
    }

    /// Number of bytes needed to hold `m` bits.
    pub fn byte_width(&self) -> usize {
        (self.m as usize).div_ceil(8)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), FingerprintError> {
        if self.m == 0 {
            return Err(FingerprintError::InvalidConfig(
                "bitshred m must be >= 1".into(),
            ));
        }
        if self.n == 0 {
            return Err(FingerprintError::InvalidConfig(
                "bitshred n must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BitshredConfig {
    fn default() -> Self {
        Self {
            m: 8192,
            n: 4,
            hash: HashFunction::Jenkins,
        }
    }
}

/// Errors returned by fingerprint computation, comparison and decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FingerprintError {
    /// Payload is shorter than the backend's minimum window.
    #[error("input too short: need at least {required} bytes, got {actual}")]
    InputTooShort { required: usize, actual: usize },

    /// An external algorithm rejected the input.
    #[error("{backend} failed to compute: {reason}")]
    BackendComputationFailure { backend: String, reason: String },

    /// Two fingerprints cannot be compared with each other.
    #[error("fingerprint mismatch: {0}")]
    FingerprintMismatch(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown hash function '{0}'")]
    UnknownHashFunction(String),

    /// A fingerprint could not be serialized for storage.
    #[error("fingerprint encode error: {0}")]
    Encode(String),

    /// Stored bytes do not decode into a fingerprint of the expected shape.
    #[error("fingerprint decode error: {0}")]
    Decode(String),
}

impl FingerprintError {
    /// Whether the error concerns a single payload rather than the backend
    /// setup. Record-level errors are skipped by batch runs.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            FingerprintError::InputTooShort { .. }
                | FingerprintError::BackendComputationFailure { .. }
        )
    }
}
