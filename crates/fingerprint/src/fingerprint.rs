//! Fingerprint values and the identity of the space they live in.
//!
//! A fingerprint is only comparable with fingerprints from the same
//! [`FingerprintSpace`], i.e. produced by the same backend with the same
//! parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitshred::BitVector;
use crate::histogram::BigramHistogram;

/// Identifier of a stored content record.
pub type ContentId = u64;

/// Opaque fingerprint produced by exactly one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fingerprint {
    /// Bitshred n-gram presence sketch.
    Bits(BitVector),
    /// Sparse byte-bigram counts.
    Bigrams(BigramHistogram),
    /// Encoded digest of an external algorithm.
    Digest(String),
}

impl Fingerprint {
    /// Short label for log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Fingerprint::Bits(_) => "bits",
            Fingerprint::Bigrams(_) => "bigrams",
            Fingerprint::Digest(_) => "digest",
        }
    }
}

/// Backend name plus parameters: the prefix of every fingerprint key.
///
/// The tag is stable across releases and is used to name storage tables, so
/// changing its format orphans previously computed fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintSpace {
    backend: String,
    tag: String,
}

impl FingerprintSpace {
    pub fn new(backend: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            tag: tag.into(),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Stable tag, e.g. `bitshred:m=8192:n=4:hash=jenkins`.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for FingerprintSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}
