use fingerprint::{ContentId, FingerprintError};
use serde::{Deserialize, Serialize};
use store::{StoreError, DEFAULT_RANK_PAGE};
use thiserror::Error;

/// Which matches a ranking keeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Policy {
    /// The `k` closest candidates.
    TopK { k: usize },
    /// Every candidate at distance `<= delta`.
    Threshold { delta: f64 },
}

impl Policy {
    pub fn top_k(k: usize) -> Self {
        Policy::TopK { k }
    }

    pub fn threshold(delta: f64) -> Self {
        Policy::Threshold { delta }
    }

    pub fn validate(&self) -> Result<(), RankError> {
        match *self {
            Policy::TopK { .. } => Ok(()),
            Policy::Threshold { delta } if !delta.is_finite() || delta < 0.0 => Err(
                RankError::InvalidConfig(format!("threshold must be finite and >= 0.0, got {delta}")),
            ),
            Policy::Threshold { .. } => Ok(()),
        }
    }
}

/// Tuning knobs of a ranking scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankOptions {
    /// Stored fingerprints fetched per page.
    #[serde(default = "RankOptions::default_page_size")]
    pub page_size: usize,
}

impl RankOptions {
    pub(crate) fn default_page_size() -> usize {
        DEFAULT_RANK_PAGE
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<(), RankError> {
        if self.page_size == 0 {
            return Err(RankError::InvalidConfig(
                "page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
        }
    }
}

/// A candidate and its normalized distance to the query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RankedMatch {
    pub content_id: ContentId,
    /// Smaller is closer; `0.0` means indistinguishable.
    pub score: f64,
}

/// Outcome of ranking one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ranking {
    pub query_id: ContentId,
    pub policy: Policy,
    /// Ascending by score, ties broken by ascending id.
    pub matches: Vec<RankedMatch>,
    /// Candidates compared against the query.
    pub scanned: usize,
}

impl Ranking {
    /// No candidate qualified. Not an error.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }
}

/// Errors produced by the ranker.
#[derive(Debug, Error)]
pub enum RankError {
    /// The query has no stored fingerprint in the backend's space.
    #[error("no fingerprint stored for content {0}")]
    NotFound(ContentId),
    #[error("backend '{0}' does not support corpus ranking")]
    UnsupportedBackend(String),
    #[error("invalid rank config: {0}")]
    InvalidConfig(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_serde_is_tagged() {
        let json = serde_json::to_string(&Policy::top_k(8)).unwrap();
        assert_eq!(json, r#"{"type":"top_k","k":8}"#);
        let back: Policy = serde_json::from_str(r#"{"type":"threshold","delta":0.25}"#).unwrap();
        assert_eq!(back, Policy::threshold(0.25));
    }

    #[test]
    fn threshold_must_be_finite_and_non_negative() {
        assert!(Policy::threshold(0.0).validate().is_ok());
        assert!(Policy::threshold(-0.1).validate().is_err());
        assert!(Policy::threshold(f64::NAN).validate().is_err());
        assert!(Policy::top_k(0).validate().is_ok());
    }

    #[test]
    fn options_default_and_validate() {
        let opts = RankOptions::default();
        assert_eq!(opts.page_size, 89);
        assert!(opts.validate().is_ok());
        assert!(opts.with_page_size(0).validate().is_err());
    }
}
