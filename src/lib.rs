//! Near-duplicate discovery over binary content.
//!
//! `sidfp` ties the workspace crates together:
//!
//! - [`fingerprint`]: Bitshred, bigram histogram and external fuzzy-hash
//!   backends.
//! - [`store`]: content and fingerprint persistence (in-memory or redb).
//! - [`matcher`]: exhaustive top-k / threshold ranking.
//!
//! On top of them this crate provides the batch computer
//! ([`compute_missing`]), the instrumented ranking entry point ([`rank`]),
//! histogram pair distances ([`pair_distance`], [`pair_distances`]), a global
//! metrics observer and YAML configuration.
//!
//! ```
//! use sidfp::{compute_missing, rank, Backend, BatchOptions, BitshredConfig, Policy, RankOptions};
//! use sidfp::store::{ContentStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.put_content(1, Some(b"a tune with a long melody line")).unwrap();
//! store.put_content(2, Some(b"a tune with a long melody lime")).unwrap();
//! store.put_content(3, Some(b"entirely unrelated bytes here")).unwrap();
//!
//! let backend = Backend::Bitshred(BitshredConfig::new().with_m(2048));
//! let report = compute_missing(&store, &backend, &BatchOptions::default()).unwrap();
//! assert_eq!(report.computed, 3);
//!
//! let ranking = rank(&store, &backend, 1, Policy::top_k(1), &RankOptions::default()).unwrap();
//! assert_eq!(ranking.matches[0].content_id, 2);
//! ```

pub mod batch;
pub mod config;
pub mod distance;
pub mod metrics;

pub use fingerprint;
pub use matcher;
pub use store;

pub use crate::batch::{BatchError, BatchOptions, BatchReport, compute_missing};
pub use crate::config::{ConfigLoadError, SidfpConfig};
pub use crate::distance::{DistanceError, PairDistance, pair_distance, pair_distances};
pub use crate::metrics::{BatchMetrics, PageOutcome, set_batch_metrics};
pub use fingerprint::{
    Backend, BitshredConfig, ContentId, ExternalAdapter, ExternalKind, Fingerprint,
    FingerprintError, FingerprintSpace, FuzzyHasher, HashFunction, ScoreMetric,
};
pub use matcher::{Policy, RankError, RankOptions, RankedMatch, Ranker, Ranking};
pub use store::{ContentStore, StoreError};

use crate::metrics::MetricsSpan;

/// Rank stored fingerprints of `backend` against the fingerprint of
/// `query_id`, reporting the outcome to the installed metrics recorder.
pub fn rank(
    store: &dyn ContentStore,
    backend: &Backend,
    query_id: ContentId,
    policy: Policy,
    options: &RankOptions,
) -> Result<Ranking, RankError> {
    let span = MetricsSpan::start();
    let result = Ranker::new(store, backend)
        .with_options(*options)
        .rank(query_id, policy);
    if let Some(span) = span {
        let space = backend.space();
        span.record_rank(
            space.tag(),
            result.as_ref().map(|ranking| ranking.len()).map_err(|_| ()),
        );
    }
    result
}
