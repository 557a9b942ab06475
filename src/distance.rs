//! Histogram distances for explicitly requested pairs.
//!
//! A bigram comparison walks all 65536 cells, so histograms are never part of
//! a corpus scan. Instead callers name the pairs they care about; each
//! unordered pair is computed once and stored under `(lesser, greater)`.

use std::collections::HashMap;

use fingerprint::{Backend, BigramHistogram, ContentId, Fingerprint, FingerprintError};
use serde::{Deserialize, Serialize};
use store::{ContentStore, FingerprintRow, StoreError, canonical_pair};
use thiserror::Error;
use tracing::{debug, info};

/// Distance between two histograms, `lesser < greater`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairDistance {
    pub lesser: ContentId,
    pub greater: ContentId,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("content {0} not found")]
    ContentNotFound(ContentId),

    #[error("no histogram for content {id}: {source}")]
    Fingerprint {
        id: ContentId,
        #[source]
        source: FingerprintError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Loads histograms from the store, computing and persisting the ones that
/// are missing.
struct Histograms<'a> {
    store: &'a dyn ContentStore,
    backend: Backend,
    loaded: HashMap<ContentId, BigramHistogram>,
}

impl<'a> Histograms<'a> {
    fn new(store: &'a dyn ContentStore) -> Self {
        Self {
            store,
            backend: Backend::Histogram,
            loaded: HashMap::new(),
        }
    }

    fn get(&mut self, id: ContentId) -> Result<&BigramHistogram, DistanceError> {
        if !self.loaded.contains_key(&id) {
            let histogram = self.load(id)?;
            self.loaded.insert(id, histogram);
        }
        self.loaded
            .get(&id)
            .ok_or(DistanceError::ContentNotFound(id))
    }

    fn load(&self, id: ContentId) -> Result<BigramHistogram, DistanceError> {
        let space = self.backend.space();
        let wrap = |source| DistanceError::Fingerprint { id, source };

        let fingerprint = match self.store.fingerprint(&space, id)? {
            Some(bytes) => self.backend.decode(&bytes).map_err(wrap)?,
            None => {
                let record = self
                    .store
                    .content(id)?
                    .ok_or(DistanceError::ContentNotFound(id))?;
                let payload = record.payload.as_deref().unwrap_or_default();
                let fingerprint = self.backend.compute(payload).map_err(wrap)?;
                let bytes = self.backend.encode(&fingerprint).map_err(wrap)?;
                self.store
                    .persist_page(&space, &[FingerprintRow { id, bytes }])?;
                debug!(content_id = id, "histogram computed on demand");
                fingerprint
            }
        };

        match fingerprint {
            Fingerprint::Bigrams(histogram) => Ok(histogram),
            other => Err(wrap(FingerprintError::FingerprintMismatch(format!(
                "expected bigrams, found {}",
                other.kind()
            )))),
        }
    }

    fn distance(&mut self, a: ContentId, b: ContentId) -> Result<f64, DistanceError> {
        let Some((lesser, greater)) = canonical_pair(a, b) else {
            self.get(a)?;
            return Ok(0.0);
        };
        if let Some(score) = self.store.pair_distance(lesser, greater)? {
            return Ok(score);
        }
        let left = self.get(lesser)?.clone();
        let score = left.euclidean_distance(self.get(greater)?);
        self.store.put_pair_distance(lesser, greater, score)?;
        Ok(score)
    }
}

/// Histogram distance between two content records.
///
/// A previously stored distance is returned as is. Otherwise the histograms
/// are loaded (or computed and persisted) and the result is stored. The
/// distance of a record to itself is `0.0` and is not stored.
pub fn pair_distance(
    store: &dyn ContentStore,
    a: ContentId,
    b: ContentId,
) -> Result<f64, DistanceError> {
    Histograms::new(store).distance(a, b)
}

/// Distances of every unordered pair drawn from `ids`.
///
/// Duplicate ids are ignored. The result is ordered by `(lesser, greater)`.
pub fn pair_distances(
    store: &dyn ContentStore,
    ids: &[ContentId],
) -> Result<Vec<PairDistance>, DistanceError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut histograms = Histograms::new(store);
    let mut out = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
    for (i, &lesser) in ids.iter().enumerate() {
        for &greater in &ids[i + 1..] {
            let score = histograms.distance(lesser, greater)?;
            out.push(PairDistance {
                lesser,
                greater,
                score,
            });
        }
    }

    info!(ids = ids.len(), pairs = out.len(), "pair distances done");
    Ok(out)
}
