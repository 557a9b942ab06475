use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fingerprint::{Backend, ContentId, Fingerprint};
use store::ContentStore;
use tracing::{debug, info, warn};

use crate::types::{Policy, RankError, RankOptions, RankedMatch, Ranking};

#[cfg(test)]
mod tests;

/// Heap entry ordered by `(score, id)`, so the heap top is the worst kept
/// candidate.
#[derive(Debug, Clone, Copy)]
struct Candidate(RankedMatch);

impl Candidate {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| self.0.content_id.cmp(&other.0.content_id))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other)
    }
}

/// Accumulates matches under one policy.
enum Selection {
    TopK { k: usize, heap: BinaryHeap<Candidate> },
    Threshold { delta: f64, kept: Vec<RankedMatch> },
}

impl Selection {
    fn new(policy: Policy) -> Self {
        match policy {
            Policy::TopK { k } => Selection::TopK {
                k,
                heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            },
            Policy::Threshold { delta } => Selection::Threshold {
                delta,
                kept: Vec::new(),
            },
        }
    }

    fn offer(&mut self, candidate: RankedMatch) {
        match self {
            Selection::TopK { k, heap } => {
                if *k == 0 {
                    return;
                }
                let candidate = Candidate(candidate);
                if heap.len() < *k {
                    heap.push(candidate);
                } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                    heap.pop();
                    heap.push(candidate);
                }
            }
            Selection::Threshold { delta, kept } => {
                if candidate.score <= *delta {
                    kept.push(candidate);
                }
            }
        }
    }

    fn finish(self) -> Vec<RankedMatch> {
        match self {
            Selection::TopK { heap, .. } => heap
                .into_sorted_vec()
                .into_iter()
                .map(|Candidate(m)| m)
                .collect(),
            Selection::Threshold { mut kept, .. } => {
                kept.sort_by(|a, b| {
                    a.score
                        .total_cmp(&b.score)
                        .then_with(|| a.content_id.cmp(&b.content_id))
                });
                kept
            }
        }
    }
}

/// Exhaustive nearest-neighbour search over the stored fingerprints of one
/// backend.
pub struct Ranker<'a> {
    store: &'a dyn ContentStore,
    backend: &'a Backend,
    options: RankOptions,
}

impl<'a> Ranker<'a> {
    pub fn new(store: &'a dyn ContentStore, backend: &'a Backend) -> Self {
        Self {
            store,
            backend,
            options: RankOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RankOptions) -> Self {
        self.options = options;
        self
    }

    /// Load and decode the stored fingerprint of `id`.
    pub fn query_fingerprint(&self, id: ContentId) -> Result<Fingerprint, RankError> {
        let space = self.backend.space();
        let bytes = self
            .store
            .fingerprint(&space, id)?
            .ok_or(RankError::NotFound(id))?;
        Ok(self.backend.decode(&bytes)?)
    }

    /// Rank every stored fingerprint of the backend's space against the
    /// fingerprint of `query_id`. The query itself is never part of the
    /// result.
    pub fn rank(&self, query_id: ContentId, policy: Policy) -> Result<Ranking, RankError> {
        if !self.backend.supports_ranking() {
            return Err(RankError::UnsupportedBackend(self.backend.name()));
        }
        policy.validate()?;
        self.options.validate()?;

        let space = self.backend.space();
        let query = self.query_fingerprint(query_id)?;

        let mut selection = Selection::new(policy);
        let mut scanned = 0usize;
        let mut skipped = 0usize;

        if !matches!(policy, Policy::TopK { k: 0 }) {
            let mut cursor = None;
            loop {
                let rows = self
                    .store
                    .fingerprint_page(&space, cursor, self.options.page_size)?;
                let Some(last) = rows.last() else {
                    break;
                };
                cursor = Some(last.id);

                for row in rows.iter().filter(|row| row.id != query_id) {
                    let score = self
                        .backend
                        .decode(&row.bytes)
                        .and_then(|candidate| self.backend.compare(&query, &candidate));
                    match score {
                        Ok(score) => {
                            scanned += 1;
                            selection.offer(RankedMatch {
                                content_id: row.id,
                                score,
                            });
                        }
                        Err(err) => {
                            skipped += 1;
                            warn!(content_id = row.id, space = %space, error = %err, "skipping candidate");
                        }
                    }
                }
                debug!(space = %space, cursor = last.id, scanned, "rank page done");
            }
        }

        let matches = selection.finish();
        info!(
            query_id,
            space = %space,
            scanned,
            skipped,
            matches = matches.len(),
            "ranking complete"
        );

        Ok(Ranking {
            query_id,
            policy,
            matches,
            scanned,
        })
    }
}
