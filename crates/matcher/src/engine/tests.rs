use super::*;
use std::sync::Arc;

use fingerprint::{
    BitVector, BitshredConfig, ExternalAdapter, ExternalKind, FingerprintError, FuzzyHasher,
    ScoreMetric,
};
use store::{FingerprintRow, InMemoryStore};

/// Digests are decimal numbers; the distance is how far apart they are on the
/// number line. Lets tests pick exact distances.
struct NumberLine {
    metric: ScoreMetric,
}

impl NumberLine {
    fn parse(digest: &str) -> Result<f64, FingerprintError> {
        digest
            .parse()
            .map_err(|_| FingerprintError::BackendComputationFailure {
                backend: "numberline".into(),
                reason: format!("not a number: {digest}"),
            })
    }
}

impl FuzzyHasher for NumberLine {
    fn name(&self) -> &str {
        "numberline"
    }

    fn hash(&self, payload: &[u8]) -> Result<String, FingerprintError> {
        Ok(String::from_utf8_lossy(payload).trim().to_string())
    }

    fn compare(&self, left: &str, right: &str) -> Result<f64, FingerprintError> {
        let d = (Self::parse(left)? - Self::parse(right)?).abs();
        Ok(match self.metric {
            ScoreMetric::Distance => d,
            ScoreMetric::Similarity { max } => max - d,
        })
    }

    fn metric(&self) -> ScoreMetric {
        self.metric
    }
}

fn number_backend() -> Backend {
    Backend::External(ExternalAdapter::new(
        ExternalKind::Lsh,
        Arc::new(NumberLine {
            metric: ScoreMetric::Distance,
        }),
    ))
}

fn seed(store: &InMemoryStore, backend: &Backend, digests: &[(ContentId, &str)]) {
    let rows: Vec<FingerprintRow> = digests
        .iter()
        .map(|&(id, digest)| FingerprintRow {
            id,
            bytes: backend
                .encode(&Fingerprint::Digest(digest.to_string()))
                .unwrap(),
        })
        .collect();
    store.persist_page(&backend.space(), &rows).unwrap();
}

fn ids(ranking: &Ranking) -> Vec<ContentId> {
    ranking.matches.iter().map(|m| m.content_id).collect()
}

/// Deterministic pseudo-random values in `[0, 1)`.
fn spread(count: u64) -> Vec<(ContentId, String)> {
    (1..=count)
        .map(|id| {
            let v = (id.wrapping_mul(2_654_435_761) % 1000) as f64 / 1000.0;
            (id, format!("{v}"))
        })
        .collect()
}

#[test]
fn top_one_returns_closest_candidate() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(1, "0"), (2, "0.2"), (3, "0.9")]);

    let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(1)).unwrap();
    assert_eq!(
        ranking.matches,
        vec![RankedMatch {
            content_id: 2,
            score: 0.2
        }]
    );
    assert_eq!(ranking.scanned, 2);
    assert_eq!(ranking.query_id, 1);
}

#[test]
fn top_k_is_capped_by_candidates_and_excludes_query() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(1, "0"), (2, "0.2"), (3, "0.9")]);

    let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(10)).unwrap();
    assert_eq!(ids(&ranking), vec![2, 3]);
    assert!(ranking.matches.windows(2).all(|w| w[0].score <= w[1].score));
}

#[test]
fn equal_scores_are_ordered_by_id() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(
        &store,
        &backend,
        &[(10, "0"), (4, "1"), (2, "1"), (8, "1"), (6, "0.5")],
    );

    let ranker = Ranker::new(&store, &backend).with_options(RankOptions::default().with_page_size(2));
    assert_eq!(ids(&ranker.rank(10, Policy::top_k(3)).unwrap()), vec![6, 2, 4]);
    assert_eq!(
        ids(&ranker.rank(10, Policy::threshold(1.0)).unwrap()),
        vec![6, 2, 4, 8]
    );
}

#[test]
fn top_k_agrees_with_full_sort() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    let values = spread(200);
    let refs: Vec<(ContentId, &str)> = values.iter().map(|(id, v)| (*id, v.as_str())).collect();
    seed(&store, &backend, &refs);

    let query: f64 = values[41].1.parse().unwrap();
    let mut expected: Vec<(f64, ContentId)> = values
        .iter()
        .filter(|(id, _)| *id != 42)
        .map(|(id, v)| ((query - v.parse::<f64>().unwrap()).abs(), *id))
        .collect();
    expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let ranker = Ranker::new(&store, &backend).with_options(RankOptions::default().with_page_size(7));
    for k in [1, 5, 23, 199, 500] {
        let ranking = ranker.rank(42, Policy::top_k(k)).unwrap();
        let want: Vec<ContentId> = expected.iter().take(k).map(|&(_, id)| id).collect();
        assert_eq!(ids(&ranking), want, "k = {k}");
        assert_eq!(ranking.scanned, 199);
    }
}

#[test]
fn threshold_matches_brute_force_filter() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    let values = spread(150);
    let refs: Vec<(ContentId, &str)> = values.iter().map(|(id, v)| (*id, v.as_str())).collect();
    seed(&store, &backend, &refs);

    let query: f64 = values[0].1.parse().unwrap();
    let delta = 0.125;
    let mut expected: Vec<(f64, ContentId)> = values
        .iter()
        .skip(1)
        .map(|(id, v)| ((query - v.parse::<f64>().unwrap()).abs(), *id))
        .filter(|(d, _)| *d <= delta)
        .collect();
    expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let ranking = Ranker::new(&store, &backend)
        .with_options(RankOptions::default().with_page_size(11))
        .rank(1, Policy::threshold(delta))
        .unwrap();
    assert_eq!(
        ids(&ranking),
        expected.iter().map(|&(_, id)| id).collect::<Vec<_>>()
    );
    assert!(ranking.matches.iter().all(|m| m.score <= delta));
}

#[test]
fn zero_k_yields_empty_ranking() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(1, "0"), (2, "0.2")]);

    let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(0)).unwrap();
    assert!(ranking.is_empty());
    assert_eq!(ranking.scanned, 0);
}

#[test]
fn lone_query_yields_empty_ranking() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(5, "0.5")]);

    let ranking = Ranker::new(&store, &backend).rank(5, Policy::top_k(8)).unwrap();
    assert!(ranking.is_empty());
    assert_eq!(ranking.len(), 0);
}

#[test]
fn missing_query_is_not_found() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(1, "0")]);

    let err = Ranker::new(&store, &backend)
        .rank(99, Policy::top_k(1))
        .unwrap_err();
    assert!(matches!(err, RankError::NotFound(99)));
}

#[test]
fn histogram_cannot_be_ranked() {
    let store = InMemoryStore::new();
    let err = Ranker::new(&store, &Backend::Histogram)
        .rank(1, Policy::top_k(1))
        .unwrap_err();
    assert!(matches!(err, RankError::UnsupportedBackend(name) if name == "histogram"));
}

#[test]
fn invalid_threshold_is_rejected() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(1, "0")]);
    let err = Ranker::new(&store, &backend)
        .rank(1, Policy::threshold(-1.0))
        .unwrap_err();
    assert!(matches!(err, RankError::InvalidConfig(_)));
}

#[test]
fn failing_candidates_are_skipped() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(1, "0"), (2, "garbage"), (3, "0.3")]);

    let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(5)).unwrap();
    assert_eq!(ids(&ranking), vec![3]);
    assert_eq!(ranking.scanned, 1);
}

#[test]
fn similarity_scores_rank_closest_first() {
    let store = InMemoryStore::new();
    let backend = Backend::External(ExternalAdapter::new(
        ExternalKind::Ctph,
        Arc::new(NumberLine {
            metric: ScoreMetric::Similarity { max: 100.0 },
        }),
    ));
    seed(&store, &backend, &[(1, "50"), (2, "40"), (3, "49")]);

    let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(2)).unwrap();
    assert_eq!(ids(&ranking), vec![3, 2]);
    assert_eq!(ranking.matches[0].score, 1.0);
    assert_eq!(ranking.matches[1].score, 10.0);
}

#[test]
fn bitshred_vectors_rank_by_jaccard_distance() {
    let store = InMemoryStore::new();
    let backend = Backend::Bitshred(BitshredConfig::new().with_m(64));
    let vector = |bits: &[usize]| {
        let mut v = BitVector::zeros(64);
        for &bit in bits {
            v.set(bit);
        }
        backend.encode(&Fingerprint::Bits(v)).unwrap()
    };
    let rows = vec![
        FingerprintRow {
            id: 1,
            bytes: vector(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
        },
        FingerprintRow {
            id: 2,
            bytes: vector(&[0, 1, 2, 3, 4, 5, 6, 7]),
        },
        FingerprintRow {
            id: 3,
            bytes: vector(&[0]),
        },
    ];
    store.persist_page(&backend.space(), &rows).unwrap();

    let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(1)).unwrap();
    assert_eq!(ids(&ranking), vec![2]);
    assert!((ranking.matches[0].score - 0.2).abs() < 1e-12);

    let all = Ranker::new(&store, &backend).rank(1, Policy::top_k(2)).unwrap();
    assert!((all.matches[1].score - 0.9).abs() < 1e-12);
}

#[test]
fn query_fingerprint_decodes_stored_bytes() {
    let store = InMemoryStore::new();
    let backend = number_backend();
    seed(&store, &backend, &[(7, "0.7")]);
    let fp = Ranker::new(&store, &backend).query_fingerprint(7).unwrap();
    assert_eq!(fp, Fingerprint::Digest("0.7".into()));
}
