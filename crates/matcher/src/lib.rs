//! # sid-matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` answers "which stored content is closest to this one?". It loads
//! the query's fingerprint from a [`store::ContentStore`], streams every other
//! fingerprint of the same space in fixed-size pages and keeps the best
//! matches under a [`Policy`].
//!
//! Search is exhaustive: there is no bucket index, so a ranking costs one
//! comparison per stored fingerprint while memory stays bounded by the page
//! size plus the kept matches.
//!
//! ## Core Types
//!
//! - [`Policy`]: `TopK { k }` keeps the `k` closest candidates with a bounded
//!   heap, `Threshold { delta }` keeps every candidate at distance `<= delta`.
//! - [`RankOptions`]: page size of the scan (89 rows by default).
//! - [`Ranking`]: the query id plus matches ascending by distance, ties by id.
//! - [`Ranker`]: borrows a store and a [`fingerprint::Backend`] and runs
//!   rankings.
//!
//! ## Example Usage
//!
//! ```
//! use fingerprint::{Backend, BitshredConfig};
//! use matcher::{Policy, Ranker};
//! use store::{ContentStore, FingerprintRow, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! let backend = Backend::Bitshred(BitshredConfig::new().with_m(1024));
//!
//! let payloads: [&[u8]; 3] = [b"ABCDEFGHIJKLMNOP", b"ABCDEFGHIJKLMNOQ", b"zyxwvutsrqponmlk"];
//! let rows: Vec<FingerprintRow> = payloads
//!     .iter()
//!     .zip(1u64..)
//!     .map(|(payload, id)| {
//!         let fp = backend.compute(payload).unwrap();
//!         FingerprintRow { id, bytes: backend.encode(&fp).unwrap() }
//!     })
//!     .collect();
//! store.persist_page(&backend.space(), &rows).unwrap();
//!
//! let ranking = Ranker::new(&store, &backend).rank(1, Policy::top_k(1)).unwrap();
//! assert_eq!(ranking.matches[0].content_id, 2);
//! ```

pub mod engine;
pub mod types;

pub use crate::engine::Ranker;
pub use crate::types::{Policy, RankError, RankOptions, RankedMatch, Ranking};
