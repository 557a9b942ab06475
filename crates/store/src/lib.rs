//! # sid-store
//!
//! Persistence for content records, fingerprints and pairwise histogram
//! distances.
//!
//! The [`ContentStore`] trait is the only thing the batch computer and the
//! ranker see. Two implementations ship with the crate:
//!
//! - [`InMemoryStore`]: `BTreeMap`s behind a `RwLock`, for tests and one-shot
//!   runs.
//! - [`RedbStore`]: an embedded redb database (feature `backend-redb`, on by
//!   default). One table per fingerprint space, blobs optionally
//!   zstd-compressed.
//!
//! ## Paging
//!
//! Both fetch operations are keyset-paged on the content id. A caller passes
//! the last id it has seen and receives the next rows in ascending id order,
//! so a record that could not be fingerprinted is never handed out twice in
//! the same run.
//!
//! ## Example
//!
//! ```
//! use fingerprint::FingerprintSpace;
//! use store::{ContentStore, InMemoryStore, MissingQuery, Page};
//!
//! let store = InMemoryStore::new();
//! store.put_content(1, Some(b"first payload")).unwrap();
//! store.put_content(2, None).unwrap();
//!
//! let space = FingerprintSpace::new("histogram", "histogram");
//! let page = store.missing_page(&space, &MissingQuery::new(10)).unwrap();
//! match page {
//!     Page::Rows(rows) => assert_eq!(rows.len(), 1),
//!     Page::Done => unreachable!(),
//! }
//! ```

mod memory;
#[cfg(feature = "backend-redb")]
mod redb;

use bincode::config::standard;
use bincode::error::{DecodeError, EncodeError};
use bincode::serde::{decode_from_slice, encode_to_vec};
use fingerprint::{ContentId, FingerprintSpace};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zstd::{decode_all, encode_all};

pub use crate::memory::InMemoryStore;
#[cfg(feature = "backend-redb")]
pub use crate::redb::RedbStore;

/// Default rows per page when filling in missing fingerprints.
pub const DEFAULT_COMPUTE_PAGE: usize = 23;

/// Default rows per page when scanning fingerprints for ranking.
pub const DEFAULT_RANK_PAGE: usize = 89;

/// A stored piece of content. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    pub payload: Option<Vec<u8>>,
}

impl ContentRecord {
    /// Payload length in bytes, `0` when the payload is absent.
    pub fn length(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }
}

/// On-disk form of a content row; the id lives in the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredContent {
    pub payload: Option<Vec<u8>>,
}

/// Selection of records that still need a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingQuery {
    /// Only ids strictly greater than this are returned.
    pub after: Option<ContentId>,
    /// Payloads shorter than this are left out.
    pub min_len: usize,
    pub limit: usize,
}

impl MissingQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            after: None,
            min_len: 0,
            limit,
        }
    }

    pub fn after(mut self, id: ContentId) -> Self {
        self.after = Some(id);
        self
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

/// Result of a page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// At least one record, ascending by id.
    Rows(Vec<ContentRecord>),
    /// Nothing left to process.
    Done,
}

impl Page {
    pub(crate) fn from_rows(rows: Vec<ContentRecord>) -> Self {
        if rows.is_empty() {
            Page::Done
        } else {
            Page::Rows(rows)
        }
    }
}

/// A stored fingerprint in its encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintRow {
    pub id: ContentId,
    pub bytes: Vec<u8>,
}

/// Order a pair as `(lesser, greater)`. Returns `None` for a self-pair.
pub fn canonical_pair(a: ContentId, b: ContentId) -> Option<(ContentId, ContentId)> {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => Some((a, b)),
        std::cmp::Ordering::Greater => Some((b, a)),
        std::cmp::Ordering::Equal => None,
    }
}

/// Storage capability shared by the batch computer, the ranker and the
/// pair-distance helpers.
///
/// Fingerprints cross this boundary already encoded; the store never needs to
/// know which backend produced them.
pub trait ContentStore: Send + Sync {
    /// Store a content record. Content is immutable, so writing an existing
    /// id is rejected.
    fn put_content(&self, id: ContentId, payload: Option<&[u8]>) -> Result<(), StoreError>;

    fn content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError>;

    /// Smallest id greater than every stored one, starting at 1.
    fn next_content_id(&self) -> Result<ContentId, StoreError>;

    /// Up to `query.limit` records with a payload of at least
    /// `query.min_len` bytes and no fingerprint in `space`.
    fn missing_page(
        &self,
        space: &FingerprintSpace,
        query: &MissingQuery,
    ) -> Result<Page, StoreError>;

    /// Write a page of fingerprints as one atomic unit.
    ///
    /// Rows whose key already holds a fingerprint are left untouched. Returns
    /// the number of rows actually inserted.
    fn persist_page(
        &self,
        space: &FingerprintSpace,
        rows: &[FingerprintRow],
    ) -> Result<usize, StoreError>;

    fn fingerprint(
        &self,
        space: &FingerprintSpace,
        id: ContentId,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Up to `limit` fingerprints of `space` with id greater than `after`,
    /// ascending by id.
    fn fingerprint_page(
        &self,
        space: &FingerprintSpace,
        after: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FingerprintRow>, StoreError>;

    /// Stored histogram distance of an unordered pair.
    fn pair_distance(&self, a: ContentId, b: ContentId) -> Result<Option<f64>, StoreError>;

    /// Record a histogram distance under the `(lesser, greater)` key. An
    /// already stored value is kept.
    fn put_pair_distance(&self, a: ContentId, b: ContentId, score: f64)
        -> Result<(), StoreError>;
}

/// Compression codec applied to stored blobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    None,
    #[default]
    Zstd,
}

/// Compression behavior for the persistent store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub codec: CompressionCodec,
    /// Zstd level, 1..=22.
    #[serde(default = "default_level")]
    pub level: i32,
}

fn default_level() -> i32 {
    3
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: default_level(),
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.codec == CompressionCodec::Zstd && !(1..=22).contains(&self.level) {
            return Err(StoreError::Config(format!(
                "zstd level must be in 1..=22, got {}",
                self.level
            )));
        }
        Ok(())
    }

    pub(crate) fn compress(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(encode_all(data, self.level)?),
        }
    }

    pub(crate) fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(decode_all(data)?),
        }
    }

    pub(crate) fn encode_content(&self, content: &StoredContent) -> Result<Vec<u8>, StoreError> {
        let encoded = encode_to_vec(content, standard())?;
        self.compress(&encoded)
    }

    pub(crate) fn decode_content(&self, data: &[u8]) -> Result<StoredContent, StoreError> {
        let decompressed = self.decompress(data)?;
        let (content, _) = decode_from_slice(&decompressed, standard())?;
        Ok(content)
    }
}

/// Which store implementation to open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendConfig {
    #[default]
    InMemory,
    /// Embedded redb database file.
    Redb { path: String },
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }
}

/// Store selection plus blob compression.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    pub compression: CompressionConfig,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    /// Open the configured store.
    pub fn build(&self) -> Result<Box<dyn ContentStore>, StoreError> {
        self.compression.validate()?;
        match &self.backend {
            BackendConfig::InMemory => Ok(Box::new(InMemoryStore::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbStore::open(path, self.compression)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(StoreError::backend("redb backend disabled at compile time"))
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("serialization encode error: {0}")]
    Encode(String),
    #[error("serialization decode error: {0}")]
    Decode(String),
    #[error("compression error: {0}")]
    Compression(String),
    /// Content ids are write-once.
    #[error("content {0} already exists")]
    DuplicateContent(ContentId),
    #[error("invalid store config: {0}")]
    Config(String),
}

impl From<EncodeError> for StoreError {
    fn from(e: EncodeError) -> Self {
        StoreError::Encode(e.to_string())
    }
}

impl From<DecodeError> for StoreError {
    fn from(e: DecodeError) -> Self {
        StoreError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Compression(e.to_string())
    }
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
