//! Redb-backed persistent store.
//!
//! Layout:
//!
//! - `content`: `u64 -> bincode(StoredContent)`, compressed.
//! - `fp/<space tag>`: `u64 -> encoded fingerprint`, compressed. One table
//!   per fingerprint space, created on first write.
//! - `histogram_distance`: `(lesser, greater) -> f64`.
//! - `meta`: `&str -> &str`, holds the compression codec the file was
//!   created with. Opening it with another codec is rejected.
//!
//! Every page write is a single write transaction, so a page is either fully
//! visible or not at all.

use std::path::Path;
use std::sync::Arc;

use fingerprint::{ContentId, FingerprintSpace};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};

use crate::{
    canonical_pair, CompressionCodec, CompressionConfig, ContentRecord, ContentStore,
    FingerprintRow, MissingQuery, Page, StoreError, StoredContent,
};

const CONTENT_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("content");
const DISTANCE_TABLE: TableDefinition<(u64, u64), f64> =
    TableDefinition::new("histogram_distance");
const META_TABLE: TableDefinition<&str, &str> = TableDefinition::new("meta");
const CODEC_KEY: &str = "compression";

fn codec_name(codec: CompressionCodec) -> &'static str {
    match codec {
        CompressionCodec::None => "none",
        CompressionCodec::Zstd => "zstd",
    }
}

fn fingerprint_table_name(space: &FingerprintSpace) -> String {
    format!("fp/{}", space.tag())
}

/// First key strictly after the cursor, `None` when the cursor is the last
/// possible id.
fn range_start(after: Option<ContentId>) -> Option<u64> {
    match after {
        Some(id) => id.checked_add(1),
        None => Some(0),
    }
}

/// Persistent store in a single redb file.
pub struct RedbStore {
    db: Arc<Database>,
    compression: CompressionConfig,
}

impl RedbStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, compression: CompressionConfig) -> Result<Self, StoreError> {
        compression.validate()?;
        let db = Database::create(path).map_err(StoreError::backend)?;

        let write_txn = db.begin_write().map_err(StoreError::backend)?;
        {
            let _content = write_txn
                .open_table(CONTENT_TABLE)
                .map_err(StoreError::backend)?;
            let _distances = write_txn
                .open_table(DISTANCE_TABLE)
                .map_err(StoreError::backend)?;

            let mut meta = write_txn
                .open_table(META_TABLE)
                .map_err(StoreError::backend)?;
            let wanted = codec_name(compression.codec);
            let stored = meta
                .get(CODEC_KEY)
                .map_err(StoreError::backend)?
                .map(|value| value.value().to_string());
            match stored {
                Some(stored) if stored != wanted => {
                    return Err(StoreError::Config(format!(
                        "database was created with compression '{stored}', opened with '{wanted}'"
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert(CODEC_KEY, wanted)
                        .map_err(StoreError::backend)?;
                }
            }
        }
        write_txn.commit().map_err(StoreError::backend)?;

        Ok(Self {
            db: Arc::new(db),
            compression,
        })
    }

    pub fn compression(&self) -> CompressionConfig {
        self.compression
    }
}

impl ContentStore for RedbStore {
    fn put_content(&self, id: ContentId, payload: Option<&[u8]>) -> Result<(), StoreError> {
        let encoded = self.compression.encode_content(&StoredContent {
            payload: payload.map(<[u8]>::to_vec),
        })?;

        let write_txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = write_txn
                .open_table(CONTENT_TABLE)
                .map_err(StoreError::backend)?;
            let exists = table.get(id).map_err(StoreError::backend)?.is_some();
            if exists {
                return Err(StoreError::DuplicateContent(id));
            }
            table
                .insert(id, encoded.as_slice())
                .map_err(StoreError::backend)?;
        }
        write_txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = read_txn
            .open_table(CONTENT_TABLE)
            .map_err(StoreError::backend)?;
        match table.get(id).map_err(StoreError::backend)? {
            Some(value) => {
                let stored = self.compression.decode_content(value.value())?;
                Ok(Some(ContentRecord {
                    id,
                    payload: stored.payload,
                }))
            }
            None => Ok(None),
        }
    }

    fn next_content_id(&self) -> Result<ContentId, StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = read_txn
            .open_table(CONTENT_TABLE)
            .map_err(StoreError::backend)?;
        let last = table.last().map_err(StoreError::backend)?;
        Ok(last.map_or(1, |(key, _)| key.value().saturating_add(1)))
    }

    fn missing_page(
        &self,
        space: &FingerprintSpace,
        query: &MissingQuery,
    ) -> Result<Page, StoreError> {
        let Some(start) = range_start(query.after) else {
            return Ok(Page::Done);
        };

        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let content = read_txn
            .open_table(CONTENT_TABLE)
            .map_err(StoreError::backend)?;
        let name = fingerprint_table_name(space);
        let fingerprints = match read_txn.open_table(TableDefinition::<u64, &[u8]>::new(&name)) {
            Ok(table) => Some(table),
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(StoreError::backend(e)),
        };

        let mut rows = Vec::new();
        for item in content.range(start..).map_err(StoreError::backend)? {
            if rows.len() >= query.limit {
                break;
            }
            let (key, value) = item.map_err(StoreError::backend)?;
            let id = key.value();
            if let Some(table) = &fingerprints {
                if table.get(id).map_err(StoreError::backend)?.is_some() {
                    continue;
                }
            }
            let stored = self.compression.decode_content(value.value())?;
            match stored.payload {
                Some(payload) if payload.len() >= query.min_len => rows.push(ContentRecord {
                    id,
                    payload: Some(payload),
                }),
                _ => continue,
            }
        }
        Ok(Page::from_rows(rows))
    }

    fn persist_page(
        &self,
        space: &FingerprintSpace,
        rows: &[FingerprintRow],
    ) -> Result<usize, StoreError> {
        let mut encoded = Vec::with_capacity(rows.len());
        for row in rows {
            encoded.push((row.id, self.compression.compress(&row.bytes)?));
        }

        let name = fingerprint_table_name(space);
        let write_txn = self.db.begin_write().map_err(StoreError::backend)?;
        let mut inserted = 0;
        {
            let mut table = write_txn
                .open_table(TableDefinition::<u64, &[u8]>::new(&name))
                .map_err(StoreError::backend)?;
            for (id, bytes) in &encoded {
                let exists = table.get(*id).map_err(StoreError::backend)?.is_some();
                if !exists {
                    table
                        .insert(*id, bytes.as_slice())
                        .map_err(StoreError::backend)?;
                    inserted += 1;
                }
            }
        }
        write_txn.commit().map_err(StoreError::backend)?;
        Ok(inserted)
    }

    fn fingerprint(
        &self,
        space: &FingerprintSpace,
        id: ContentId,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let name = fingerprint_table_name(space);
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = match read_txn.open_table(TableDefinition::<u64, &[u8]>::new(&name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StoreError::backend(e)),
        };
        match table.get(id).map_err(StoreError::backend)? {
            Some(value) => Ok(Some(self.compression.decompress(value.value())?)),
            None => Ok(None),
        }
    }

    fn fingerprint_page(
        &self,
        space: &FingerprintSpace,
        after: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FingerprintRow>, StoreError> {
        let Some(start) = range_start(after) else {
            return Ok(Vec::new());
        };

        let name = fingerprint_table_name(space);
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = match read_txn.open_table(TableDefinition::<u64, &[u8]>::new(&name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::backend(e)),
        };

        let mut rows = Vec::new();
        for item in table.range(start..).map_err(StoreError::backend)?.take(limit) {
            let (key, value) = item.map_err(StoreError::backend)?;
            rows.push(FingerprintRow {
                id: key.value(),
                bytes: self.compression.decompress(value.value())?,
            });
        }
        Ok(rows)
    }

    fn pair_distance(&self, a: ContentId, b: ContentId) -> Result<Option<f64>, StoreError> {
        let Some(key) = canonical_pair(a, b) else {
            return Ok(None);
        };
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = read_txn
            .open_table(DISTANCE_TABLE)
            .map_err(StoreError::backend)?;
        Ok(table
            .get(key)
            .map_err(StoreError::backend)?
            .map(|value| value.value()))
    }

    fn put_pair_distance(
        &self,
        a: ContentId,
        b: ContentId,
        score: f64,
    ) -> Result<(), StoreError> {
        let Some(key) = canonical_pair(a, b) else {
            return Err(StoreError::backend(format!("self-pair ({a}, {a})")));
        };
        let write_txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = write_txn
                .open_table(DISTANCE_TABLE)
                .map_err(StoreError::backend)?;
            let exists = table.get(key).map_err(StoreError::backend)?.is_some();
            if !exists {
                table.insert(key, score).map_err(StoreError::backend)?;
            }
        }
        write_txn.commit().map_err(StoreError::backend)?;
        Ok(())
    }
}
