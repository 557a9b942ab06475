use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use fingerprint::{ContentId, FingerprintSpace};

use crate::{
    canonical_pair, ContentRecord, ContentStore, FingerprintRow, MissingQuery, Page, StoreError,
};

#[derive(Default)]
struct State {
    content: BTreeMap<ContentId, Option<Vec<u8>>>,
    /// Keyed by space tag.
    fingerprints: HashMap<String, BTreeMap<ContentId, Vec<u8>>>,
    distances: HashMap<(ContentId, ContentId), f64>,
}

/// Ephemeral store backed by ordered maps behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

fn after_bound(after: Option<ContentId>) -> Bound<ContentId> {
    match after {
        Some(id) => Bound::Excluded(id),
        None => Bound::Unbounded,
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }
}

impl ContentStore for InMemoryStore {
    fn put_content(&self, id: ContentId, payload: Option<&[u8]>) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        if guard.content.contains_key(&id) {
            return Err(StoreError::DuplicateContent(id));
        }
        guard.content.insert(id, payload.map(<[u8]>::to_vec));
        Ok(())
    }

    fn content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError> {
        let guard = self.read()?;
        Ok(guard.content.get(&id).map(|payload| ContentRecord {
            id,
            payload: payload.clone(),
        }))
    }

    fn next_content_id(&self) -> Result<ContentId, StoreError> {
        let guard = self.read()?;
        Ok(guard
            .content
            .keys()
            .next_back()
            .map_or(1, |last| last.saturating_add(1)))
    }

    fn missing_page(
        &self,
        space: &FingerprintSpace,
        query: &MissingQuery,
    ) -> Result<Page, StoreError> {
        let guard = self.read()?;
        let done = guard.fingerprints.get(space.tag());
        let rows = guard
            .content
            .range((after_bound(query.after), Bound::Unbounded))
            .filter(|(id, _)| done.is_none_or(|table| !table.contains_key(id)))
            .filter_map(|(&id, payload)| {
                payload
                    .as_ref()
                    .filter(|bytes| bytes.len() >= query.min_len)
                    .map(|bytes| ContentRecord {
                        id,
                        payload: Some(bytes.clone()),
                    })
            })
            .take(query.limit)
            .collect();
        Ok(Page::from_rows(rows))
    }

    fn persist_page(
        &self,
        space: &FingerprintSpace,
        rows: &[FingerprintRow],
    ) -> Result<usize, StoreError> {
        let mut guard = self.write()?;
        let table = guard
            .fingerprints
            .entry(space.tag().to_string())
            .or_default();
        let mut inserted = 0;
        for row in rows {
            if !table.contains_key(&row.id) {
                table.insert(row.id, row.bytes.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn fingerprint(
        &self,
        space: &FingerprintSpace,
        id: ContentId,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.read()?;
        Ok(guard
            .fingerprints
            .get(space.tag())
            .and_then(|table| table.get(&id).cloned()))
    }

    fn fingerprint_page(
        &self,
        space: &FingerprintSpace,
        after: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FingerprintRow>, StoreError> {
        let guard = self.read()?;
        let Some(table) = guard.fingerprints.get(space.tag()) else {
            return Ok(Vec::new());
        };
        Ok(table
            .range((after_bound(after), Bound::Unbounded))
            .take(limit)
            .map(|(&id, bytes)| FingerprintRow {
                id,
                bytes: bytes.clone(),
            })
            .collect())
    }

    fn pair_distance(&self, a: ContentId, b: ContentId) -> Result<Option<f64>, StoreError> {
        let Some(key) = canonical_pair(a, b) else {
            return Ok(None);
        };
        Ok(self.read()?.distances.get(&key).copied())
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
        self.write()?.distances.entry(key).or_insert(score);
        Ok(())
    }
}
