//! Streaming computation of missing fingerprints.
//!
//! The computer walks the content store in keyset-paged order:
//!
//! 1. fetch up to `page_size` records that have no fingerprint in the
//!    backend's space and whose id is past the last one seen;
//! 2. compute a fingerprint for each record, logging and skipping records the
//!    backend rejects;
//! 3. persist all successes of the page in one atomic write;
//! 4. repeat until the store reports no more rows.
//!
//! Memory use is bounded by one page. A failed write aborts the run but never
//! leaves a partial page behind, so rerunning simply resumes.

use fingerprint::{Backend, ContentId, Fingerprint, FingerprintError};
use serde::{Deserialize, Serialize};
use store::{ContentStore, DEFAULT_COMPUTE_PAGE, FingerprintRow, MissingQuery, Page, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::{MetricsSpan, PageOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Records fetched, computed and persisted together.
    pub page_size: usize,
}

impl BatchOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.page_size == 0 {
            return Err(BatchError::InvalidConfig(
                "page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_COMPUTE_PAGE,
        }
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Fingerprints computed successfully.
    pub computed: usize,
    /// Rows the store inserted. Lower than `computed` only when another
    /// writer got there first.
    pub persisted: usize,
    /// Records the backend rejected.
    pub skipped: usize,
    /// Pages fetched and processed.
    pub pages: usize,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid batch config: {0}")]
    InvalidConfig(String),

    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("failed to fetch page after {after:?}: {source}")]
    Fetch {
        after: Option<ContentId>,
        #[source]
        source: StoreError,
    },

    /// The in-flight page was not written; earlier pages are durable.
    #[error("failed to persist page ({committed} rows committed before it): {source}")]
    Persistence {
        committed: usize,
        #[source]
        source: StoreError,
    },
}

fn log_fingerprint(id: ContentId, fingerprint: &Fingerprint) {
    match fingerprint {
        Fingerprint::Bits(bits) => debug!(
            content_id = id,
            bits_set = bits.count_ones(),
            density = bits.density(),
            "bitshred computed"
        ),
        Fingerprint::Bigrams(hist) => debug!(
            content_id = id,
            cells = hist.cells().len(),
            max_count = hist.max_count(),
            "histogram computed"
        ),
        Fingerprint::Digest(digest) => debug!(content_id = id, digest = %digest, "digest computed"),
    }
}

/// Compute and persist every fingerprint `backend` is missing in `store`.
///
/// Records the backend rejects (too short, degenerate input) are logged at
/// `warn` and counted in [`BatchReport::skipped`]; they never abort the run.
pub fn compute_missing(
    store: &dyn ContentStore,
    backend: &Backend,
    options: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    options.validate()?;
    backend.validate()?;

    let space = backend.space();
    let mut report = BatchReport::default();
    let mut cursor: Option<ContentId> = None;

    info!(space = %space, page_size = options.page_size, "batch started");

    loop {
        let span = MetricsSpan::start();
        let query = MissingQuery {
            after: cursor,
            min_len: backend.skip_below(),
            limit: options.page_size,
        };

        let records = match store.missing_page(&space, &query) {
            Ok(Page::Rows(records)) => records,
            Ok(Page::Done) => break,
            Err(source) => {
                if let Some(span) = span {
                    span.record_page(space.tag(), Err(()));
                }
                return Err(BatchError::Fetch {
                    after: cursor,
                    source,
                });
            }
        };
        cursor = records.last().map(|record| record.id);

        let mut rows = Vec::with_capacity(records.len());
        let mut skipped = 0usize;
        for record in &records {
            let Some(payload) = record.payload.as_deref() else {
                warn!(content_id = record.id, "record has no payload, skipping");
                skipped += 1;
                continue;
            };
            match backend.compute(payload) {
                Ok(fingerprint) => {
                    log_fingerprint(record.id, &fingerprint);
                    rows.push(FingerprintRow {
                        id: record.id,
                        bytes: backend.encode(&fingerprint)?,
                    });
                }
                Err(err) if err.is_record_level() => {
                    warn!(content_id = record.id, length = payload.len(), error = %err, "skipping record");
                    skipped += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let persisted = if rows.is_empty() {
            0
        } else {
            match store.persist_page(&space, &rows) {
                Ok(inserted) => inserted,
                Err(source) => {
                    if let Some(span) = span {
                        span.record_page(space.tag(), Err(()));
                    }
                    return Err(BatchError::Persistence {
                        committed: report.persisted,
                        source,
                    });
                }
            }
        };

        report.pages += 1;
        report.computed += rows.len();
        report.persisted += persisted;
        report.skipped += skipped;

        info!(
            space = %space,
            page = report.pages,
            fetched = records.len(),
            computed = rows.len(),
            skipped,
            persisted,
            "page done"
        );
        if let Some(span) = span {
            span.record_page(
                space.tag(),
                Ok(PageOutcome {
                    fetched: records.len(),
                    computed: rows.len(),
                    skipped,
                    persisted,
                }),
            );
        }
    }

    info!(
        space = %space,
        computed = report.computed,
        persisted = report.persisted,
        skipped = report.skipped,
        pages = report.pages,
        "batch finished"
    );
    Ok(report)
}
