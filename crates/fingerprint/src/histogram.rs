//! Byte-bigram histograms.
//!
//! Counts every pair of adjacent bytes into a 256×256 matrix. Only non-zero
//! cells are kept, since typical payloads touch a small fraction of the
//! 65536 possible bigrams. Normalization by the largest count happens at
//! comparison time so the stored form stays integral.
//!
//! Comparing two histograms walks the full flattened matrix. It is by far the
//! most expensive comparison in the crate and must only be run for explicitly
//! requested pairs.

use serde::{Deserialize, Serialize};

use crate::config::FingerprintError;

/// Number of cells in the flattened bigram matrix.
pub const BIGRAM_CELLS: usize = 256 * 256;

/// Sparse bigram occurrence counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(u16, u32)>", into = "Vec<(u16, u32)>")]
pub struct BigramHistogram {
    /// `(first * 256 + second, count)` pairs sorted by cell, counts > 0.
    cells: Vec<(u16, u32)>,
}

impl TryFrom<Vec<(u16, u32)>> for BigramHistogram {
    type Error = FingerprintError;

    fn try_from(cells: Vec<(u16, u32)>) -> Result<Self, Self::Error> {
        BigramHistogram::from_cells(cells)
    }
}

impl From<BigramHistogram> for Vec<(u16, u32)> {
    fn from(hist: BigramHistogram) -> Self {
        hist.cells
    }
}

impl BigramHistogram {
    /// Build a histogram from sparse cells, checking ordering and counts.
    pub fn from_cells(cells: Vec<(u16, u32)>) -> Result<Self, FingerprintError> {
        if cells.is_empty() {
            return Err(FingerprintError::Decode("empty bigram histogram".into()));
        }
        if cells.iter().any(|&(_, count)| count == 0) {
            return Err(FingerprintError::Decode("zero bigram count stored".into()));
        }
        if cells.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
            return Err(FingerprintError::Decode(
                "bigram cells are not strictly ascending".into(),
            ));
        }
        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[(u16, u32)] {
        &self.cells
    }

    /// Count for the bigram `(first, second)`.
    pub fn count(&self, first: u8, second: u8) -> u32 {
        let cell = u16::from(first) << 8 | u16::from(second);
        self.cells
            .binary_search_by_key(&cell, |&(c, _)| c)
            .map(|idx| self.cells[idx].1)
            .unwrap_or(0)
    }

    /// Largest observed count.
    pub fn max_count(&self) -> u32 {
        self.cells.iter().map(|&(_, count)| count).max().unwrap_or(0)
    }

    /// Dense matrix normalized into `[0, 1]` by the largest count.
    pub fn normalized(&self) -> Vec<f64> {
        let mut dense = vec![0.0; BIGRAM_CELLS];
        let max = f64::from(self.max_count());
        if max == 0.0 {
            return dense;
        }
        for &(cell, count) in &self.cells {
            dense[usize::from(cell)] = f64::from(count) / max;
        }
        dense
    }

    /// Euclidean distance between the two normalized matrices.
    pub fn euclidean_distance(&self, other: &BigramHistogram) -> f64 {
        let left = self.normalized();
        let right = other.normalized();
        left.iter()
            .zip(&right)
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// Count the byte bigrams of `payload`.
pub fn bigram_histogram(payload: &[u8]) -> Result<BigramHistogram, FingerprintError> {
    if payload.len() < 2 {
        return Err(FingerprintError::InputTooShort {
            required: 2,
            actual: payload.len(),
        });
    }

    let mut dense = vec![0u32; BIGRAM_CELLS];
    for pair in payload.windows(2) {
        let cell = usize::from(pair[0]) << 8 | usize::from(pair[1]);
        dense[cell] = dense[cell].saturating_add(1);
    }

    let cells = dense
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(cell, &count)| (cell as u16, count))
        .collect();
    Ok(BigramHistogram { cells })
}
