//! Read-only view over the rectangular numeric matrix (component C7).
//!
//! Ingestion and normalization are the caller's concern (spec §1); this
//! module only validates the shape it is handed and exposes subsequence
//! windows and envelope caching over it.

use serde::{Deserialize, Serialize};

use crate::distance::envelope::{Envelope, EnvelopeCache};
use crate::error::{GenexError, GenexResult};

/// A single row of the dataset, exposed as a plain slice view.
pub type Series = [f64];

/// A length-`ℓ` window `(series_index, start)` into the dataset. The
/// length is implied by the enclosing group and is not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub series_index: usize,
    pub start: usize,
}

impl Coord {
    pub fn new(series_index: usize, start: usize) -> Self {
        Self { series_index, start }
    }
}

/// A read-only rectangular matrix of `N` rows by `L_max` columns.
pub struct Dataset {
    rows: Vec<Vec<f64>>,
    item_length: usize,
    /// Per-series envelope cache. Locked per series so two lengths building
    /// concurrently and requesting the *same* band block briefly rather
    /// than recompute (spec §5).
    envelope_cache: Vec<EnvelopeCache>,
}

impl Dataset {
    /// Builds a dataset view over already-ingested, already-normalized
    /// rows. Every row must have the same length and every value must be
    /// finite.
    pub fn new(rows: Vec<Vec<f64>>) -> GenexResult<Self> {
        if rows.is_empty() {
            return Err(GenexError::EmptyDataset);
        }
        let item_length = rows[0].len();
        if item_length == 0 {
            return Err(GenexError::EmptyDataset);
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != item_length {
                return Err(GenexError::IncompatibleDataset {
                    expected: (rows.len(), item_length),
                    found: (rows.len(), row.len()),
                });
            }
            if let Some(position) = row.iter().position(|v| !v.is_finite()) {
                return Err(GenexError::NonFiniteValue {
                    series_index: i,
                    position,
                });
            }
        }
        let envelope_cache = (0..rows.len()).map(|_| EnvelopeCache::new()).collect();
        Ok(Self {
            rows,
            item_length,
            envelope_cache,
        })
    }

    pub fn item_count(&self) -> usize {
        self.rows.len()
    }

    pub fn item_length(&self) -> usize {
        self.item_length
    }

    /// Returns the length-`(end - start)` window `[start, end)` of series
    /// `index`.
    pub fn time_series(&self, index: usize, start: usize, end: usize) -> GenexResult<&Series> {
        if index >= self.rows.len() {
            return Err(GenexError::IndexOutOfRange {
                what: "series",
                index: index as i64,
                bound: self.rows.len(),
            });
        }
        if start >= end || end > self.item_length {
            return Err(GenexError::IndexOutOfRange {
                what: "window",
                index: end as i64,
                bound: self.item_length,
            });
        }
        Ok(&self.rows[index][start..end])
    }

    /// Returns the window named by `coord` at the given length.
    pub fn window(&self, coord: Coord, length: usize) -> GenexResult<&Series> {
        self.time_series(coord.series_index, coord.start, coord.start + length)
    }

    /// Upper Keogh envelope for the length-`length` window at `coord`, at
    /// the given band, computed lazily and cached per `(series, start,
    /// length, band)` (spec §4.2: "cached per series per band"). This is
    /// the path `Group`/`LocalLengthGroupSpace` use for member/centroid
    /// envelopes during a scan, so the same window's envelope is computed
    /// once no matter how many times the cascade touches it.
    pub fn keogh_upper(&self, coord: Coord, length: usize, band: usize) -> GenexResult<std::sync::Arc<Envelope>> {
        self.envelope_for(coord, length, band)
    }

    /// Lower Keogh envelope for the length-`length` window at `coord`, at
    /// the given band.
    pub fn keogh_lower(&self, coord: Coord, length: usize, band: usize) -> GenexResult<std::sync::Arc<Envelope>> {
        self.envelope_for(coord, length, band)
    }

    fn envelope_for(&self, coord: Coord, length: usize, band: usize) -> GenexResult<std::sync::Arc<Envelope>> {
        if coord.series_index >= self.rows.len() {
            return Err(GenexError::IndexOutOfRange {
                what: "series",
                index: coord.series_index as i64,
                bound: self.rows.len(),
            });
        }
        let series = self.window(coord, length)?;
        Ok(self.envelope_cache[coord.series_index].get_or_compute(coord.start, length, band, series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_dataset() {
        assert!(matches!(Dataset::new(vec![]), Err(GenexError::EmptyDataset)));
    }

    #[test]
    fn rejects_ragged_rows() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0]];
        assert!(matches!(
            Dataset::new(rows),
            Err(GenexError::IncompatibleDataset { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        let rows = vec![vec![1.0, f64::NAN, 3.0]];
        assert!(Dataset::new(rows).is_err());
    }

    #[test]
    fn windows_round_trip() {
        let rows = vec![vec![0.0, 1.0, 2.0, 3.0, 4.0]];
        let ds = Dataset::new(rows).unwrap();
        assert_eq!(ds.item_count(), 1);
        assert_eq!(ds.item_length(), 5);
        let w = ds.time_series(0, 1, 4).unwrap();
        assert_eq!(w, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn out_of_range_window_is_an_error() {
        let rows = vec![vec![0.0, 1.0, 2.0]];
        let ds = Dataset::new(rows).unwrap();
        assert!(ds.time_series(0, 2, 10).is_err());
        assert!(ds.time_series(5, 0, 1).is_err());
    }

    #[test]
    fn envelope_is_cached() {
        let rows = vec![vec![0.0, 5.0, 1.0, 3.0, 2.0]];
        let ds = Dataset::new(rows).unwrap();
        let coord = Coord::new(0, 0);
        let e1 = ds.keogh_upper(coord, 5, 1).unwrap();
        let e2 = ds.keogh_upper(coord, 5, 1).unwrap();
        assert!(std::sync::Arc::ptr_eq(&e1, &e2));
    }

    #[test]
    fn envelope_cache_distinguishes_windows_and_bands() {
        let rows = vec![vec![0.0, 5.0, 1.0, 3.0, 2.0]];
        let ds = Dataset::new(rows).unwrap();
        let whole = ds.keogh_upper(Coord::new(0, 0), 5, 1).unwrap();
        let prefix = ds.keogh_upper(Coord::new(0, 0), 3, 1).unwrap();
        let other_band = ds.keogh_upper(Coord::new(0, 0), 5, 2).unwrap();
        assert_ne!(whole.upper, prefix.upper);
        assert_ne!(whole.upper, other_band.upper);
    }
}
