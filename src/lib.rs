//! dtw_groups: a hierarchical similarity-grouping index over equal-length
//! numeric time series, searched under dynamic time warping (DTW).
//!
//! Subsequences of every length `ℓ ∈ [2, L_max]` are partitioned into
//! `Group`s under a user-chosen threshold, so that queries can be routed
//! to a handful of group centroids before descending into members, instead
//! of scanning the whole dataset. The same `Group`/`LocalLengthGroupSpace`/
//! `GlobalGroupSpace` hierarchy answers two questions: the single closest
//! subsequence to a query ([`group::GlobalGroupSpace::best_match`]) and the
//! `k` closest ([`group::GlobalGroupSpace::k_sim`]).
//!
//! ## Accuracy / speed trade-off
//!
//! The index is approximate: the threshold controls how tightly members
//! cluster around a centroid, and `k_sim`'s two-phase search only descends
//! into the most promising `h` groups rather than every group. Larger `h`
//! and a smaller threshold push results closer to exact brute-force k-NN
//! at the cost of more distance computations.
//!
//! ## Features
//!
//! `"jemalloc"` switches the global allocator to jemalloc.
//!
//! `"auto"` lets `rayon` size its own global thread pool. Enabled by
//! default; disabling it exposes [`init_pool`] so a caller can size the
//! pool explicitly before the first parallel build.
//!
//! ## Example
//!
//! ```
//! use dtw_groups::dataset::Dataset;
//! use dtw_groups::group::GlobalGroupSpace;
//!
//! let dataset = Dataset::new(vec![
//!     vec![0.0, 1.0, 2.0, 3.0, 4.0],
//!     vec![4.0, 3.0, 2.0, 1.0, 0.0],
//! ]).unwrap();
//!
//! let mut index = GlobalGroupSpace::new(dataset);
//! index.group_all_lengths("euclidean", 1.0, 1).unwrap();
//!
//! let best = index.best_match(&[0.0, 1.0, 2.0]).unwrap();
//! assert_eq!(best.series_index, 0);
//! ```

#[cfg(all(not(target_env = "msvc"), feature = "jemalloc"))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), feature = "jemalloc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

pub mod codec;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod group;

pub use dataset::{Coord, Dataset};
pub use error::{GenexError, GenexResult};
pub use group::{Candidate, GlobalGroupSpace, Group, LocalLengthGroupSpace};

#[cfg(not(feature = "auto"))]
use std::sync::Once;

#[cfg(not(feature = "auto"))]
static JOBS_SET: Once = Once::new();

#[cfg(not(feature = "auto"))]
fn cpus() -> usize {
    num_cpus::get()
}

#[cfg(not(feature = "auto"))]
fn start_pool(jobs: usize) {
    assert!(jobs > 0, "Job count must be at least 1.");
    let jobs = jobs.min(cpus());
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .unwrap();
}

/// Initializes rayon's global thread pool with `threads` threads. Only
/// available when the default `"auto"` feature is disabled, since with
/// `"auto"` rayon sizes its own pool. Must be called before the first
/// parallel build ([`group::GlobalGroupSpace::group_multi_threaded`]);
/// once the global pool is instantiated it is final, a limitation of the
/// `rayon` dependency itself.
#[cfg(not(feature = "auto"))]
pub fn init_pool(threads: usize) {
    JOBS_SET.call_once(|| start_pool(threads));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::Dataset;

    #[test]
    fn end_to_end_group_and_query() {
        let rows = vec![
            vec![0.0, 0.2, 5.0, 5.1, 9.9, 0.1],
            vec![0.1, 0.3, 4.9, 5.2, 10.0, 0.0],
            vec![9.8, 9.9, 0.1, 0.2, 5.1, 9.7],
        ];
        let dataset = Dataset::new(rows).unwrap();
        let mut index = GlobalGroupSpace::new(dataset);
        let total = index.group_all_lengths("euclidean", 1.0, 1).unwrap();
        assert!(total > 0);
        assert!(index.is_grouped());

        let query = [0.0, 0.2, 5.0, 5.1, 9.9, 0.1];
        let best = index.best_match(&query).unwrap();
        assert_eq!(best.series_index, 0);
        assert!(best.dist < 1e-9);

        let neighbors = index.k_sim(&query, 2, 4).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors[0].dist <= neighbors[1].dist);
    }

    #[test]
    #[cfg(not(feature = "auto"))]
    fn init_tpool_sizes_the_global_pool() {
        let t = 2;
        init_pool(t);
        assert!(rayon::current_num_threads() <= t.max(1));
    }
}
