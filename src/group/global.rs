//! Collection of [`LocalLengthGroupSpace`]s, one per subsequence length
//! (component C6): orchestrates the parallel build and answers
//! `best_match`/`k_sim` queries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use itertools::Itertools;

use crate::config;
use crate::dataset::Dataset;
use crate::distance::{self, cmp_dist, envelope::Envelope, DistanceKernel};
use crate::error::{GenexError, GenexResult};

use super::local::GroupCandidate;
use super::{Candidate, LocalLengthGroupSpace};

/// Length slots `0` and `1` are intentionally unused (spec §3, §9): the
/// shortest group-able subsequence has length 2, so queries shorter than
/// that are rejected rather than silently producing an empty result.
const MIN_GROUPABLE_LENGTH: usize = 2;

/// The full grouping index over a frozen [`Dataset`] (spec §3's
/// `GlobalGroupSpace`).
pub struct GlobalGroupSpace {
    dataset: Dataset,
    distance_name: Option<String>,
    threshold: f64,
    /// Sparse, indexed by length; `spaces[0]` and `spaces[1]` are always
    /// `None`.
    spaces: Vec<Option<LocalLengthGroupSpace>>,
}

impl GlobalGroupSpace {
    pub fn new(dataset: Dataset) -> Self {
        let slots = dataset.item_length() + 1;
        Self {
            dataset,
            distance_name: None,
            threshold: 0.0,
            spaces: (0..slots).map(|_| None).collect(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn distance_name(&self) -> Option<&str> {
        self.distance_name.as_deref()
    }

    /// True once `distance_name` is set and at least one length has been
    /// built (spec §4.6's `grouped()`).
    pub fn is_grouped(&self) -> bool {
        self.distance_name.is_some() && self.spaces.iter().any(|s| s.is_some())
    }

    /// Drops every built group, returning the index to its pre-`group()`
    /// state (spec §3's lifecycle note).
    pub fn reset(&mut self) {
        self.distance_name = None;
        self.threshold = 0.0;
        for slot in &mut self.spaces {
            *slot = None;
        }
    }

    pub(crate) fn space(&self, length: usize) -> Option<&LocalLengthGroupSpace> {
        self.spaces.get(length).and_then(|s| s.as_ref())
    }

    pub(crate) fn set_space(&mut self, length: usize, space: LocalLengthGroupSpace) {
        self.spaces[length] = Some(space);
    }

    pub(crate) fn set_distance_name(&mut self, name: String) {
        self.distance_name = Some(name);
    }

    pub(crate) fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    fn kernel(&self) -> GenexResult<DistanceKernel> {
        let name = self
            .distance_name
            .as_deref()
            .ok_or(GenexError::NoGroupsBuilt)?;
        distance::lookup(name)
    }

    /// Sequential build over every length `ℓ ∈ [2, L_max]` (spec §4.6).
    pub fn group(&mut self, distance_name: &str, threshold: f64) -> GenexResult<usize> {
        let kernel = distance::lookup(distance_name)?;
        self.reset();
        self.distance_name = Some(distance_name.to_string());
        self.threshold = threshold;

        let l_max = self.dataset.item_length();
        let mut total = 0;
        for length in MIN_GROUPABLE_LENGTH..=l_max {
            let mut space = LocalLengthGroupSpace::new(&self.dataset, length);
            let n = space.generate_groups(&self.dataset, kernel, threshold)?;
            log::debug!("length {length}: {n} groups");
            total += n;
            self.set_space(length, space);
        }
        log::info!("grouped {} lengths into {total} groups under '{distance_name}'", l_max - MIN_GROUPABLE_LENGTH + 1);
        Ok(total)
    }

    /// Parallel build: `num_threads` workers draw length values from a
    /// shared atomic counter starting at 2 (spec §4.6, §5). Each worker
    /// builds one [`LocalLengthGroupSpace`] independently against the
    /// shared, read-only dataset, so results are identical to [`Self::group`]
    /// regardless of thread count (spec invariant S6).
    pub fn group_multi_threaded(
        &mut self,
        distance_name: &str,
        threshold: f64,
        num_threads: usize,
    ) -> GenexResult<usize> {
        let kernel = distance::lookup(distance_name)?;
        self.reset();
        self.distance_name = Some(distance_name.to_string());
        self.threshold = threshold;

        let l_max = self.dataset.item_length();
        let counter = AtomicUsize::new(MIN_GROUPABLE_LENGTH);
        let dataset = &self.dataset;
        let results: Mutex<Vec<GenexResult<(usize, LocalLengthGroupSpace)>>> = Mutex::new(Vec::new());
        let threads = num_threads.max(1);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| GenexError::IoFailure(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

        let counter = &counter;
        let results_ref = &results;
        pool.scope(|scope| {
            for _ in 0..threads {
                scope.spawn(move |_| loop {
                    let length = counter.fetch_add(1, Ordering::SeqCst);
                    if length > l_max {
                        break;
                    }
                    let mut space = LocalLengthGroupSpace::new(dataset, length);
                    let outcome = space
                        .generate_groups(dataset, kernel, threshold)
                        .map(|_| (length, space));
                    results_ref.lock().unwrap().push(outcome);
                });
            }
        });

        let mut total = 0;
        for outcome in results.into_inner().unwrap() {
            let (length, space) = outcome?;
            total += space.group_count();
            self.set_space(length, space);
        }
        log::info!("grouped {total} groups across [{MIN_GROUPABLE_LENGTH}, {l_max}] using {threads} threads");
        Ok(total)
    }

    /// Convenience entry point matching the library surface in spec §6:
    /// sequential for `num_threads <= 1`, parallel otherwise.
    pub fn group_all_lengths(
        &mut self,
        distance_name: &str,
        threshold: f64,
        num_threads: usize,
    ) -> GenexResult<usize> {
        if num_threads <= 1 {
            self.group(distance_name, threshold)
        } else {
            self.group_multi_threaded(distance_name, threshold, num_threads)
        }
    }

    fn check_query_length(&self, len: usize) -> GenexResult<()> {
        if !self.is_grouped() {
            return Err(GenexError::NoGroupsBuilt);
        }
        if len < MIN_GROUPABLE_LENGTH {
            return Err(GenexError::IndexOutOfRange {
                what: "query length",
                index: len as i64,
                bound: MIN_GROUPABLE_LENGTH,
            });
        }
        Ok(())
    }

    /// Single closest subsequence to `query` under the warped-distance
    /// cascade (spec §4.6). Descends lengths in [`traversal_order`],
    /// refining the running best-so-far as tighter groups are found.
    pub fn best_match(&self, query: &[f64]) -> GenexResult<Candidate> {
        self.check_query_length(query.len())?;
        let kernel = self.kernel()?;
        let ratio = config::warping_band_ratio();
        let l_max = self.dataset.item_length();
        let q = query.len();

        let mut bsf: Option<Candidate> = None;
        for length in traversal_order(q, l_max) {
            let space = match self.space(length) {
                Some(s) => s,
                None => continue,
            };
            let band = config::calc_band_with_ratio(q.max(length), ratio);
            let query_env = Envelope::compute(query, band);
            let dropout = bsf.map(|c| c.dist).unwrap_or(f64::INFINITY);

            let group_idx = match space.best_group(&self.dataset, kernel, band, query, &query_env, dropout)? {
                Some((idx, _)) => idx,
                None => continue,
            };
            let group = space.group(group_idx);
            if let Some(refined) = group.best_match(&self.dataset, kernel, band, query, &query_env)? {
                if bsf.map_or(true, |b| cmp_dist(refined.dist, b.dist) == std::cmp::Ordering::Less) {
                    bsf = Some(refined);
                }
            }
        }
        bsf.ok_or(GenexError::NoGroupsBuilt)
    }

    /// Approximate k-similarity search (spec §4.6): an inter-level pass
    /// gathers up to `h` promising groups across lengths by centroid
    /// distance, then an intra-level pass descends into each and merges
    /// their k-NN results.
    pub fn k_sim(&self, query: &[f64], k: usize, h: usize) -> GenexResult<Vec<Candidate>> {
        self.check_query_length(query.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let kernel = self.kernel()?;
        let ratio = config::warping_band_ratio();
        let l_max = self.dataset.item_length();
        let q = query.len();

        let mut best_groups: Vec<GroupCandidate> = Vec::new();
        for length in traversal_order(q, l_max) {
            let space = match self.space(length) {
                Some(s) => s,
                None => continue,
            };
            let band = config::calc_band_with_ratio(q.max(length), ratio);
            let query_env = Envelope::compute(query, band);
            space.inter_level_ksim(&self.dataset, kernel, band, query, &query_env, &mut best_groups, k)?;
        }
        best_groups.sort_by(|a, b| cmp_dist(a.dist, b.dist));
        let take = h.min(best_groups.len());

        let mut per_group: Vec<Vec<Candidate>> = Vec::with_capacity(take);
        for gc in best_groups.into_iter().take(take) {
            let space = self.space(gc.length).expect("length tracked in best_groups was built");
            let band = config::calc_band_with_ratio(q.max(gc.length), ratio);
            let query_env = Envelope::compute(query, band);
            let group = space.group(gc.group_index);
            per_group.push(group.intra_group_knn(&self.dataset, kernel, band, query, &query_env, k)?);
        }
        // Each per-group list is already ascending, so a k-way merge avoids
        // re-sorting the whole concatenation.
        let merged: Vec<Candidate> = per_group
            .into_iter()
            .kmerge_by(|a, b| cmp_dist(a.dist, b.dist) == std::cmp::Ordering::Less)
            .take(k)
            .collect();
        Ok(merged)
    }
}

/// Lengths `ℓ ∈ [2, L]` ordered by proximity to `q`, ties broken toward
/// longer `ℓ` (spec §4.6): `q, q-1, q+1, q-2, q+2, ...`, clipped to the
/// valid range. Always a permutation of `[2, L]` starting at
/// `min(max(q, 2), L)` (spec invariant 5).
pub fn traversal_order(q: usize, l_max: usize) -> Vec<usize> {
    if l_max < MIN_GROUPABLE_LENGTH {
        return Vec::new();
    }
    let start = q.max(MIN_GROUPABLE_LENGTH).min(l_max);
    let mut order = vec![start];
    let mut offset: usize = 1;
    loop {
        let lo = (start as isize) - (offset as isize);
        let hi = start + offset;
        let mut added = false;
        if lo >= MIN_GROUPABLE_LENGTH as isize {
            order.push(lo as usize);
            added = true;
        }
        if hi <= l_max {
            order.push(hi);
            added = true;
        }
        if !added {
            break;
        }
        offset += 1;
    }
    order
}
