//! Group (component C4): a centroid + member list for one similarity
//! cluster, and the per-group search operations that ride on it.

pub mod global;
pub mod local;

use std::collections::BinaryHeap;

use crate::dataset::{Coord, Dataset};
use crate::distance::{cmp_dist, envelope::Envelope, DistanceKernel};
use crate::error::GenexResult;

pub use global::{traversal_order, GlobalGroupSpace};
pub use local::LocalLengthGroupSpace;

/// A `(subsequence, distance)` pair, ordered ascending by `dist` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub series_index: usize,
    pub start: usize,
    pub length: usize,
    pub dist: f64,
}

impl Candidate {
    fn new(coord: Coord, length: usize, dist: f64) -> Self {
        Self {
            series_index: coord.series_index,
            start: coord.start,
            length,
            dist,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.series_index, self.start)
    }
}

/// One cluster of length-`ℓ` subsequences (spec §3, §4.4).
///
/// By contract the centroid is always the first member added
/// (`generate_groups`'s enumeration order makes this deterministic), so the
/// group never needs to recompute or rebalance a centroid after creation.
#[derive(Debug, Clone)]
pub struct Group {
    pub group_index: usize,
    pub member_length: usize,
    centroid_coord: Coord,
    centroid: Vec<f64>,
    members: Vec<Coord>,
    last_member_coord: Option<Coord>,
}

impl Group {
    pub(crate) fn new(group_index: usize, member_length: usize) -> Self {
        Self {
            group_index,
            member_length,
            centroid_coord: Coord::new(0, 0),
            centroid: Vec::new(),
            members: Vec::new(),
            last_member_coord: None,
        }
    }

    /// Reconstructs a group from a snapshot record without recomputing any
    /// distances (spec §4.7): `centroid` is the dataset window named by
    /// `centroid_coord`, `members` is the already-ordered coordinate list.
    pub(crate) fn from_parts(
        group_index: usize,
        member_length: usize,
        centroid_coord: Coord,
        centroid: Vec<f64>,
        members: Vec<Coord>,
        last_member_coord: Option<Coord>,
    ) -> Self {
        Self {
            group_index,
            member_length,
            centroid_coord,
            centroid,
            members,
            last_member_coord,
        }
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    pub fn centroid_coord(&self) -> Coord {
        self.centroid_coord
    }

    pub fn members(&self) -> &[Coord] {
        &self.members
    }

    pub fn last_member_coord(&self) -> Option<Coord> {
        self.last_member_coord
    }

    /// Appends `coord` to the group. If this is the first member, it also
    /// becomes the centroid (spec §4.4, invariant G1's "centroid equals the
    /// first subsequence added").
    pub(crate) fn add_member(&mut self, coord: Coord, data: &[f64]) {
        if self.members.is_empty() {
            self.centroid_coord = coord;
            self.centroid = data.to_vec();
        }
        self.members.push(coord);
        self.last_member_coord = Some(coord);
    }

    /// Pairwise (non-warped) distance from `query` to this group's centroid,
    /// with early dropout (spec §4.4).
    pub fn distance_from_centroid(&self, kernel: DistanceKernel, query: &[f64], dropout: f64) -> f64 {
        kernel.pairwise(&self.centroid, query, dropout)
    }

    /// Scans every member with the lower-bound cascade, tracking the
    /// best-so-far distance as the next member's dropout (spec §4.4).
    /// Returns `None` for an empty group.
    pub fn best_match(
        &self,
        dataset: &Dataset,
        kernel: DistanceKernel,
        band: usize,
        query: &[f64],
        query_env: &Envelope,
    ) -> GenexResult<Option<Candidate>> {
        let mut best: Option<(Coord, f64)> = None;
        for &coord in &self.members {
            let member = dataset.window(coord, self.member_length)?;
            let member_env = dataset.keogh_upper(coord, self.member_length, band)?;
            let dropout = best.map(|(_, d)| d).unwrap_or(f64::INFINITY);
            let d = kernel.cascade(query, query_env, member, &member_env, band, dropout);
            if cmp_dist(d, dropout) == std::cmp::Ordering::Less {
                best = Some((coord, d));
            }
        }
        Ok(best.map(|(coord, dist)| Candidate::new(coord, self.member_length, dist)))
    }

    /// Bounded max-heap k-NN within this group (spec §4.4): the dropout fed
    /// into the cascade is `+∞` until the heap fills, then the current
    /// worst-of-the-best, so the cascade prunes harder as the heap tightens.
    /// A group with fewer than `k` members returns all of them, sorted.
    pub fn intra_group_knn(
        &self,
        dataset: &Dataset,
        kernel: DistanceKernel,
        band: usize,
        query: &[f64],
        query_env: &Envelope,
        k: usize,
    ) -> GenexResult<Vec<Candidate>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        for &coord in &self.members {
            let member = dataset.window(coord, self.member_length)?;
            let member_env = dataset.keogh_upper(coord, self.member_length, band)?;
            let dropout = if heap.len() < k {
                f64::INFINITY
            } else {
                heap.peek().unwrap().dist
            };
            let d = kernel.cascade(query, query_env, member, &member_env, band, dropout);
            if !d.is_finite() {
                continue;
            }
            if heap.len() < k {
                heap.push(HeapEntry { coord, dist: d });
            } else if cmp_dist(d, heap.peek().unwrap().dist) == std::cmp::Ordering::Less {
                heap.pop();
                heap.push(HeapEntry { coord, dist: d });
            }
        }
        let mut out: Vec<Candidate> = heap
            .into_iter()
            .map(|e| Candidate::new(e.coord, self.member_length, e.dist))
            .collect();
        out.sort_by(|a, b| cmp_dist(a.dist, b.dist));
        Ok(out)
    }
}

/// Max-heap entry ordered by `dist` so `BinaryHeap::pop` evicts the worst
/// candidate currently held (spec §4.4's "pop largest when exceeded").
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    coord: Coord,
    dist: f64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp_dist(self.dist, other.dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::distance::lookup;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.0, 2.0],
        ])
        .unwrap()
    }

    #[test]
    fn first_member_becomes_centroid() {
        let mut g = Group::new(0, 3);
        g.add_member(Coord::new(0, 0), &[0.0, 0.0, 0.0]);
        g.add_member(Coord::new(1, 0), &[0.0, 0.0, 1.0]);
        assert_eq!(g.centroid(), &[0.0, 0.0, 0.0]);
        assert_eq!(g.count(), 2);
        assert_eq!(g.last_member_coord(), Some(Coord::new(1, 0)));
    }

    #[test]
    fn best_match_finds_closest_member() {
        let ds = dataset();
        let kernel = lookup("manhattan").unwrap();
        let mut g = Group::new(0, 3);
        g.add_member(Coord::new(0, 0), &[0.0, 0.0, 0.0]);
        g.add_member(Coord::new(1, 0), &[0.0, 0.0, 1.0]);
        g.add_member(Coord::new(2, 0), &[0.0, 0.0, 2.0]);
        let query = [0.0, 0.0, 1.2];
        let env = Envelope::compute(&query, 0);
        let best = g.best_match(&ds, kernel, 0, &query, &env).unwrap().unwrap();
        assert_eq!(best.series_index, 1);
    }

    #[test]
    fn intra_group_knn_bounds_to_group_size() {
        let ds = dataset();
        let kernel = lookup("manhattan").unwrap();
        let mut g = Group::new(0, 3);
        g.add_member(Coord::new(0, 0), &[0.0, 0.0, 0.0]);
        g.add_member(Coord::new(1, 0), &[0.0, 0.0, 1.0]);
        let query = [0.0, 0.0, 0.0];
        let env = Envelope::compute(&query, 0);
        let knn = g.intra_group_knn(&ds, kernel, 0, &query, &env, 5).unwrap();
        assert_eq!(knn.len(), 2);
        assert!(knn[0].dist <= knn[1].dist);
    }

    #[test]
    fn empty_group_returns_no_candidates() {
        let ds = dataset();
        let kernel = lookup("manhattan").unwrap();
        let g = Group::new(0, 3);
        let query = [0.0, 0.0, 0.0];
        let env = Envelope::compute(&query, 0);
        assert!(g.best_match(&ds, kernel, 0, &query, &env).unwrap().is_none());
        assert!(g.intra_group_knn(&ds, kernel, 0, &query, &env, 3).unwrap().is_empty());
    }
}
