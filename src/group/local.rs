//! All groups for one fixed subsequence length (component C5).

use crate::dataset::{Coord, Dataset};
use crate::distance::{cmp_dist, envelope::Envelope, DistanceKernel};
use crate::error::GenexResult;

use super::Group;

/// Reverse-membership record: which group a coordinate belongs to, and the
/// coordinate of the member added just before it in that group (spec §9's
/// "singly-linked list keyed by coordinate, embedded in a flat table").
#[derive(Debug, Clone, Copy)]
pub(crate) struct Membership {
    pub group_index: usize,
    pub prev: Option<Coord>,
}

/// One length's worth of groups plus the flat `member_map` side table.
#[derive(Debug)]
pub struct LocalLengthGroupSpace {
    length: usize,
    groups: Vec<Group>,
    /// Indexed by `start * item_count + series_index`, matching the
    /// outer-start/inner-series enumeration order `generate_groups` uses
    /// (spec §4.5).
    member_map: Vec<Option<Membership>>,
}

impl LocalLengthGroupSpace {
    pub fn new(dataset: &Dataset, length: usize) -> Self {
        let num_starts = dataset.item_length() + 1 - length;
        let slots = num_starts * dataset.item_count();
        Self {
            length,
            groups: Vec::new(),
            member_map: vec![None; slots],
        }
    }

    pub(crate) fn from_parts(
        length: usize,
        groups: Vec<Group>,
        member_map: Vec<Option<Membership>>,
    ) -> Self {
        Self {
            length,
            groups,
            member_map,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> &Group {
        &self.groups[index]
    }

    fn map_index(&self, dataset: &Dataset, coord: Coord) -> usize {
        coord.start * dataset.item_count() + coord.series_index
    }

    /// Returns `(group_index, prev)` for a coordinate that has been added
    /// during this length's build.
    pub(crate) fn membership_of(&self, dataset: &Dataset, coord: Coord) -> Option<(usize, Option<Coord>)> {
        self.member_map[self.map_index(dataset, coord)].map(|m| (m.group_index, m.prev))
    }

    /// Single-pass clustering over every length-`ℓ` subsequence, enumerated
    /// outer-start/inner-series (spec §4.5). Sequential within one length;
    /// [`crate::group::global::GlobalGroupSpace::group_multi_threaded`] is
    /// what parallelizes across lengths.
    pub fn generate_groups(
        &mut self,
        dataset: &Dataset,
        kernel: DistanceKernel,
        threshold: f64,
    ) -> GenexResult<usize> {
        const ADMISSION_SLACK: f64 = 0.01;
        let n = dataset.item_count();
        let num_starts = dataset.item_length() + 1 - self.length;

        for start in 0..num_starts {
            for idx in 0..n {
                let coord = Coord::new(idx, start);
                let query = dataset.window(coord, self.length)?;

                let mut bsf = threshold / 2.0 + ADMISSION_SLACK;
                let mut bsf_idx: Option<usize> = None;
                for g in &self.groups {
                    let d = g.distance_from_centroid(kernel, query, bsf);
                    if cmp_dist(d, bsf) == std::cmp::Ordering::Less {
                        bsf = d;
                        bsf_idx = Some(g.group_index);
                    }
                }

                if bsf > threshold / 2.0 {
                    let new_index = self.groups.len();
                    self.groups.push(Group::new(new_index, self.length));
                    bsf_idx = Some(new_index);
                }

                let gi = bsf_idx.expect("a group is always selected or created");
                let prev = self.groups[gi].last_member_coord();
                self.groups[gi].add_member(coord, query);

                let map_idx = self.map_index(dataset, coord);
                self.member_map[map_idx] = Some(Membership { group_index: gi, prev });
            }
        }
        Ok(self.groups.len())
    }

    /// Finds the group whose centroid is closest to `query` under the
    /// warped-distance cascade, pruned by `dropout` (spec §4.5). Returns
    /// `None` if no group beats `dropout`. The centroid envelope is fetched
    /// from `dataset`'s per-series cache rather than recomputed per group.
    pub fn best_group(
        &self,
        dataset: &Dataset,
        kernel: DistanceKernel,
        band: usize,
        query: &[f64],
        query_env: &Envelope,
        dropout: f64,
    ) -> GenexResult<Option<(usize, f64)>> {
        let mut bsf = dropout;
        let mut best = None;
        for g in &self.groups {
            let centroid_env = dataset.keogh_upper(g.centroid_coord(), self.length, band)?;
            let d = kernel.cascade(query, query_env, g.centroid(), &centroid_env, band, bsf);
            if cmp_dist(d, bsf) == std::cmp::Ordering::Less {
                bsf = d;
                best = Some((g.group_index, d));
            }
        }
        Ok(best)
    }

    /// Extends `best_so_far` (ordered ascending by centroid distance) with
    /// this length's groups, using the running k-th-best distance as the
    /// dropout (spec §4.5). Returns the number of viable groups tracked.
    pub fn inter_level_ksim(
        &self,
        dataset: &Dataset,
        kernel: DistanceKernel,
        band: usize,
        query: &[f64],
        query_env: &Envelope,
        best_so_far: &mut Vec<GroupCandidate>,
        k: usize,
    ) -> GenexResult<usize> {
        let dropout = if best_so_far.len() >= k && k > 0 {
            best_so_far[k - 1].dist
        } else {
            f64::INFINITY
        };
        for g in &self.groups {
            let centroid_env = dataset.keogh_upper(g.centroid_coord(), self.length, band)?;
            let d = kernel.cascade(query, query_env, g.centroid(), &centroid_env, band, dropout);
            if d.is_finite() {
                best_so_far.push(GroupCandidate {
                    length: self.length,
                    group_index: g.group_index,
                    dist: d,
                });
            }
        }
        best_so_far.sort_by(|a, b| cmp_dist(a.dist, b.dist));
        Ok(best_so_far.len())
    }
}

/// One group's centroid distance, tracked across lengths during
/// inter-level k-similarity search (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct GroupCandidate {
    pub length: usize,
    pub group_index: usize,
    pub dist: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::distance::lookup;

    #[test]
    fn group_radius_matches_spec_scenario_s2() {
        // S2: manhattan, threshold 2.0 -> admits within 1.0 of the centroid.
        let ds = Dataset::new(vec![
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.0, 2.0],
        ])
        .unwrap();
        let kernel = lookup("manhattan").unwrap();
        let mut space = LocalLengthGroupSpace::new(&ds, 3);
        let n = space.generate_groups(&ds, kernel, 2.0).unwrap();
        assert_eq!(n, 2);
        assert_eq!(space.group(0).count(), 2);
        assert_eq!(space.group(1).count(), 1);
        assert_eq!(space.group(0).centroid(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn every_subsequence_belongs_to_exactly_one_group() {
        let ds = Dataset::new(vec![vec![0.0, 1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0, 7.0]]).unwrap();
        let kernel = lookup("euclidean").unwrap();
        let mut space = LocalLengthGroupSpace::new(&ds, 2);
        space.generate_groups(&ds, kernel, 1.0).unwrap();

        let mut seen = std::collections::HashSet::new();
        for g in space.groups() {
            for &m in g.members() {
                assert!(seen.insert(m), "coordinate {:?} seen twice", m);
            }
        }
        assert_eq!(seen.len(), 2 * (4 - 2 + 1));
    }

    #[test]
    fn invariant_g1_holds_for_every_member() {
        let ds = Dataset::new(vec![
            vec![0.0, 0.2, 5.0, 5.1, 9.9],
            vec![0.1, 0.3, 4.9, 5.2, 10.0],
        ])
        .unwrap();
        let kernel = lookup("euclidean").unwrap();
        let threshold = 0.5;
        let mut space = LocalLengthGroupSpace::new(&ds, 2);
        space.generate_groups(&ds, kernel, threshold).unwrap();
        for g in space.groups() {
            for &m in g.members() {
                let window = ds.window(m, 2).unwrap();
                let d = kernel.pairwise(g.centroid(), window, f64::INFINITY);
                assert!(d <= threshold / 2.0 + 0.01 + 1e-9);
            }
        }
    }
}
