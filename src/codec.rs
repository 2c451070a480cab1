//! Snapshot codec (component C8): serialize/deserialize a built
//! [`GlobalGroupSpace`] to a compressed binary stream (spec §4.7, §6).
//!
//! Record format: schema version; `(N, L_max, threshold, distance_name)`;
//! then for each built length, the ordered group list where each group
//! emits `(centroid_coord, last_member_coord, members)`. Loading replays
//! the member list in order to rebuild `member_map`, which re-establishes
//! invariant G1 without recomputing any distance (spec §4.7).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::dataset::{Coord, Dataset};
use crate::error::{GenexError, GenexResult};
use crate::group::local::Membership;
use crate::group::{Group, GlobalGroupSpace, LocalLengthGroupSpace};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    centroid_coord: Coord,
    last_member_coord: Option<Coord>,
    members: Vec<Coord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LengthRecord {
    length: usize,
    groups: Vec<GroupRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    schema_version: u32,
    item_count: usize,
    item_length: usize,
    threshold: f64,
    distance_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    header: SnapshotHeader,
    lengths: Vec<LengthRecord>,
}

fn to_snapshot(index: &GlobalGroupSpace) -> GenexResult<Snapshot> {
    let distance_name = index
        .distance_name()
        .ok_or(GenexError::NoGroupsBuilt)?
        .to_string();

    let mut lengths = Vec::new();
    for length in 2..=index.dataset().item_length() {
        let space = match index.space(length) {
            Some(s) => s,
            None => continue,
        };
        let groups = space
            .groups()
            .iter()
            .map(|g| GroupRecord {
                centroid_coord: g.centroid_coord(),
                last_member_coord: g.last_member_coord(),
                members: g.members().to_vec(),
            })
            .collect();
        lengths.push(LengthRecord { length, groups });
    }

    Ok(Snapshot {
        header: SnapshotHeader {
            schema_version: SCHEMA_VERSION,
            item_count: index.dataset().item_count(),
            item_length: index.dataset().item_length(),
            threshold: index.threshold(),
            distance_name,
        },
        lengths,
    })
}

/// Rebuilds a [`LocalLengthGroupSpace`] from its snapshot record. Member
/// values aren't recomputed; `member_map` is replayed straight from the
/// already-ordered `members` list (spec §4.7).
fn from_length_record(dataset: &Dataset, record: LengthRecord) -> GenexResult<LocalLengthGroupSpace> {
    let length = record.length;
    let num_starts = dataset.item_length() + 1 - length;
    let mut member_map = vec![None; num_starts * dataset.item_count()];
    let mut groups = Vec::with_capacity(record.groups.len());

    for (group_index, rec) in record.groups.into_iter().enumerate() {
        let centroid = dataset.window(rec.centroid_coord, length)?.to_vec();
        for (pos, &coord) in rec.members.iter().enumerate() {
            let prev = if pos == 0 { None } else { Some(rec.members[pos - 1]) };
            let map_idx = coord.start * dataset.item_count() + coord.series_index;
            member_map[map_idx] = Some(Membership { group_index, prev });
        }
        groups.push(Group::from_parts(
            group_index,
            length,
            rec.centroid_coord,
            centroid,
            rec.members,
            rec.last_member_coord,
        ));
    }

    Ok(LocalLengthGroupSpace::from_parts(length, groups, member_map))
}

fn from_snapshot(dataset: Dataset, snapshot: Snapshot) -> GenexResult<GlobalGroupSpace> {
    if (snapshot.header.item_count, snapshot.header.item_length)
        != (dataset.item_count(), dataset.item_length())
    {
        return Err(GenexError::IncompatibleDataset {
            expected: (dataset.item_count(), dataset.item_length()),
            found: (snapshot.header.item_count, snapshot.header.item_length),
        });
    }

    let mut index = GlobalGroupSpace::new(dataset);
    index.set_distance_name(snapshot.header.distance_name);
    index.set_threshold(snapshot.header.threshold);
    for record in snapshot.lengths {
        let length = record.length;
        let space = from_length_record(index.dataset(), record)?;
        index.set_space(length, space);
    }
    Ok(index)
}

/// Writes `index` to `path` as a zlib-compressed bincode stream (spec §6's
/// persisted state layout: little-endian, IEEE-754 binary64 floats).
pub fn save_to_file(index: &GlobalGroupSpace, path: impl AsRef<Path>) -> GenexResult<()> {
    let path = path.as_ref();
    let snapshot = to_snapshot(index)?;
    let file = File::create(path)?;
    let mut encoder = ZlibEncoder::new(BufWriter::new(file), Compression::default());
    bincode::serialize_into(&mut encoder, &snapshot)?;
    encoder.finish()?.flush()?;
    log::info!(
        "wrote snapshot to {} ({} lengths, distance={})",
        path.display(),
        snapshot.lengths.len(),
        snapshot.header.distance_name
    );
    Ok(())
}

/// Reads an index snapshot from `path` and reattaches it to `dataset`,
/// rejecting snapshots whose `(N, L_max)` disagree with it (spec §4.7).
pub fn load_from_file(dataset: Dataset, path: impl AsRef<Path>) -> GenexResult<GlobalGroupSpace> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut decoder = ZlibDecoder::new(BufReader::new(file));
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    let snapshot: Snapshot = bincode::deserialize(&buf)?;
    log::debug!("loaded snapshot from {} (schema v{})", path.display(), snapshot.header.schema_version);
    from_snapshot(dataset, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index() -> GlobalGroupSpace {
        let ds = Dataset::new(vec![
            vec![0.0, 0.2, 5.0, 5.1, 9.9],
            vec![0.1, 0.3, 4.9, 5.2, 10.0],
            vec![9.8, 9.9, 0.1, 0.2, 5.1],
        ])
        .unwrap();
        let mut index = GlobalGroupSpace::new(ds);
        index.group("euclidean", 1.0).unwrap();
        index
    }

    #[test]
    fn round_trip_preserves_group_structure() {
        let index = build_index();
        let snapshot = to_snapshot(&index).unwrap();
        let rebuilt = from_snapshot(
            Dataset::new(vec![
                vec![0.0, 0.2, 5.0, 5.1, 9.9],
                vec![0.1, 0.3, 4.9, 5.2, 10.0],
                vec![9.8, 9.9, 0.1, 0.2, 5.1],
            ])
            .unwrap(),
            snapshot,
        )
        .unwrap();

        assert_eq!(rebuilt.distance_name(), index.distance_name());
        assert_eq!(rebuilt.threshold(), index.threshold());
        for length in 2..=5 {
            let a = index.space(length).unwrap();
            let b = rebuilt.space(length).unwrap();
            assert_eq!(a.group_count(), b.group_count());
            for (ga, gb) in a.groups().iter().zip(b.groups()) {
                assert_eq!(ga.members(), gb.members());
                assert_eq!(ga.centroid(), gb.centroid());
                assert_eq!(ga.last_member_coord(), gb.last_member_coord());
            }
        }
    }

    #[test]
    fn file_round_trip_answers_the_same_best_match() {
        let index = build_index();
        let query = [0.0, 0.2, 5.0, 5.1, 9.9];
        let before = index.best_match(&query).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("genex_snapshot_test_{}.bin", std::process::id()));
        save_to_file(&index, &path).unwrap();

        let ds = Dataset::new(vec![
            vec![0.0, 0.2, 5.0, 5.1, 9.9],
            vec![0.1, 0.3, 4.9, 5.2, 10.0],
            vec![9.8, 9.9, 0.1, 0.2, 5.1],
        ])
        .unwrap();
        let loaded = load_from_file(ds, &path).unwrap();
        let after = loaded.best_match(&query).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(before.dist, after.dist);
        assert_eq!((before.series_index, before.start), (after.series_index, after.start));
    }

    #[test]
    fn mismatched_dataset_shape_is_rejected() {
        let index = build_index();
        let snapshot = to_snapshot(&index).unwrap();
        let wrong = Dataset::new(vec![vec![0.0, 1.0]]).unwrap();
        assert!(matches!(
            from_snapshot(wrong, snapshot),
            Err(GenexError::IncompatibleDataset { .. })
        ));
    }
}
