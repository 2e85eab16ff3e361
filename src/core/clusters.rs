// Natural-cluster discovery and merging into bounded per-source task lists.
use std::path::Path;

use crate::core::error::{Error, ErrorKind};
use crate::store::source::SourceHandle;

/// Half-open row interval `[start, end)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntryRange {
    pub start: u64,
    pub end: u64,
}

impl EntryRange {
    pub fn rows(&self) -> u64 {
        self.end - self.start
    }
}

/// Returns the collection's natural clusters: the ascending, gap-free row
/// ranges recorded at write-flush granularity. Opens a transient handle;
/// nothing stays open past return.
pub fn discover_clusters(path: &Path, collection: &str) -> Result<Vec<EntryRange>, Error> {
    let handle = SourceHandle::open(path)?;
    let clusters = handle.collection(collection)?.clusters();
    if clusters.is_empty() {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("collection has no rows, nothing to schedule")
            .with_collection(collection)
            .with_path(path));
    }
    Ok(clusters)
}

/// Merges consecutive clusters so that at most `max_tasks` ranges remain.
///
/// With `n` clusters and `fold = n / max_tasks`: a cluster list already at
/// or under the limit passes through unchanged; otherwise each output range
/// lumps `fold` clusters, and each of the first `n % max_tasks` outputs
/// takes one extra cluster so the remainder is spread over the front rather
/// than piling up in a tail range.
pub fn merge_clusters(clusters: Vec<EntryRange>, max_tasks: usize) -> Vec<EntryRange> {
    debug_assert!(max_tasks >= 1, "caller must request at least one task");
    let n = clusters.len();
    let fold = n / max_tasks;
    if fold == 0 {
        return clusters;
    }

    let mut remainder = n % max_tasks;
    let mut merged = Vec::with_capacity(max_tasks);
    let mut i = 0;
    while i < n {
        let start = clusters[i].start;
        i += fold - 1;
        if remainder > 0 {
            i += 1;
            remainder -= 1;
        }
        let end = clusters[i].end;
        merged.push(EntryRange { start, end });
        i += 1;
    }
    debug_assert_eq!(remainder, 0, "merge must consume the whole remainder");
    merged
}

#[cfg(test)]
mod tests {
    use super::{EntryRange, merge_clusters};

    fn uniform_clusters(count: u64, rows_each: u64) -> Vec<EntryRange> {
        (0..count)
            .map(|i| EntryRange {
                start: i * rows_each,
                end: (i + 1) * rows_each,
            })
            .collect()
    }

    fn assert_covering(merged: &[EntryRange], total_rows: u64) {
        assert_eq!(merged.first().unwrap().start, 0);
        assert_eq!(merged.last().unwrap().end, total_rows);
        for pair in merged.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap between ranges");
        }
    }

    #[test]
    fn short_lists_pass_through_unchanged() {
        let clusters = uniform_clusters(3, 100);
        let merged = merge_clusters(clusters.clone(), 8);
        assert_eq!(merged, clusters);

        let merged = merge_clusters(clusters.clone(), 3);
        assert_eq!(merged, clusters);
    }

    #[test]
    fn seven_clusters_limit_three_fold_front_loaded() {
        let merged = merge_clusters(uniform_clusters(7, 10), 3);
        assert_eq!(merged.len(), 3);
        assert_covering(&merged, 70);
        let sizes: Vec<u64> = merged.iter().map(|range| range.rows() / 10).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn merged_count_is_min_of_clusters_and_limit() {
        for (n, limit) in [(1, 1), (5, 2), (12, 5), (100, 7), (7, 7), (2, 9)] {
            let merged = merge_clusters(uniform_clusters(n, 4), limit);
            assert_eq!(merged.len() as u64, n.min(limit as u64));
            assert_covering(&merged, n * 4);
        }
    }

    #[test]
    fn no_range_exceeds_ceiling_share() {
        for (n, limit) in [(10u64, 3usize), (11, 4), (64, 5), (13, 13), (99, 10)] {
            let ceiling = n.div_ceil(limit as u64);
            let merged = merge_clusters(uniform_clusters(n, 2), limit);
            for range in &merged {
                assert!(range.rows() / 2 <= ceiling);
            }
        }
    }

    #[test]
    fn uneven_cluster_sizes_are_preserved_across_merge() {
        let clusters = vec![
            EntryRange { start: 0, end: 5 },
            EntryRange { start: 5, end: 40 },
            EntryRange { start: 40, end: 41 },
            EntryRange { start: 41, end: 90 },
            EntryRange { start: 90, end: 100 },
        ];
        let merged = merge_clusters(clusters, 2);
        assert_eq!(
            merged,
            vec![
                EntryRange { start: 0, end: 41 },
                EntryRange { start: 41, end: 100 },
            ]
        );
    }
}
