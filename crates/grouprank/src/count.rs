//! Phase 1: per-partition group occurrence counts.

use crate::backend::PartitionedTable;
use crate::engine::RankResult;
use crate::key::{row_has_missing, GroupKey, KeyMap};

/// Count, for one partition, how many rows of each group qualify for ranking.
///
/// A row qualifies when none of `na_columns` is missing in it. Disqualified rows are skipped
/// and leave nothing behind; their rank slot stays missing.
pub fn count_partition<T: PartitionedTable>(
    table: &T,
    partition: usize,
    group_by: &[usize],
    na_columns: &[usize],
) -> RankResult<KeyMap> {
    let mut counts = KeyMap::default();
    for row in 0..table.partition_len(partition) {
        if row_has_missing(table, partition, row, na_columns)? {
            continue;
        }
        let key = GroupKey::from_row(table, partition, row, group_by)?;
        *counts.entry(key).or_insert(0) += 1;
    }
    log::trace!(
        "partition {partition}: {} distinct groups counted",
        counts.len()
    );
    Ok(counts)
}
