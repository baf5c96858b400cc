//! Phase 2: rank assignment within one partition.

use crate::backend::PartitionedTable;
use crate::engine::RankResult;
use crate::key::{row_has_missing, GroupKey, KeyMap};

/// Ranks for the rows of one partition, in row order. `None` marks a row that is not ranked.
pub type PartitionRanks = Vec<Option<f64>>;

/// Assign 1-based ranks to the qualifying rows of `partition`.
///
/// `previous` is the cumulative map of partition `partition - 1` (or `None` for partition 0).
/// A group continues at `previous[key] + 1`; a group absent from `previous` has never been seen
/// in an earlier partition and starts at 1. Repeated rows of a group within the partition take
/// consecutive ranks in row order.
pub fn assign_partition<T: PartitionedTable>(
    table: &T,
    partition: usize,
    group_by: &[usize],
    na_columns: &[usize],
    previous: Option<&KeyMap>,
) -> RankResult<PartitionRanks> {
    let len = table.partition_len(partition);
    let mut next_rank = KeyMap::default();
    let mut ranks = Vec::with_capacity(len);

    for row in 0..len {
        if row_has_missing(table, partition, row, na_columns)? {
            ranks.push(None);
            continue;
        }

        let key = GroupKey::from_row(table, partition, row, group_by)?;
        // Seed lazily: only groups present in this partition need a working entry.
        let next = next_rank.entry(key).or_insert_with_key(|key| {
            previous
                .and_then(|prev| prev.get(key))
                .map_or(1, |cumulative| cumulative + 1)
        });
        ranks.push(Some(*next as f64));
        *next += 1;
    }

    log::trace!(
        "partition {partition}: {} rows ranked across {} groups",
        ranks.iter().filter(|r| r.is_some()).count(),
        next_rank.len()
    );
    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouprank_columnar::{
        ColumnSchema, ColumnType, ColumnarTable, ColumnarTableBuilder, TableOptions, Value,
    };
    use pretty_assertions::assert_eq;

    fn table(rows: &[(f64, Option<f64>)]) -> ColumnarTable {
        let schema = vec![
            ColumnSchema::new("g", ColumnType::Number),
            ColumnSchema::new("s", ColumnType::Number),
        ];
        let mut builder =
            ColumnarTableBuilder::new(schema, TableOptions { page_size_rows: 16 });
        for (g, s) in rows {
            builder.append_row(&[
                Value::Number(*g),
                s.map(Value::Number).unwrap_or(Value::Null),
            ]);
        }
        builder.finalize()
    }

    #[test]
    fn first_partition_starts_every_group_at_one() {
        let t = table(&[(1.0, Some(1.0)), (2.0, Some(1.0)), (1.0, Some(2.0))]);

        let ranks = assign_partition(&t, 0, &[0], &[1], None).unwrap();

        assert_eq!(ranks, vec![Some(1.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn continues_from_previous_cumulative_counts() {
        let t = table(&[(1.0, Some(1.0)), (2.0, Some(1.0)), (1.0, Some(2.0))]);
        let previous: KeyMap = [(GroupKey::new([Some(1.0)]), 4)].into_iter().collect();

        let ranks = assign_partition(&t, 0, &[0], &[1], Some(&previous)).unwrap();

        assert_eq!(ranks, vec![Some(5.0), Some(1.0), Some(6.0)]);
    }

    #[test]
    fn rows_with_missing_sort_values_stay_unranked() {
        let t = table(&[(1.0, None), (1.0, Some(3.0)), (1.0, None), (1.0, Some(4.0))]);

        let ranks = assign_partition(&t, 0, &[0], &[1], None).unwrap();

        assert_eq!(ranks, vec![None, Some(1.0), None, Some(2.0)]);
    }
}
