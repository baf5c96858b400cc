//! Rank-within-group orchestration.
//!
//! Ranking runs as a fixed sequence of phases over a [`PartitionedTable`]:
//!
//! 1. **Sorting**: the table is sorted by the requested sort columns and the rank column is
//!    appended, every slot missing.
//! 2. **Counting**: every partition is scanned independently and counts its qualifying rows per
//!    group key (see [`count_partition`]).
//! 3. **Combining**: a single sequential pass turns the per-partition counts into cumulative
//!    counts in partition order (see [`combine_cumulative`]). This is the only barrier.
//! 4. **Ranking**: every partition is scanned again independently; each group continues from the
//!    cumulative count of the previous partition (see [`assign_partition`]).
//!
//! The two scans fan out over a crate-local rayon pool when the `parallel` feature is on. The
//! rank column is written only after every partition has been ranked, so a failure in any
//! partition leaves no partially ranked output behind.
use crate::assign::{assign_partition, PartitionRanks};
use crate::backend::PartitionedTable;
use crate::combine::combine_cumulative;
use crate::count::count_partition;
use crate::key::KeyMap;
use crate::model::{RankOptions, RankPlan, RankRequest};
use crate::parallel::for_each_partition;
use grouprank_columnar::ColumnarError;
use std::fmt;

pub type RankResult<T> = Result<T, RankError>;

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("column index {index} out of range for a table with {column_count} columns")]
    ColumnIndexOutOfRange { index: usize, column_count: usize },

    #[error("{columns} sort columns but {directions} sort directions")]
    SortDirectionMismatch { columns: usize, directions: usize },

    #[error("column {column} already exists")]
    DuplicateColumn { column: String },

    #[error("storage failure in partition {partition}: {message}")]
    Storage { partition: usize, message: String },

    #[error(transparent)]
    Columnar(#[from] ColumnarError),
}

impl RankError {
    /// Whether the error was raised while validating the request, before any partition was
    /// scanned.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            RankError::UnknownColumn { .. }
                | RankError::ColumnIndexOutOfRange { .. }
                | RankError::SortDirectionMismatch { .. }
                | RankError::DuplicateColumn { .. }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankPhase {
    Sorting,
    Counting,
    Combining,
    Ranking,
    Done,
}

impl fmt::Display for RankPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RankPhase::Sorting => "sorting",
            RankPhase::Counting => "counting",
            RankPhase::Combining => "combining",
            RankPhase::Ranking => "ranking",
            RankPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of one ranking run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankStats {
    pub partitions: usize,
    pub distinct_groups: usize,
    pub ranked_rows: usize,
    pub unranked_rows: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RankEngine {
    options: RankOptions,
}

impl RankEngine {
    pub fn new(options: RankOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RankOptions {
        &self.options
    }

    /// Sort `table` by the request's sort columns and append the rank column.
    pub fn rank<T: PartitionedTable>(&self, table: &T, request: &RankRequest) -> RankResult<T> {
        self.rank_with_stats(table, request).map(|(table, _)| table)
    }

    pub fn rank_with_stats<T: PartitionedTable>(
        &self,
        table: &T,
        request: &RankRequest,
    ) -> RankResult<(T, RankStats)> {
        let plan = RankPlan::resolve(table, request, &self.options)?;

        log::debug!(
            "{}: {} sort keys, {} group columns",
            RankPhase::Sorting,
            plan.sort_keys.len(),
            plan.group_by.len()
        );
        // Scans read from `sorted`; the rank column lives in `output`. Both share storage for
        // every other column.
        let sorted = table.sort(&plan.sort_keys)?;
        let mut output = if plan.replace_existing {
            sorted
                .drop_column(&request.new_column)?
                .append_numeric_column(&request.new_column, None)?
        } else {
            sorted.append_numeric_column(&request.new_column, None)?
        };
        let rank_column = output.column_index(&request.new_column).ok_or_else(|| {
            RankError::UnknownColumn {
                column: request.new_column.clone(),
            }
        })?;

        // Sort columns without any missing value cannot disqualify a row.
        let na_columns: Vec<usize> = plan
            .sort_columns()
            .into_iter()
            .filter(|&col| sorted.has_missing(col).unwrap_or(true))
            .collect();

        let partitions = sorted.partition_count();
        log::debug!("{}: {partitions} partitions", RankPhase::Counting);
        let parallel = self.options.parallel;
        let mut maps: Vec<KeyMap> = for_each_partition(parallel, partitions, |p| {
            count_partition(&sorted, p, &plan.group_by, &na_columns)
        })?;

        let distinct_groups = combine_cumulative(&mut maps);
        log::debug!(
            "{}: {distinct_groups} distinct groups",
            RankPhase::Combining
        );

        log::debug!("{}: {partitions} partitions", RankPhase::Ranking);
        let ranks: Vec<PartitionRanks> = for_each_partition(parallel, partitions, |p| {
            let previous = p.checked_sub(1).map(|q| &maps[q]);
            assign_partition(&sorted, p, &plan.group_by, &na_columns, previous)
        })?;

        let mut stats = RankStats {
            partitions,
            distinct_groups,
            ..RankStats::default()
        };
        for (p, values) in ranks.iter().enumerate() {
            let ranked = values.iter().filter(|v| v.is_some()).count();
            stats.ranked_rows += ranked;
            stats.unranked_rows += values.len() - ranked;
            output.write_partition(p, rank_column, values)?;
        }

        log::debug!(
            "{}: {} rows ranked, {} rows left unranked",
            RankPhase::Done,
            stats.ranked_rows,
            stats.unranked_rows
        );
        Ok((output, stats))
    }
}

/// Rank with default options.
pub fn rank_within_group<T: PartitionedTable>(
    table: &T,
    request: &RankRequest,
) -> RankResult<T> {
    RankEngine::default().rank(table, request)
}
