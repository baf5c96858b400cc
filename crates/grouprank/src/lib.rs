//! Rank rows within groups of a partitioned table.
//!
//! Every row receives its 1-based position among the rows sharing its group-by key, in the
//! order given by the sort columns. Rows missing any sort value stay unranked; rows missing a
//! group-by value form their own group and are ranked like any other.

mod assign;
mod backend;
mod combine;
mod count;
mod engine;
mod key;
mod model;
mod parallel;

pub use crate::assign::{assign_partition, PartitionRanks};
pub use crate::backend::PartitionedTable;
pub use crate::combine::combine_cumulative;
pub use crate::count::count_partition;
pub use crate::engine::{
    rank_within_group, RankEngine, RankError, RankPhase, RankResult, RankStats,
};
pub use crate::key::{GroupKey, KeyMap};
pub use crate::model::{ColumnRef, ExistingColumnPolicy, RankOptions, RankRequest};

pub use grouprank_columnar::{SortDirection, SortKey};
