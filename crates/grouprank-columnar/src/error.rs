#![forbid(unsafe_code)]

use crate::types::ColumnType;

pub type ColumnarResult<T> = Result<T, ColumnarError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnarError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column index {index} out of range for a table with {column_count} columns")]
    ColumnOutOfRange { index: usize, column_count: usize },

    #[error("partition {partition} out of range for a table with {partition_count} partitions")]
    PartitionOutOfRange {
        partition: usize,
        partition_count: usize,
    },

    #[error("row {row} out of range for partition {partition} with {len} rows")]
    RowOutOfRange {
        partition: usize,
        row: usize,
        len: usize,
    },

    #[error("partition {partition} holds {expected} rows, got {actual} values")]
    PageLengthMismatch {
        partition: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column {column} has type {column_type:?} and cannot take numeric writes")]
    NotWritable {
        column: String,
        column_type: ColumnType,
    },

    #[error("invalid sort direction: {0}")]
    InvalidSortDirection(String),
}
