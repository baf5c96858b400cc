use crate::engine::{RankError, RankResult};
use grouprank_columnar::{ColumnarTable, SortKey};

/// Storage abstraction for the partitioned tables the ranking engine works on.
///
/// The engine relies on this trait to:
/// - resolve column indices by name
/// - enumerate partitions and their lengths
/// - read one nullable numeric scalar by (partition, row, column)
/// - produce a sorted copy, and a copy with an extra nullable numeric column
/// - write the rank column back, one partition at a time
///
/// Reads must be callable from several threads at once; the engine scans partitions in
/// parallel and never writes while a scan is running.
pub trait PartitionedTable: Sized + Send + Sync {
    fn column_names(&self) -> Vec<String>;

    fn column_count(&self) -> usize {
        self.column_names().len()
    }

    fn column_index(&self, name: &str) -> Option<usize>;

    fn partition_count(&self) -> usize;

    fn partition_len(&self, partition: usize) -> usize;

    /// `Ok(None)` is a missing value.
    fn read_scalar(&self, partition: usize, row: usize, column: usize)
        -> RankResult<Option<f64>>;

    /// A copy of the table in a stable total order by `keys`.
    fn sort(&self, keys: &[SortKey]) -> RankResult<Self>;

    fn append_numeric_column(&self, name: &str, fill: Option<f64>) -> RankResult<Self>;

    fn drop_column(&self, name: &str) -> RankResult<Self>;

    fn write_scalar(
        &mut self,
        partition: usize,
        row: usize,
        column: usize,
        value: Option<f64>,
    ) -> RankResult<()>;

    fn write_partition(
        &mut self,
        partition: usize,
        column: usize,
        values: &[Option<f64>],
    ) -> RankResult<()> {
        for (row, value) in values.iter().enumerate() {
            self.write_scalar(partition, row, column, *value)?;
        }
        Ok(())
    }

    /// Whether a column holds any missing values, if the backend keeps that statistic.
    fn has_missing(&self, _column: usize) -> Option<bool> {
        None
    }
}

fn storage_error(partition: usize, err: grouprank_columnar::ColumnarError) -> RankError {
    RankError::Storage {
        partition,
        message: err.to_string(),
    }
}

impl PartitionedTable for ColumnarTable {
    fn column_names(&self) -> Vec<String> {
        self.schema().iter().map(|c| c.name.clone()).collect()
    }

    fn column_count(&self) -> usize {
        ColumnarTable::column_count(self)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        ColumnarTable::column_index(self, name)
    }

    fn partition_count(&self) -> usize {
        ColumnarTable::partition_count(self)
    }

    fn partition_len(&self, partition: usize) -> usize {
        ColumnarTable::partition_len(self, partition)
    }

    fn read_scalar(
        &self,
        partition: usize,
        row: usize,
        column: usize,
    ) -> RankResult<Option<f64>> {
        ColumnarTable::read_scalar(self, partition, row, column)
            .map_err(|err| storage_error(partition, err))
    }

    fn sort(&self, keys: &[SortKey]) -> RankResult<Self> {
        Ok(ColumnarTable::sort(self, keys)?)
    }

    fn append_numeric_column(&self, name: &str, fill: Option<f64>) -> RankResult<Self> {
        Ok(ColumnarTable::append_numeric_column(self, name, fill)?)
    }

    fn drop_column(&self, name: &str) -> RankResult<Self> {
        Ok(ColumnarTable::drop_column(self, name)?)
    }

    fn write_scalar(
        &mut self,
        partition: usize,
        row: usize,
        column: usize,
        value: Option<f64>,
    ) -> RankResult<()> {
        ColumnarTable::write_scalar(self, partition, row, column, value)
            .map_err(|err| storage_error(partition, err))
    }

    fn write_partition(
        &mut self,
        partition: usize,
        column: usize,
        values: &[Option<f64>],
    ) -> RankResult<()> {
        ColumnarTable::write_partition(self, partition, column, values)
            .map_err(|err| storage_error(partition, err))
    }

    fn has_missing(&self, column: usize) -> Option<bool> {
        self.null_count(column).map(|n| n > 0)
    }
}
