use grouprank::{
    PartitionedTable, RankEngine, RankError, RankOptions, RankRequest, RankResult, SortKey,
};
use grouprank_columnar::{
    ColumnSchema, ColumnType, ColumnarTable, ColumnarTableBuilder, TableOptions, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a columnar table, counting reads and writes and failing reads in one partition.
#[derive(Clone, Debug)]
struct FlakyTable {
    inner: ColumnarTable,
    failing_partition: Option<usize>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl FlakyTable {
    fn new(inner: ColumnarTable, failing_partition: Option<usize>) -> Self {
        Self {
            inner,
            failing_partition,
            reads: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_inner(&self, inner: ColumnarTable) -> Self {
        Self {
            inner,
            ..self.clone()
        }
    }
}

impl PartitionedTable for FlakyTable {
    fn column_names(&self) -> Vec<String> {
        self.inner.column_names()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        PartitionedTable::column_index(&self.inner, name)
    }

    fn partition_count(&self) -> usize {
        PartitionedTable::partition_count(&self.inner)
    }

    fn partition_len(&self, partition: usize) -> usize {
        PartitionedTable::partition_len(&self.inner, partition)
    }

    fn read_scalar(&self, partition: usize, row: usize, column: usize) -> RankResult<Option<f64>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_partition == Some(partition) {
            return Err(RankError::Storage {
                partition,
                message: "page checksum mismatch".to_string(),
            });
        }
        PartitionedTable::read_scalar(&self.inner, partition, row, column)
    }

    fn sort(&self, keys: &[SortKey]) -> RankResult<Self> {
        Ok(self.with_inner(PartitionedTable::sort(&self.inner, keys)?))
    }

    fn append_numeric_column(&self, name: &str, fill: Option<f64>) -> RankResult<Self> {
        Ok(self.with_inner(PartitionedTable::append_numeric_column(&self.inner, name, fill)?))
    }

    fn drop_column(&self, name: &str) -> RankResult<Self> {
        Ok(self.with_inner(PartitionedTable::drop_column(&self.inner, name)?))
    }

    fn write_scalar(
        &mut self,
        partition: usize,
        row: usize,
        column: usize,
        value: Option<f64>,
    ) -> RankResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        PartitionedTable::write_scalar(&mut self.inner, partition, row, column, value)
    }
}

fn table() -> ColumnarTable {
    let schema = vec![
        ColumnSchema::new("g", ColumnType::Number),
        ColumnSchema::new("s", ColumnType::Number),
    ];
    let mut builder = ColumnarTableBuilder::new(schema, TableOptions { page_size_rows: 3 });
    for i in 0..10 {
        let s = if i == 4 { Value::Null } else { Value::Number(i as f64) };
        builder.append_row(&[Value::Number((i % 3) as f64), s]);
    }
    builder.finalize()
}

fn request() -> RankRequest {
    RankRequest::new("rank").group_by("g").ascending("s")
}

#[test]
fn default_write_partition_goes_through_write_scalar() {
    let flaky = FlakyTable::new(table(), None);

    let out = RankEngine::default().rank(&flaky, &request()).unwrap();

    assert_eq!(flaky.writes.load(Ordering::SeqCst), 10);
    let ranks: Vec<Option<f64>> = (0..out.partition_count())
        .flat_map(|p| (0..out.partition_len(p)).map(move |row| (p, row)))
        .map(|(p, row)| out.read_scalar(p, row, 2).unwrap())
        .collect();
    // Sorted by s with the missing value first: NA, 0, 1, 2, 3, 5, 6, 7, 8, 9.
    assert_eq!(
        ranks,
        vec![
            None,
            Some(1.0),
            Some(1.0),
            Some(1.0),
            Some(2.0),
            Some(2.0),
            Some(3.0),
            Some(2.0),
            Some(3.0),
            Some(4.0),
        ]
    );
}

#[test]
fn a_failing_partition_aborts_before_anything_is_written() {
    for parallel in [true, false] {
        let flaky = FlakyTable::new(table(), Some(2));
        let engine = RankEngine::new(RankOptions {
            parallel,
            ..RankOptions::default()
        });

        let err = engine.rank(&flaky, &request()).unwrap_err();

        assert!(matches!(err, RankError::Storage { partition: 2, .. }), "{err}");
        assert!(!err.is_schema_error());
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn schema_errors_are_raised_before_any_partition_is_read() {
    let flaky = FlakyTable::new(table(), None);

    let err = RankEngine::default()
        .rank(&flaky, &RankRequest::new("rank").group_by("nope").ascending("s"))
        .unwrap_err();

    assert!(err.is_schema_error());
    assert_eq!(flaky.reads.load(Ordering::SeqCst), 0);
    assert_eq!(flaky.writes.load(Ordering::SeqCst), 0);
}
