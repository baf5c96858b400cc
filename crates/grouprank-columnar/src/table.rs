#![forbid(unsafe_code)]

use crate::bitmap::ValidityMask;
use crate::error::{ColumnarError, ColumnarResult};
use crate::types::{ColumnType, SortDirection, SortKey, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    /// Rows per page. Every page except the last holds exactly this many rows.
    pub page_size_rows: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            page_size_rows: 65_536,
        }
    }
}

impl TableOptions {
    fn normalized(self) -> Self {
        Self {
            page_size_rows: self.page_size_rows.max(1),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// One page of one column. `validity == None` means every slot holds a value; missing slots
/// store `0.0`.
#[derive(Clone, Debug, PartialEq)]
struct Page {
    values: Vec<f64>,
    validity: Option<ValidityMask>,
}

impl Page {
    fn filled(len: usize, fill: Option<f64>) -> Self {
        match fill.filter(|v| !v.is_nan()) {
            Some(v) => Page {
                values: vec![v; len],
                validity: None,
            },
            None => Page {
                values: vec![0.0; len],
                validity: (len > 0).then(|| ValidityMask::all_missing(len)),
            },
        }
    }

    fn from_options(values: &[Option<f64>]) -> Self {
        Page {
            validity: ValidityMask::for_values(values),
            values: values
                .iter()
                .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
                .collect(),
        }
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn get(&self, idx: usize) -> Option<f64> {
        let value = *self.values.get(idx)?;
        match &self.validity {
            Some(mask) if !mask.is_present(idx) => None,
            _ => Some(value),
        }
    }

    fn set(&mut self, idx: usize, value: Option<f64>) {
        match value.filter(|v| !v.is_nan()) {
            Some(v) => {
                self.values[idx] = v;
                if self.validity.as_mut().is_some_and(|m| m.mark_present(idx)) {
                    self.validity = None;
                }
            }
            None => {
                self.values[idx] = 0.0;
                let len = self.values.len();
                self.validity
                    .get_or_insert_with(|| ValidityMask::all_present(len))
                    .mark_missing(idx);
            }
        }
    }

    fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, ValidityMask::missing_count)
    }
}

#[derive(Clone, Debug)]
struct Column {
    schema: ColumnSchema,
    pages: Vec<Page>,
    /// Sorted level names for `ColumnType::String` columns.
    dictionary: Option<Arc<Vec<Arc<str>>>>,
}

impl Column {
    fn null_count(&self) -> u64 {
        self.pages.iter().map(|p| p.null_count() as u64).sum()
    }

    fn flat_values(&self) -> Vec<Option<f64>> {
        self.pages
            .iter()
            .flat_map(|page| (0..page.len()).map(move |idx| page.get(idx)))
            .collect()
    }

    fn value_at(&self, page: usize, idx: usize) -> Value {
        let Some(v) = self.pages.get(page).and_then(|p| p.get(idx)) else {
            return Value::Null;
        };
        match self.schema.column_type {
            ColumnType::Number => Value::Number(v),
            ColumnType::Boolean => Value::Boolean(v != 0.0),
            ColumnType::DateTime => Value::DateTime(v as i64),
            ColumnType::String => self
                .dictionary
                .as_ref()
                .and_then(|dict| dict.get(v as usize))
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
        }
    }

    fn repaged(&self, values: &[Option<f64>], page_size: usize) -> Column {
        Column {
            schema: self.schema.clone(),
            pages: paginate(values, page_size),
            dictionary: self.dictionary.clone(),
        }
    }
}

fn paginate(values: &[Option<f64>], page_size: usize) -> Vec<Page> {
    values.chunks(page_size).map(Page::from_options).collect()
}

/// Missing values sort first regardless of direction; ties compare equal so a stable sort
/// keeps their input order.
fn compare_nullable(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if direction.is_descending() {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// An immutable-schema columnar table split into equally sized pages.
///
/// Columns are reference counted, so whole-table operations that only add or remove a column
/// (`append_numeric_column`, `drop_column`) do not copy the remaining columns. Writes go through
/// `Arc::make_mut` and therefore never affect other tables sharing the column.
#[derive(Clone, Debug)]
pub struct ColumnarTable {
    schema: Vec<ColumnSchema>,
    columns: Vec<Arc<Column>>,
    rows: usize,
    options: TableOptions,
}

impl ColumnarTable {
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn options(&self) -> TableOptions {
        self.options
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|c| c.name == name)
    }

    /// Return the sorted level names backing a string column.
    pub fn dictionary(&self, col: usize) -> Option<Arc<Vec<Arc<str>>>> {
        self.columns.get(col)?.dictionary.clone()
    }

    pub fn null_count(&self, col: usize) -> Option<u64> {
        self.columns.get(col).map(|c| c.null_count())
    }

    fn page_size(&self) -> usize {
        self.options.page_size_rows
    }

    pub fn partition_count(&self) -> usize {
        self.rows.div_ceil(self.page_size())
    }

    pub fn partition_len(&self, partition: usize) -> usize {
        if partition >= self.partition_count() {
            return 0;
        }
        (self.rows - partition * self.page_size()).min(self.page_size())
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Value {
        let Some(column) = self.columns.get(col) else {
            return Value::Null;
        };
        if row >= self.rows {
            return Value::Null;
        }
        column.value_at(row / self.page_size(), row % self.page_size())
    }

    /// All cells of a row, in schema order.
    pub fn row(&self, row: usize) -> Vec<Value> {
        (0..self.columns.len())
            .map(|col| self.get_cell(row, col))
            .collect()
    }

    fn check_column(&self, col: usize) -> ColumnarResult<&Column> {
        self.columns
            .get(col)
            .map(|c| &**c)
            .ok_or(ColumnarError::ColumnOutOfRange {
                index: col,
                column_count: self.columns.len(),
            })
    }

    fn check_partition(&self, partition: usize) -> ColumnarResult<usize> {
        let partition_count = self.partition_count();
        if partition >= partition_count {
            return Err(ColumnarError::PartitionOutOfRange {
                partition,
                partition_count,
            });
        }
        Ok(self.partition_len(partition))
    }

    fn check_row(&self, partition: usize, row: usize) -> ColumnarResult<()> {
        let len = self.check_partition(partition)?;
        if row >= len {
            return Err(ColumnarError::RowOutOfRange {
                partition,
                row,
                len,
            });
        }
        Ok(())
    }

    fn writable_column_mut(&mut self, col: usize) -> ColumnarResult<&mut Column> {
        let column = self.check_column(col)?;
        if column.schema.column_type != ColumnType::Number {
            return Err(ColumnarError::NotWritable {
                column: column.schema.name.clone(),
                column_type: column.schema.column_type,
            });
        }
        Ok(Arc::make_mut(&mut self.columns[col]))
    }

    /// Numeric reading of one cell; `None` is a missing value.
    pub fn read_scalar(
        &self,
        partition: usize,
        row: usize,
        col: usize,
    ) -> ColumnarResult<Option<f64>> {
        let column = self.check_column(col)?;
        self.check_row(partition, row)?;
        Ok(column.pages[partition].get(row))
    }

    pub fn write_scalar(
        &mut self,
        partition: usize,
        row: usize,
        col: usize,
        value: Option<f64>,
    ) -> ColumnarResult<()> {
        self.check_row(partition, row)?;
        let column = self.writable_column_mut(col)?;
        column.pages[partition].set(row, value);
        Ok(())
    }

    /// Replace every slot of `col` within `partition`.
    pub fn write_partition(
        &mut self,
        partition: usize,
        col: usize,
        values: &[Option<f64>],
    ) -> ColumnarResult<()> {
        let expected = self.check_partition(partition)?;
        if values.len() != expected {
            return Err(ColumnarError::PageLengthMismatch {
                partition,
                expected,
                actual: values.len(),
            });
        }
        let column = self.writable_column_mut(col)?;
        column.pages[partition] = Page::from_options(values);
        Ok(())
    }

    /// Stable multi-key sort. Missing values sort first for either direction.
    pub fn sort(&self, keys: &[SortKey]) -> ColumnarResult<ColumnarTable> {
        for key in keys {
            self.check_column(key.column)?;
        }
        if keys.is_empty() {
            return Ok(self.clone());
        }

        let key_values: Vec<Vec<Option<f64>>> = keys
            .iter()
            .map(|k| self.columns[k.column].flat_values())
            .collect();

        let mut order: Vec<usize> = (0..self.rows).collect();
        order.sort_by(|&a, &b| {
            for (key, values) in keys.iter().zip(&key_values) {
                let ord = compare_nullable(values[a], values[b], key.direction);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        Ok(self.take(&order))
    }

    /// Gather rows in `order` into a new table with the same page size.
    fn take(&self, order: &[usize]) -> ColumnarTable {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let flat = column.flat_values();
                let gathered: Vec<Option<f64>> = order.iter().map(|&row| flat[row]).collect();
                Arc::new(column.repaged(&gathered, self.page_size()))
            })
            .collect();

        ColumnarTable {
            schema: self.schema.clone(),
            columns,
            rows: order.len(),
            options: self.options,
        }
    }

    /// Same rows and values, new page boundaries.
    pub fn repartition(&self, page_size_rows: usize) -> ColumnarTable {
        let options = TableOptions { page_size_rows }.normalized();
        let columns = self
            .columns
            .iter()
            .map(|column| Arc::new(column.repaged(&column.flat_values(), options.page_size_rows)))
            .collect();

        ColumnarTable {
            schema: self.schema.clone(),
            columns,
            rows: self.rows,
            options,
        }
    }

    /// Append a nullable `Number` column with every slot set to `fill`.
    pub fn append_numeric_column(
        &self,
        name: impl Into<String>,
        fill: Option<f64>,
    ) -> ColumnarResult<ColumnarTable> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(ColumnarError::DuplicateColumn(name));
        }

        let schema = ColumnSchema::new(name, ColumnType::Number);
        let pages = (0..self.partition_count())
            .map(|p| Page::filled(self.partition_len(p), fill))
            .collect();

        let mut out = self.clone();
        out.schema.push(schema.clone());
        out.columns.push(Arc::new(Column {
            schema,
            pages,
            dictionary: None,
        }));
        Ok(out)
    }

    pub fn drop_column(&self, name: &str) -> ColumnarResult<ColumnarTable> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ColumnarError::UnknownColumn(name.to_string()))?;
        let mut out = self.clone();
        out.schema.remove(idx);
        out.columns.remove(idx);
        Ok(out)
    }
}

pub struct ColumnarTableBuilder {
    schema: Vec<ColumnSchema>,
    options: TableOptions,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

struct ColumnBuilder {
    schema: ColumnSchema,
    current: Vec<Option<f64>>,
    pages: Vec<Page>,
    dictionary: Option<DictBuilder>,
}

#[derive(Default)]
struct DictBuilder {
    levels: Vec<Arc<str>>,
    index: HashMap<Arc<str>, u32>,
}

impl DictBuilder {
    fn intern(&mut self, s: &Arc<str>) -> u32 {
        if let Some(idx) = self.index.get(s.as_ref()) {
            return *idx;
        }
        let idx = self.levels.len() as u32;
        self.levels.push(s.clone());
        self.index.insert(s.clone(), idx);
        idx
    }

    /// Sort levels lexicographically. Returns the sorted levels and a map from
    /// insertion-order index to sorted index.
    fn finish(self) -> (Vec<Arc<str>>, Vec<u32>) {
        let mut order: Vec<usize> = (0..self.levels.len()).collect();
        order.sort_by(|&a, &b| self.levels[a].cmp(&self.levels[b]));

        let mut remap = vec![0u32; self.levels.len()];
        for (sorted, &original) in order.iter().enumerate() {
            remap[original] = sorted as u32;
        }
        let levels = order.into_iter().map(|i| self.levels[i].clone()).collect();
        (levels, remap)
    }
}

impl ColumnBuilder {
    fn new(schema: ColumnSchema, page_size: usize) -> Self {
        let dictionary = (schema.column_type == ColumnType::String).then(DictBuilder::default);
        Self {
            schema,
            current: Vec::with_capacity(page_size),
            pages: Vec::new(),
            dictionary,
        }
    }

    fn push(&mut self, value: &Value) {
        let slot = match (self.schema.column_type, value) {
            (ColumnType::Number, Value::Number(v)) => Some(*v),
            (ColumnType::Boolean, Value::Boolean(b)) => Some(if *b { 1.0 } else { 0.0 }),
            (ColumnType::DateTime, Value::DateTime(v)) => Some(*v as f64),
            (ColumnType::DateTime, Value::Number(v)) => Some(v.trunc()),
            (ColumnType::String, Value::String(s)) => self
                .dictionary
                .as_mut()
                .map(|dict| dict.intern(s) as f64),
            // Null and type mismatches are stored as missing.
            _ => None,
        };
        self.current.push(slot.filter(|v| !v.is_nan()));
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        self.pages.push(Page::from_options(&self.current));
        self.current.clear();
    }

    fn finish(mut self) -> Column {
        self.flush();

        let dictionary = self.dictionary.take().map(|dict| {
            let (levels, remap) = dict.finish();
            for page in &mut self.pages {
                for idx in 0..page.len() {
                    if let Some(v) = page.get(idx) {
                        page.values[idx] = remap[v as usize] as f64;
                    }
                }
            }
            Arc::new(levels)
        });

        Column {
            schema: self.schema,
            pages: self.pages,
            dictionary,
        }
    }
}

impl ColumnarTableBuilder {
    pub fn new(schema: Vec<ColumnSchema>, options: TableOptions) -> Self {
        let options = options.normalized();
        let builders = schema
            .iter()
            .cloned()
            .map(|col| ColumnBuilder::new(col, options.page_size_rows))
            .collect();

        Self {
            schema,
            options,
            builders,
            rows: 0,
        }
    }

    pub fn append_row(&mut self, row: &[Value]) {
        assert_eq!(
            row.len(),
            self.builders.len(),
            "row length must match schema"
        );

        for (builder, value) in self.builders.iter_mut().zip(row.iter()) {
            builder.push(value);
        }

        self.rows += 1;
        if self.rows % self.options.page_size_rows == 0 {
            for builder in &mut self.builders {
                builder.flush();
            }
        }
    }

    pub fn finalize(self) -> ColumnarTable {
        let columns = self
            .builders
            .into_iter()
            .map(|b| Arc::new(b.finish()))
            .collect();

        ColumnarTable {
            schema: self.schema,
            columns,
            rows: self.rows,
            options: self.options,
        }
    }
}
