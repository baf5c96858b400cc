//! CSV front end for `grouprank`.
//!
//! [`import_csv`] loads a CSV stream into a paged [`ColumnarTable`], [`write_csv`] writes a table
//! back out, and [`cli`] wires both around a ranking request.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use csv::ByteRecord;
use grouprank_columnar::{
    ColumnSchema, ColumnType, ColumnarTable, ColumnarTableBuilder, TableOptions, Value,
};
use thiserror::Error;

pub mod cli;

/// Field text that reads as a missing value, besides the empty field.
pub const MISSING_MARKER: &str = "NA";

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("csv input was empty")]
    EmptyInput,
    #[error("csv parse error at row {row}, column {column}: {reason}")]
    Parse { row: u64, column: u64, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Rows per page; each page is one partition of the ranking scan.
    pub page_size_rows: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            page_size_rows: TableOptions::default().page_size_rows,
        }
    }
}

/// Import a CSV stream with a header row.
///
/// A column is `Number` when every non-missing field parses as `f64`, otherwise `String`.
/// Empty fields and [`MISSING_MARKER`] are missing in both cases. Rows shorter than the widest
/// row are padded with missing values; extra columns get generated `ColumnN` names.
pub fn import_csv<R: Read>(
    reader: R,
    options: CsvOptions,
) -> Result<ColumnarTable, CsvImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut record = ByteRecord::new();
    let has_header = csv_reader
        .read_byte_record(&mut record)
        .map_err(|e| map_csv_error(e, 1))?;
    if !has_header {
        return Err(CsvImportError::EmptyInput);
    }
    let mut header_names = decode_record(&record, 1)?;

    // Types depend on every row, so the body is buffered before building the table.
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut record_index: u64 = 1;
    loop {
        record.clear();
        match csv_reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                record_index += 1;
                rows.push(decode_record(&record, record_index)?);
            }
            Err(e) => return Err(map_csv_error(e, record_index + 1)),
        }
    }

    let column_count = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header_names.len()))
        .max()
        .unwrap_or(0);
    if header_names.len() < column_count {
        header_names.extend((header_names.len()..column_count).map(|i| format!("Column{}", i + 1)));
    }

    let column_types: Vec<ColumnType> = (0..column_count)
        .map(|col| infer_column_type(rows.iter().map(|row| row.get(col).map(String::as_str))))
        .collect();
    log::debug!(
        "csv import: {} rows, {} columns ({} numeric)",
        rows.len(),
        column_count,
        column_types.iter().filter(|t| **t == ColumnType::Number).count()
    );

    let schema = header_names
        .into_iter()
        .zip(column_types.iter().copied())
        .map(|(name, column_type)| ColumnSchema::new(name, column_type))
        .collect();
    let mut builder = ColumnarTableBuilder::new(
        schema,
        TableOptions {
            page_size_rows: options.page_size_rows,
        },
    );

    let mut strings: HashMap<String, Arc<str>> = HashMap::new();
    let mut values = vec![Value::Null; column_count];
    for row in &rows {
        for (col, slot) in values.iter_mut().enumerate() {
            let field = row.get(col).map(String::as_str).unwrap_or("");
            *slot = parse_field(field, column_types[col], &mut strings);
        }
        builder.append_row(&values);
    }

    Ok(builder.finalize())
}

fn is_missing(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty() || trimmed == MISSING_MARKER
}

fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

fn infer_column_type<'a>(fields: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let mut numeric = true;
    for field in fields.flatten() {
        if !is_missing(field) && parse_number(field).is_none() {
            numeric = false;
            break;
        }
    }
    if numeric {
        ColumnType::Number
    } else {
        ColumnType::String
    }
}

fn parse_field(
    field: &str,
    column_type: ColumnType,
    strings: &mut HashMap<String, Arc<str>>,
) -> Value {
    if is_missing(field) {
        return Value::Null;
    }
    match column_type {
        ColumnType::Number => parse_number(field).map(Value::Number).unwrap_or(Value::Null),
        _ => {
            if let Some(interned) = strings.get(field) {
                return Value::String(interned.clone());
            }
            let interned: Arc<str> = Arc::from(field);
            strings.insert(field.to_string(), interned.clone());
            Value::String(interned)
        }
    }
}

fn decode_record(record: &ByteRecord, row: u64) -> Result<Vec<String>, CsvImportError> {
    let mut out = Vec::with_capacity(record.len());
    for (idx, field) in record.iter().enumerate() {
        let column = idx as u64 + 1;
        out.push(decode_field(field, row, column)?.into_owned());
    }
    Ok(out)
}

fn decode_field(field: &[u8], row: u64, column: u64) -> Result<Cow<'_, str>, CsvImportError> {
    // UTF-8 BOM, as written by spreadsheet exports.
    let field = if row == 1 && column == 1 && field.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &field[3..]
    } else {
        field
    };

    std::str::from_utf8(field)
        .map(Cow::Borrowed)
        .map_err(|e| CsvImportError::Parse {
            row,
            column,
            reason: format!("invalid UTF-8: {e}"),
        })
}

fn map_csv_error(err: csv::Error, fallback_row: u64) -> CsvImportError {
    let reason = err.to_string();
    let pos = err.position().cloned();

    match err.into_kind() {
        csv::ErrorKind::Io(e) => CsvImportError::Io(e),
        _ => {
            let row = pos
                .map(|p| p.record())
                .filter(|r| *r > 0)
                .unwrap_or(fallback_row);
            CsvImportError::Parse {
                row,
                column: 0,
                reason,
            }
        }
    }
}

/// Write `table` as CSV with a header row, in table row order. Missing values are empty fields.
pub fn write_csv<W: Write>(table: &ColumnarTable, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.schema().iter().map(|c| c.name.as_str()))?;

    let mut record: Vec<String> = Vec::with_capacity(table.column_count());
    for row in 0..table.row_count() {
        record.clear();
        record.extend(table.row(row).iter().map(Value::to_string));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}
