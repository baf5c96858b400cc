//! Paged columnar storage for `grouprank`.
//!
//! This crate focuses on:
//! - Columnar data representation split into fixed-size pages. A page is the unit of
//!   partitioning: every column shares the same page boundaries.
//! - Nullable numeric access to every column (`read_scalar`), including categorical string
//!   columns which read as their level index in the sorted dictionary.
//! - Whole-table operations a ranking pass needs from its storage: stable multi-key sort,
//!   appending/dropping a nullable numeric column and page-level writes.

#![forbid(unsafe_code)]

mod bitmap;
mod error;
mod table;
mod types;

pub use crate::error::{ColumnarError, ColumnarResult};
pub use crate::table::{ColumnSchema, ColumnarTable, ColumnarTableBuilder, TableOptions};
pub use crate::types::{ColumnType, SortDirection, SortKey, Value};
