#![forbid(unsafe_code)]

use crate::error::ColumnarError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColumnType {
    #[default]
    Number,
    Boolean,
    /// Integer ticks (e.g. milliseconds since the epoch).
    DateTime,
    /// Categorical text. Reads numerically as the level index in the sorted dictionary.
    String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Boolean(bool),
    DateTime(i64),
    String(Arc<str>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::DateTime(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Numeric sort-order codes: positive means ascending, negative means descending.
    pub fn from_code(code: i64) -> Option<Self> {
        match code.signum() {
            1 => Some(SortDirection::Ascending),
            -1 => Some(SortDirection::Descending),
            _ => None,
        }
    }

    pub fn is_descending(self) -> bool {
        self == SortDirection::Descending
    }
}

impl FromStr for SortDirection {
    type Err = ColumnarError;

    /// Accepts `asc`/`ascending`, `desc`/`descending` or a numeric code (see
    /// [`SortDirection::from_code`]).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let parsed = match s.parse::<i64>() {
            Ok(code) => SortDirection::from_code(code),
            Err(_) => match s.as_str() {
                "asc" | "ascending" => Some(SortDirection::Ascending),
                "desc" | "descending" => Some(SortDirection::Descending),
                _ => None,
            },
        };
        parsed.ok_or(ColumnarError::InvalidSortDirection(s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub column: usize,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Descending,
        }
    }
}
