use crate::backend::PartitionedTable;
use crate::engine::{RankError, RankResult};
use grouprank_columnar::{SortDirection, SortKey};
use std::fmt;

/// A column reference, by name or by position in the table schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    Name(String),
    Index(usize),
}

impl ColumnRef {
    pub(crate) fn resolve<T: PartitionedTable>(&self, table: &T) -> RankResult<usize> {
        match self {
            ColumnRef::Name(name) => {
                table
                    .column_index(name)
                    .ok_or_else(|| RankError::UnknownColumn {
                        column: name.clone(),
                    })
            }
            ColumnRef::Index(index) => {
                let column_count = table.column_count();
                if *index < column_count {
                    Ok(*index)
                } else {
                    Err(RankError::ColumnIndexOutOfRange {
                        index: *index,
                        column_count,
                    })
                }
            }
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        ColumnRef::Name(name)
    }
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Name(name) => f.write_str(name),
            ColumnRef::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// A "rank within group" request.
///
/// `sort_by` and `directions` pair up positionally and must have equal length. A column may
/// appear in both `group_by` and `sort_by`. An empty `group_by` ranks the whole table as one
/// group.
#[derive(Clone, Debug, PartialEq)]
pub struct RankRequest {
    pub group_by: Vec<ColumnRef>,
    pub sort_by: Vec<ColumnRef>,
    pub directions: Vec<SortDirection>,
    pub new_column: String,
}

impl RankRequest {
    pub fn new(new_column: impl Into<String>) -> Self {
        Self {
            group_by: Vec::new(),
            sort_by: Vec::new(),
            directions: Vec::new(),
            new_column: new_column.into(),
        }
    }

    pub fn group_by(mut self, column: impl Into<ColumnRef>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn sort_by(mut self, column: impl Into<ColumnRef>, direction: SortDirection) -> Self {
        self.sort_by.push(column.into());
        self.directions.push(direction);
        self
    }

    pub fn ascending(self, column: impl Into<ColumnRef>) -> Self {
        self.sort_by(column, SortDirection::Ascending)
    }

    pub fn descending(self, column: impl Into<ColumnRef>) -> Self {
        self.sort_by(column, SortDirection::Descending)
    }
}

/// What to do when the requested rank column name already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistingColumnPolicy {
    /// Fail with [`RankError::DuplicateColumn`] before any work is done.
    #[default]
    Reject,
    /// Drop the existing column from the output and append the rank column in its place at
    /// the end of the schema. The old column can still be used for grouping or sorting.
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankOptions {
    /// Scan partitions on the rayon pool when available.
    pub parallel: bool,
    pub existing_column: ExistingColumnPolicy,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            existing_column: ExistingColumnPolicy::Reject,
        }
    }
}

/// A request resolved against a concrete table schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RankPlan {
    pub(crate) group_by: Vec<usize>,
    pub(crate) sort_keys: Vec<SortKey>,
    pub(crate) replace_existing: bool,
}

impl RankPlan {
    /// Validate `request` against `table`. Every schema error is raised here, before any
    /// partition is scanned.
    pub(crate) fn resolve<T: PartitionedTable>(
        table: &T,
        request: &RankRequest,
        options: &RankOptions,
    ) -> RankResult<Self> {
        if request.sort_by.len() != request.directions.len() {
            return Err(RankError::SortDirectionMismatch {
                columns: request.sort_by.len(),
                directions: request.directions.len(),
            });
        }

        let group_by = request
            .group_by
            .iter()
            .map(|c| c.resolve(table))
            .collect::<RankResult<Vec<_>>>()?;

        let sort_keys = request
            .sort_by
            .iter()
            .zip(&request.directions)
            .map(|(c, &direction)| -> RankResult<SortKey> {
                Ok(SortKey {
                    column: c.resolve(table)?,
                    direction,
                })
            })
            .collect::<RankResult<Vec<_>>>()?;

        let exists = table.column_index(&request.new_column).is_some();
        if exists && options.existing_column == ExistingColumnPolicy::Reject {
            return Err(RankError::DuplicateColumn {
                column: request.new_column.clone(),
            });
        }

        Ok(Self {
            group_by,
            sort_keys,
            replace_existing: exists,
        })
    }

    /// Sort columns a row must have values in to be ranked.
    pub(crate) fn sort_columns(&self) -> Vec<usize> {
        self.sort_keys.iter().map(|k| k.column).collect()
    }
}
