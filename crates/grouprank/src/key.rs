use crate::backend::PartitionedTable;
use crate::engine::RankResult;
use std::fmt;

/// The group-by tuple of one row.
///
/// Values compare by their bit pattern, so `-0.0` and `0.0` are different groups. A missing
/// value (`None`, including NaN) equals every other missing value and nothing else, so rows with
/// missing group-by values form their own group.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    bits: Box<[Option<u64>]>,
}

/// Per-partition occurrence counts (after the local scan) or cumulative counts (after combining).
pub type KeyMap = ahash::AHashMap<GroupKey, u64>;

impl GroupKey {
    pub fn new(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let bits = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()).map(f64::to_bits))
            .collect();
        Self { bits }
    }

    /// Read the group-by columns of one row.
    pub(crate) fn from_row<T: PartitionedTable>(
        table: &T,
        partition: usize,
        row: usize,
        group_by: &[usize],
    ) -> RankResult<Self> {
        let mut values = Vec::with_capacity(group_by.len());
        for &col in group_by {
            values.push(table.read_scalar(partition, row, col)?);
        }
        Ok(Self::new(values))
    }

    fn values(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.bits.iter().map(|v| v.map(f64::from_bits))
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values().map(|v| match v {
                Some(x) => format!("{x}"),
                None => "NA".to_string(),
            }))
            .finish()
    }
}

/// Whether any of `columns` is missing in this row.
pub(crate) fn row_has_missing<T: PartitionedTable>(
    table: &T,
    partition: usize,
    row: usize,
    columns: &[usize],
) -> RankResult<bool> {
    for &col in columns {
        if table.read_scalar(partition, row, col)?.is_none() {
            return Ok(true);
        }
    }
    Ok(false)
}
