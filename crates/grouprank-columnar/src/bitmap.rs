/// Per-page validity mask.
///
/// Bits are stored little-endian within each `u64` word (bit 0 is the LSB of word 0). A set bit
/// means the slot holds a value; a cleared bit means the slot is missing. Pages with no missing
/// slot carry no mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ValidityMask {
    words: Vec<u64>,
    len: usize,
    missing: usize,
}

impl ValidityMask {
    /// A mask of `len` slots, all missing.
    pub(crate) fn all_missing(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(64)],
            len,
            missing: len,
        }
    }

    /// A mask of `len` slots, all present.
    pub(crate) fn all_present(len: usize) -> Self {
        let mut words = vec![u64::MAX; len.div_ceil(64)];
        let rem = len % 64;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << rem) - 1;
            }
        }
        Self {
            words,
            len,
            missing: 0,
        }
    }

    /// Mask for a page of nullable values, or `None` when every value is present. NaN counts as
    /// missing.
    pub(crate) fn for_values(values: &[Option<f64>]) -> Option<Self> {
        let mut mask = Self::all_missing(values.len());
        for (idx, value) in values.iter().enumerate() {
            if value.is_some_and(|v| !v.is_nan()) {
                mask.mark_present(idx);
            }
        }
        (mask.missing > 0).then_some(mask)
    }

    pub(crate) fn is_present(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "validity index out of bounds");
        (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    /// Mark `idx` present. Returns `true` once no slot is missing anymore.
    pub(crate) fn mark_present(&mut self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "validity index out of bounds");
        let mask = 1u64 << (idx % 64);
        let word = &mut self.words[idx / 64];
        if *word & mask == 0 {
            *word |= mask;
            self.missing -= 1;
        }
        self.missing == 0
    }

    pub(crate) fn mark_missing(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "validity index out of bounds");
        let mask = 1u64 << (idx % 64);
        let word = &mut self.words[idx / 64];
        if *word & mask != 0 {
            *word &= !mask;
            self.missing += 1;
        }
    }

    pub(crate) fn missing_count(&self) -> usize {
        self.missing
    }
}
