/// How many data rows are read ahead to infer column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleSize {
    /// Infer from the first `n` data rows; rows past the window are decoded
    /// against the schema they produced.
    Records(usize),
    /// Infer from the entire input.
    ///
    /// # Warning
    ///
    /// Incremental reading buffers the whole input before the first row is
    /// returned. Prefer [`SampleSize::Records`] for large streams.
    #[default]
    All,
}

impl SampleSize {
    /// Returns the number of records to sample, or None for All.
    pub fn records(&self) -> Option<usize> {
        match self {
            SampleSize::Records(n) => Some(*n),
            SampleSize::All => None,
        }
    }

    /// Returns true if another row fits into a window already holding `buffered` rows.
    #[inline]
    pub fn admits(&self, buffered: usize) -> bool {
        match self {
            SampleSize::Records(n) => buffered < *n,
            SampleSize::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits() {
        assert!(SampleSize::All.admits(usize::MAX - 1));
        assert!(SampleSize::Records(2).admits(1));
        assert!(!SampleSize::Records(2).admits(2));
        assert!(!SampleSize::Records(0).admits(0));
        assert_eq!(SampleSize::default().records(), None);
    }
}
