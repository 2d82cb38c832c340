use crate::fuzzer_structs::PixelRow;

/// How two result sets for the same query differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Identical,
    RowCountMismatch { expected: usize, found: usize },
    /// Same number of rows, `differences` of them not equal position by position.
    RowMismatch { differences: usize },
}

impl Comparison {
    pub fn is_identical(&self) -> bool {
        matches!(self, Comparison::Identical)
    }
}

/// Positional comparison: rows are never re-sorted, so a permutation of the
/// expected rows is a mismatch.
pub fn diff(expected: &[PixelRow], found: &[PixelRow]) -> Comparison {
    if expected.len() != found.len() {
        return Comparison::RowCountMismatch {
            expected: expected.len(),
            found: found.len(),
        };
    }

    let differences = expected.iter().zip(found).filter(|(e, f)| e != f).count();
    if differences == 0 {
        Comparison::Identical
    } else {
        Comparison::RowMismatch { differences }
    }
}

pub fn compare(expected: &[PixelRow], found: &[PixelRow]) -> bool {
    diff(expected, found).is_identical()
}
