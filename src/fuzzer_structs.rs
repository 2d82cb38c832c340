use std::fmt;

/// A genomic range on a single chromosome, half-open in the pixel store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Range1D {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

impl Range1D {
    pub fn new(chrom: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    #[inline]
    pub fn overlaps(&self, chrom: &str, start: i64, end: i64) -> bool {
        self.start < self.end && self.chrom == chrom && start < self.end && end > self.start
    }
}

/// UCSC-style `chrom:start-end`, the form the candidate binary expects.
impl fmt::Display for Range1D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Operands of a 2D query. 1D queries use the same range twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPair {
    pub first: Range1D,
    pub second: Range1D,
}

impl QueryPair {
    pub fn new(first: Range1D, second: Range1D) -> Self {
        Self { first, second }
    }

    pub fn diagonal(range: Range1D) -> Self {
        Self {
            second: range.clone(),
            first: range,
        }
    }

    pub fn is_1d(&self) -> bool {
        self.first == self.second
    }
}

impl fmt::Display for QueryPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.first, self.second)
    }
}

/// One non-zero matrix entry in joined (BEDPE-like) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PixelRow {
    pub chrom1: String,
    pub start1: i64,
    pub end1: i64,
    pub chrom2: String,
    pub start2: i64,
    pub end2: i64,
    pub count: i64,
}

impl fmt::Display for PixelRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom1, self.start1, self.end1, self.chrom2, self.start2, self.end2, self.count
        )
    }
}

/// Tally returned by a worker that stopped cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerResult {
    pub queries_executed: u64,
    pub failures: u64,
}

impl WorkerResult {
    pub fn record(&mut self, identical: bool) {
        self.queries_executed += 1;
        if !identical {
            self.failures += 1;
        }
    }

    pub fn successes(&self) -> u64 {
        self.queries_executed - self.failures
    }
}
