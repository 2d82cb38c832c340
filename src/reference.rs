//! In-process reference engine.
//!
//! Pixels are kept in storage order (bin1 then bin2, bins ordered by
//! chromosome rank then position) and selected the way the reference
//! library does it: a stored pixel is returned iff its first bin overlaps the
//! first range and its second bin overlaps the second range.

use std::path::Path;

use radsort::sort_by_key;

use crate::chromosomes::ChromosomeTable;
use crate::error::{FuzzerError, Result};
use crate::executor::QueryExecutor;
use crate::fuzzer_structs::{PixelRow, QueryPair};
use crate::pixels;

#[derive(Debug, Clone)]
struct StoredPixel {
    rank1: usize,
    rank2: usize,
    row: PixelRow,
}

pub struct PixelStore {
    table: ChromosomeTable,
    pixels: Vec<StoredPixel>,
    /// Widest first bin, bounds how far left of a query a match can start.
    max_span1: i64,
}

impl PixelStore {
    pub fn new(table: ChromosomeTable, rows: Vec<PixelRow>) -> Result<Self> {
        let mut pixels = Vec::with_capacity(rows.len());
        let mut max_span1 = 0;

        for (i, row) in rows.into_iter().enumerate() {
            let lookup = |chrom: &str| {
                table.rank(chrom).ok_or_else(|| {
                    FuzzerError::config(format!(
                        "pixel {} refers to unknown chromosome \"{}\"",
                        i + 1,
                        chrom
                    ))
                })
            };
            let rank1 = lookup(&row.chrom1)?;
            let rank2 = lookup(&row.chrom2)?;

            if row.start1 > row.end1 || row.start2 > row.end2 {
                return Err(FuzzerError::config(format!("pixel {} has an inverted bin: {}", i + 1, row)));
            }
            if (rank1, row.start1) > (rank2, row.start2) {
                return Err(FuzzerError::config(format!(
                    "pixel {} is not in the upper triangle: {}",
                    i + 1,
                    row
                )));
            }

            max_span1 = max_span1.max(row.end1 - row.start1);
            pixels.push(StoredPixel { rank1, rank2, row });
        }

        sort_by_key(&mut pixels, |p| p.row.end2);
        sort_by_key(&mut pixels, |p| p.row.end1);
        sort_by_key(&mut pixels, |p| p.row.start2);
        sort_by_key(&mut pixels, |p| p.rank2);
        sort_by_key(&mut pixels, |p| p.row.start1);
        sort_by_key(&mut pixels, |p| p.rank1);

        Ok(Self {
            table,
            pixels,
            max_span1,
        })
    }

    /// Load a joined pixel dump, e.g. the output of `cooler dump --join`.
    pub fn from_dump(table: ChromosomeTable, path: &Path) -> Result<Self> {
        let rows = pixels::read_pixels_from_file(path).map_err(|e| FuzzerError::table(path, e))?;
        Self::new(table, rows)
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn table(&self) -> &ChromosomeTable {
        &self.table
    }

    pub fn fetch(&self, query: &QueryPair) -> Result<Vec<PixelRow>> {
        let (q1, q2) = (&query.first, &query.second);
        let unknown = |chrom: &str| FuzzerError::Execution {
            executor: self.name().to_string(),
            query1: q1.to_string(),
            query2: q2.to_string(),
            message: format!("invalid chromosome \"{}\"", chrom),
            stderr: String::new(),
        };
        let rank1 = self.table.rank(&q1.chrom).ok_or_else(|| unknown(&q1.chrom))?;
        self.table.rank(&q2.chrom).ok_or_else(|| unknown(&q2.chrom))?;

        let lower = (rank1, q1.start.saturating_sub(self.max_span1));
        let upper = (rank1, q1.end);
        let first = self.pixels.partition_point(|p| (p.rank1, p.row.start1) < lower);
        let last = self.pixels.partition_point(|p| (p.rank1, p.row.start1) < upper);

        Ok(self.pixels[first..last.max(first)]
            .iter()
            .map(|p| &p.row)
            .filter(|row| {
                q1.overlaps(&row.chrom1, row.start1, row.end1) && q2.overlaps(&row.chrom2, row.start2, row.end2)
            })
            .cloned()
            .collect())
    }
}

impl QueryExecutor for PixelStore {
    fn name(&self) -> &str {
        "reference"
    }

    fn execute(&self, query: &QueryPair) -> Result<Vec<PixelRow>> {
        self.fetch(query)
    }
}
