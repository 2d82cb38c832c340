//! Random query generation.
//!
//! Chromosomes are drawn with probability proportional to their size and
//! query lengths from a normal distribution, so larger chromosomes (and
//! their ends) are queried more often. 2D queries are put in upper-triangular
//! operand order before they reach either implementation.

use num_traits::ToPrimitive;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use crate::chromosomes::ChromosomeTable;
use crate::error::{FuzzerError, Result};
use crate::fuzzer_structs::{QueryPair, Range1D};

/// Shortest query the generator will produce, in bp.
pub const MIN_QUERY_LENGTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthParams {
    pub mean: f64,
    pub stddev: f64,
}

impl Default for LengthParams {
    fn default() -> Self {
        Self {
            mean: 5_000_000.0,
            stddev: 1_000_000.0,
        }
    }
}

pub struct QueryGenerator<'a> {
    table: &'a ChromosomeTable,
    chroms: WeightedIndex<i64>,
    lengths: Normal<f64>,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(table: &'a ChromosomeTable, lengths: LengthParams) -> Result<Self> {
        if table.is_empty() {
            return Err(FuzzerError::generation("chromosome table is empty"));
        }
        let chroms = WeightedIndex::new(table.sizes())
            .map_err(|e| FuzzerError::generation(format!("cannot sample chromosomes: {}", e)))?;
        let lengths = Normal::new(lengths.mean, lengths.stddev).map_err(|e| {
            FuzzerError::generation(format!(
                "invalid query length distribution N({}, {}): {}",
                lengths.mean, lengths.stddev, e
            ))
        })?;

        Ok(Self {
            table,
            chroms,
            lengths,
        })
    }

    pub fn table(&self) -> &'a ChromosomeTable {
        self.table
    }

    pub fn generate_1d<R: Rng>(&self, rng: &mut R) -> Range1D {
        let chrom = &self.table.chromosomes()[self.chroms.sample(rng)];
        let size = chrom.size;

        let length = self.lengths.sample(rng).max(MIN_QUERY_LENGTH);
        let center = rng.gen_range(0..=size) as f64;
        let start = (center - length / 2.0).max(0.0);
        let end = (start + length).min(size as f64);

        Range1D::new(
            chrom.name.clone(),
            round_coord(start, size),
            round_coord(end, size),
        )
    }

    pub fn generate_2d<R: Rng>(&self, rng: &mut R) -> QueryPair {
        let first = self.generate_1d(rng);
        let second = self.generate_1d(rng);
        canonicalize(self.table, QueryPair::new(first, second))
    }
}

/// Round half to even, as `%.0f` formatting does, clamped to the chromosome.
fn round_coord(pos: f64, size: i64) -> i64 {
    pos.round_ties_even()
        .to_i64()
        .map_or(size, |p| p.clamp(0, size))
}

/// Order operands by chromosome rank, then by start on the same chromosome.
pub fn canonicalize(table: &ChromosomeTable, pair: QueryPair) -> QueryPair {
    let rank1 = table.rank(&pair.first.chrom).unwrap_or(usize::MAX);
    let rank2 = table.rank(&pair.second.chrom).unwrap_or(usize::MAX);

    let swap = if rank1 != rank2 {
        rank1 > rank2
    } else {
        pair.first.chrom == pair.second.chrom && pair.first.start > pair.second.start
    };

    if swap {
        QueryPair::new(pair.second, pair.first)
    } else {
        pair
    }
}

/// Deterministic stream of queries for one worker.
pub struct QueryStream<'a> {
    generator: QueryGenerator<'a>,
    ratio_2d: f64,
    rng: StdRng,
}

impl<'a> QueryStream<'a> {
    /// `ratio_2d` is the probability that a query is 2D; 0 yields only 1D
    /// queries and 1 only 2D queries.
    pub fn new(generator: QueryGenerator<'a>, ratio_2d: f64, seed: u64) -> Self {
        Self {
            generator,
            ratio_2d,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_query(&mut self) -> QueryPair {
        if self.rng.gen::<f64>() < self.ratio_2d {
            self.generator.generate_2d(&mut self.rng)
        } else {
            QueryPair::diagonal(self.generator.generate_1d(&mut self.rng))
        }
    }
}
