use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{FuzzerError, Result};
use crate::fuzzer_structs::Range1D;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub name: String,
    pub size: i64,
    /// Position in table order, used to order query operands.
    pub rank: usize,
}

/// Chromosomes of a contact matrix in file order.
#[derive(Debug, Clone, Default)]
pub struct ChromosomeTable {
    chroms: Vec<Chromosome>,
    ranks: FxHashMap<String, usize>,
}

impl ChromosomeTable {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, i64)>) -> Result<Self> {
        let mut table = Self::default();
        for (name, size) in entries {
            let name = name.into();
            if size < 0 {
                return Err(FuzzerError::config(format!(
                    "chromosome \"{}\" has negative size {}",
                    name, size
                )));
            }
            let rank = table.chroms.len();
            if table.ranks.insert(name.clone(), rank).is_some() {
                return Err(FuzzerError::config(format!(
                    "found duplicate chromosome \"{}\"",
                    name
                )));
            }
            table.chroms.push(Chromosome { name, size, rank });
        }

        Ok(table)
    }

    /// Read a two-column `name<TAB>size` file without header.
    pub fn from_chrom_sizes(path: &Path) -> Result<Self> {
        let parse_options = CsvParseOptions::default().with_separator(b'\t');
        let schema = Schema::from_iter(vec![
            Field::new("name".into(), DataType::String),
            Field::new("size".into(), DataType::Int64),
        ]);

        let entries = CsvReadOptions::default()
            .with_has_header(false)
            .with_schema(Some(Arc::new(schema)))
            .with_parse_options(parse_options)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .and_then(|df| chrom_sizes_from_frame(&df))
            .map_err(|e| FuzzerError::table(path, e))?;

        let table = Self::new(entries)?;
        if table.is_empty() {
            return Err(FuzzerError::config(format!(
                "no chromosomes found in {}",
                path.display()
            )));
        }

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chroms
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chromosome> {
        self.chroms.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Chromosome> {
        self.ranks.get(name).map(|&rank| &self.chroms[rank])
    }

    pub fn rank(&self, name: &str) -> Option<usize> {
        self.ranks.get(name).copied()
    }

    pub fn sizes(&self) -> impl Iterator<Item = i64> + '_ {
        self.chroms.iter().map(|c| c.size)
    }

    pub fn total_size(&self) -> i64 {
        self.sizes().sum()
    }

    /// Parse `chrom`, or `chrom:start-end`, into a range on this table.
    ///
    /// A bare chromosome name selects the whole chromosome. Otherwise the
    /// query is split at the last `:` and the last `-`, so chromosome names
    /// may themselves contain either character.
    pub fn parse_query(&self, query: &str) -> Result<Range1D> {
        if let Some(chrom) = self.get(query) {
            return Ok(Range1D::new(chrom.name.clone(), 0, chrom.size));
        }

        let (p1, p2) = match (query.rfind(':'), query.rfind('-')) {
            (Some(p1), Some(p2)) if p1 < p2 => (p1, p2),
            _ => return Err(FuzzerError::query(query, "query is malformed")),
        };

        let chrom_name = &query[..p1];
        let start_str = &query[p1 + 1..p2];
        let end_str = &query[p2 + 1..];

        let chrom = self
            .get(chrom_name)
            .ok_or_else(|| FuzzerError::query(query, format!("invalid chromosome \"{}\"", chrom_name)))?;

        if start_str.is_empty() {
            return Err(FuzzerError::query(query, "missing start position"));
        }
        if end_str.is_empty() {
            return Err(FuzzerError::query(query, "missing end position"));
        }

        let start: i64 = start_str
            .parse()
            .map_err(|e| FuzzerError::query(query, format!("invalid start position \"{}\": {}", start_str, e)))?;
        let end: i64 = end_str
            .parse()
            .map_err(|e| FuzzerError::query(query, format!("invalid end position \"{}\": {}", end_str, e)))?;

        if start < 0 {
            return Err(FuzzerError::query(query, "start position is negative"));
        }
        if end > chrom.size {
            return Err(FuzzerError::query(
                query,
                format!(
                    "end position is greater than the chromosome size ({} > {})",
                    end, chrom.size
                ),
            ));
        }
        if start > end {
            return Err(FuzzerError::query(
                query,
                format!("start position is greater than end position ({} > {})", start, end),
            ));
        }

        Ok(Range1D::new(chrom.name.clone(), start, end))
    }
}

fn chrom_sizes_from_frame(df: &DataFrame) -> PolarsResult<Vec<(String, i64)>> {
    let names = df.column("name")?.str()?;
    let sizes = df.column("size")?.i64()?;

    names
        .into_iter()
        .zip(sizes.into_iter())
        .enumerate()
        .map(|(i, row)| match row {
            (Some(name), Some(size)) => Ok((name.to_string(), size)),
            _ => Err(PolarsError::ComputeError(
                format!("line {}: expected a chromosome name and size", i + 1).into(),
            )),
        })
        .collect()
}
