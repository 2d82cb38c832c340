//! Command line options and their validation.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;

use crate::candidate::{self, DEFAULT_CANDIDATE};
use crate::error::{FuzzerError, Result};
use crate::orchestrator::RunParams;
use crate::query::LengthParams;

pub const DEFAULT_SEED: u64 = 2074288341;

/// Differential fuzzer for contact-matrix range queries: runs random queries
/// against a reference pixel dump and a coolerpp_dump-like binary and checks
/// that both return the same pixels.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Contact matrix URI handed to the candidate (e.g. matrix.mcool::/resolutions/10000)
    pub cooler: String,

    /// Chromosome sizes of the matrix (name<TAB>size, no header)
    #[arg(long)]
    pub chrom_sizes: PathBuf,

    /// Pixels of the matrix in joined form (chrom1 start1 end1 chrom2 start2 end2 count)
    #[arg(long)]
    pub reference_pixels: PathBuf,

    /// Probability that a query is 2D. Use 0 or 1 to only test 1D or 2D queries.
    #[arg(long = "1d-to-2d-query-ratio", default_value_t = 0.33, allow_negative_numbers = true)]
    pub query_ratio: f64,

    /// Duration in seconds.
    #[arg(long, default_value_t = 60)]
    pub duration: u64,

    /// Path to the coolerpp_dump binary.
    #[arg(long, default_value = DEFAULT_CANDIDATE)]
    pub path_to_coolerpp_dump: PathBuf,

    /// Average query size.
    #[arg(long, default_value_t = 5_000_000.0, allow_negative_numbers = true)]
    pub query_length_avg: f64,

    /// Standard deviation for query size.
    #[arg(long, default_value_t = 1_000_000.0, allow_negative_numbers = true)]
    pub query_length_std: f64,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Maximum number of parallel workers [default: all cores]
    #[arg(long)]
    pub nproc: Option<usize>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub verbosity: String,
}

pub fn available_parallelism() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Config {
    /// Check value ranges and resolve the candidate binary to a path.
    pub fn validate(mut self) -> Result<Self> {
        if !(0.0..=1.0).contains(&self.query_ratio) {
            return Err(FuzzerError::config(format!(
                "--1d-to-2d-query-ratio must be between 0 and 1, found {}",
                self.query_ratio
            )));
        }
        if self.duration == 0 {
            return Err(FuzzerError::config("--duration must be a positive integer"));
        }
        if !self.query_length_avg.is_finite() {
            return Err(FuzzerError::config(format!(
                "--query-length-avg must be a finite number, found {}",
                self.query_length_avg
            )));
        }
        if !(self.query_length_std.is_finite() && self.query_length_std >= 0.0) {
            return Err(FuzzerError::config(format!(
                "--query-length-std must be a non-negative number, found {}",
                self.query_length_std
            )));
        }

        let max_nproc = available_parallelism();
        if let Some(n) = self.nproc {
            if n == 0 || n > max_nproc {
                return Err(FuzzerError::config(format!(
                    "--nproc must be between 1 and {}, found {}",
                    max_nproc, n
                )));
            }
        }

        self.path_to_coolerpp_dump = candidate::resolve_executable(&self.path_to_coolerpp_dump)?;
        Ok(self)
    }

    pub fn nproc(&self) -> usize {
        self.nproc.unwrap_or_else(available_parallelism)
    }

    pub fn run_params(&self) -> RunParams {
        RunParams {
            nproc: self.nproc(),
            duration: Duration::from_secs(self.duration),
            lengths: LengthParams {
                mean: self.query_length_avg,
                stddev: self.query_length_std,
            },
            ratio_2d: self.query_ratio,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut args = vec![
            "coolerpp_fuzzer",
            "test.mcool::/resolutions/10000",
            "--chrom-sizes",
            "chrom.sizes",
            "--reference-pixels",
            "pixels.tsv",
        ];
        if !extra.contains(&"--path-to-coolerpp-dump") {
            args.extend_from_slice(&["--path-to-coolerpp-dump", "sh"]);
        }
        args.extend_from_slice(extra);
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.query_ratio, 0.33);
        assert_eq!(config.duration, 60);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.nproc(), available_parallelism());

        let params = config.run_params();
        assert_eq!(params.lengths, LengthParams::default());
        assert_eq!(params.duration, Duration::from_secs(60));
    }

    #[test]
    fn default_candidate_name() {
        let config = Config::try_parse_from([
            "coolerpp_fuzzer",
            "test.cool",
            "--chrom-sizes",
            "a",
            "--reference-pixels",
            "b",
        ])
        .unwrap();
        assert_eq!(config.path_to_coolerpp_dump, PathBuf::from("coolerpp_dump"));
    }

    #[test]
    fn ratio_flag_name() {
        let config = parse(&["--1d-to-2d-query-ratio", "1"]);
        assert_eq!(config.query_ratio, 1.0);
    }

    #[cfg(unix)]
    #[test]
    fn validation_resolves_the_candidate() {
        let config = parse(&["--nproc", "1"]).validate().unwrap();
        assert!(config.path_to_coolerpp_dump.is_absolute());
        assert_eq!(config.nproc(), 1);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for extra in [
            &["--1d-to-2d-query-ratio", "1.5"][..],
            &["--1d-to-2d-query-ratio", "-0.1"][..],
            &["--duration", "0"][..],
            &["--query-length-std", "-1"][..],
            &["--nproc", "0"][..],
            &["--path-to-coolerpp-dump", "/nonexistent/coolerpp_dump"][..],
        ] {
            let err = parse(extra).validate().unwrap_err();
            assert!(err.is_configuration(), "{:?} gave {}", extra, err);
        }
    }

    #[test]
    fn too_many_workers_are_rejected() {
        let n = (available_parallelism() + 1).to_string();
        assert!(parse(&["--nproc", n.as_str()]).validate().is_err());
    }
}
