//! Error types shared by every stage of a fuzzing run.
//!
//! Only [`FuzzerError::Config`] is raised before workers start. Everything
//! else is fatal to the worker that hits it and trips the cancellation flag.
//! Result mismatches are not errors; they are counted as failures.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuzzerError {
    /// I/O errors (missing chrom.sizes, unreadable pixel dump)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CLI values, missing candidate binary, empty chromosome table
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A tabular input file could not be read
    #[error("Unable to read table from {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    /// No query can be drawn from the chromosome table
    #[error("Query generation error: {message}")]
    Generation { message: String },

    /// A query string is not of the form `chrom:start-end`
    #[error("Invalid query \"{query}\": {message}")]
    Query { query: String, message: String },

    /// An implementation failed to run a query
    #[error("{executor} failed on {query1}, {query2}: {message}{}", format_stderr(.stderr))]
    Execution {
        executor: String,
        query1: String,
        query2: String,
        message: String,
        stderr: String,
    },

    /// Candidate output is not a pixel table
    #[error("Unable to parse output for {query1}, {query2}: {message}")]
    Parse {
        query1: String,
        query2: String,
        message: String,
    },

    /// A worker unwound instead of returning
    #[error("Worker {worker_id} panicked: {message}")]
    WorkerPanic { worker_id: usize, message: String },
}

pub type Result<T> = std::result::Result<T, FuzzerError>;

fn format_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr)
    }
}

impl FuzzerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn query(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            query: query.into(),
            message: message.into(),
        }
    }

    pub fn table(path: impl Into<PathBuf>, source: PolarsError) -> Self {
        Self::Table {
            path: path.into(),
            source,
        }
    }

    /// True for errors that can only happen before workers are launched.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Table { .. } | Self::Io(_))
    }
}
