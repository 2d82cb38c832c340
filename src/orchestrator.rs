//! Runs a fixed pool of workers against one shared deadline and gathers
//! their tallies.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, error};

use crate::chromosomes::ChromosomeTable;
use crate::error::{FuzzerError, Result};
use crate::executor::QueryExecutor;
use crate::fuzzer_structs::WorkerResult;
use crate::query::LengthParams;
use crate::report::Summary;
use crate::worker::{CancellationFlag, SharedInputs, Worker};

/// Parameters shared by all workers of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParams {
    pub nproc: usize,
    pub duration: Duration,
    pub lengths: LengthParams,
    pub ratio_2d: f64,
    pub seed: u64,
}

/// What every worker returned, in worker id order.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<Result<WorkerResult>>,
    /// Worker whose error raised the cancellation flag.
    pub first_failure: Option<usize>,
}

impl RunOutcome {
    /// Totals over the workers that stopped cleanly.
    pub fn summary(&self) -> Summary {
        self.results.iter().filter_map(|r| r.as_ref().ok()).collect()
    }

    /// Workers that stopped on a fatal error, by id.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &FuzzerError)> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Surface the error that cancelled the run, or the summary of a clean
    /// run. Falls back to the lowest-numbered failing worker if no worker is
    /// recorded as the first failure.
    pub fn into_result(self) -> Result<Summary> {
        let summary = self.summary();
        let mut errors: Vec<(usize, FuzzerError)> = self
            .results
            .into_iter()
            .enumerate()
            .filter_map(|(id, r)| r.err().map(|e| (id, e)))
            .collect();
        if errors.is_empty() {
            return Ok(summary);
        }

        let first = errors
            .iter()
            .position(|&(id, _)| Some(id) == self.first_failure)
            .unwrap_or(0);
        Err(errors.swap_remove(first).1)
    }

    /// 0 for a clean run without mismatches, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.has_fatal_error() || !self.summary().passed() {
            1
        } else {
            0
        }
    }

    pub fn report(&self) {
        let summary = self.summary();
        let mut errors = self.errors().peekable();
        if errors.peek().is_none() {
            summary.log();
            return;
        }

        for (id, e) in errors {
            error!("[{}] {}", id, e);
        }
        debug!("workers that returned cleanly: {}", summary);
    }
}

pub struct Orchestrator {
    params: RunParams,
}

impl Orchestrator {
    pub fn new(params: RunParams) -> Result<Self> {
        if params.nproc == 0 {
            return Err(FuzzerError::config("the worker pool needs at least one worker"));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    /// Launch `nproc` workers and block until all of them return.
    pub fn run(
        &self,
        table: &ChromosomeTable,
        reference: &dyn QueryExecutor,
        candidate: &dyn QueryExecutor,
    ) -> Result<RunOutcome> {
        let nproc = self.params.nproc;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nproc)
            .thread_name(|i| format!("fuzzer-worker-{}", i))
            .build()
            .map_err(|e| FuzzerError::config(format!("Failed to create thread pool: {}", e)))?;

        let cancel = CancellationFlag::new();
        let inputs = SharedInputs {
            table,
            reference,
            candidate,
            lengths: self.params.lengths,
            ratio_2d: self.params.ratio_2d,
            seed: self.params.seed,
            deadline: Instant::now() + self.params.duration,
        };
        debug!("launching {} workers for {:?}", nproc, self.params.duration);

        let results: Vec<Result<WorkerResult>> = pool.install(|| {
            (0..nproc)
                .into_par_iter()
                .with_max_len(1)
                .map(|id| Worker::new(id, inputs, &cancel).run())
                .collect()
        });

        Ok(RunOutcome {
            results,
            first_failure: cancel.raised_by(),
        })
    }
}
