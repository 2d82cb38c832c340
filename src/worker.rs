//! A single fuzzing worker and the flag workers use to stop each other.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::chromosomes::ChromosomeTable;
use crate::compare::{diff, Comparison};
use crate::error::{FuzzerError, Result};
use crate::executor::QueryExecutor;
use crate::fuzzer_structs::{QueryPair, WorkerResult};
use crate::query::{LengthParams, QueryGenerator, QueryStream};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const NOT_RAISED: usize = usize::MAX;

/// Raised once by the first worker that hits a fatal error, and remembers
/// which worker that was. Never lowered.
#[derive(Debug)]
pub struct CancellationFlag(AtomicUsize);

impl Default for CancellationFlag {
    fn default() -> Self {
        Self(AtomicUsize::new(NOT_RAISED))
    }
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call is the one that raised the flag.
    pub fn cancel(&self, worker_id: usize) -> bool {
        self.0
            .compare_exchange(NOT_RAISED, worker_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire) != NOT_RAISED
    }

    /// The worker whose failure raised the flag.
    pub fn raised_by(&self) -> Option<usize> {
        match self.0.load(Ordering::Acquire) {
            NOT_RAISED => None,
            id => Some(id),
        }
    }
}

/// Seed of worker `worker_id`: splitmix64 of the global seed xor'ed with
/// `(worker_id + 1) * GOLDEN_GAMMA`.
///
/// Streams are reproducible for a fixed (seed, worker count) and differ
/// between workers.
pub fn worker_seed(worker_id: usize, global_seed: u64) -> u64 {
    splitmix64(global_seed ^ GOLDEN_GAMMA.wrapping_mul(worker_id as u64 + 1))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Read-only inputs handed to every worker of a run.
#[derive(Clone, Copy)]
pub struct SharedInputs<'a> {
    pub table: &'a ChromosomeTable,
    pub reference: &'a dyn QueryExecutor,
    pub candidate: &'a dyn QueryExecutor,
    pub lengths: LengthParams,
    /// Probability that a query is 2D.
    pub ratio_2d: f64,
    pub seed: u64,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Seeding,
    Running,
    Stopped,
}

pub struct Worker<'a> {
    id: usize,
    inputs: SharedInputs<'a>,
    cancel: &'a CancellationFlag,
    state: WorkerState,
    tally: WorkerResult,
}

impl<'a> Worker<'a> {
    pub fn new(id: usize, inputs: SharedInputs<'a>, cancel: &'a CancellationFlag) -> Self {
        Self {
            id,
            inputs,
            cancel,
            state: WorkerState::Seeding,
            tally: WorkerResult::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run until the deadline passes or another worker raises the flag.
    ///
    /// Any error (or panic) raises the flag and is returned; the partial
    /// tally is dropped with it.
    pub fn run(&mut self) -> Result<WorkerResult> {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.run_loop())) {
            Ok(result) => result,
            Err(payload) => Err(FuzzerError::WorkerPanic {
                worker_id: self.id,
                message: panic_message(payload.as_ref()),
            }),
        };
        self.state = WorkerState::Stopped;

        if result.is_err() && self.cancel.cancel(self.id) {
            debug!(
                "[{}] exception raised in worker. Sending early return signal!",
                self.id
            );
        }
        result
    }

    fn run_loop(&mut self) -> Result<WorkerResult> {
        let seed = worker_seed(self.id, self.inputs.seed);
        info!("[{}] seed: {}", self.id, seed);

        let generator = QueryGenerator::new(self.inputs.table, self.inputs.lengths)?;
        let mut queries = QueryStream::new(generator, self.inputs.ratio_2d, seed);
        self.state = WorkerState::Running;

        loop {
            if self.cancel.is_cancelled() {
                debug!(
                    "[{}] early return signal received. Returning immediately!",
                    self.id
                );
                break;
            }
            if Instant::now() >= self.inputs.deadline {
                break;
            }

            let query = queries.next_query();
            let identical = self.check(&query)?;
            self.tally.record(identical);
        }

        Ok(self.tally)
    }

    fn check(&self, query: &QueryPair) -> Result<bool> {
        let reference = self.inputs.reference;
        let candidate = self.inputs.candidate;

        debug!("[{}] [{}] running query for {}...", self.id, reference.name(), query);
        let expected = reference.execute(query)?;
        let found = candidate.execute(query)?;

        let comparison = diff(&expected, &found);
        match comparison {
            Comparison::Identical => {
                debug!("[{}] {} ({} nnz): OK!", self.id, query, expected.len())
            }
            Comparison::RowCountMismatch { expected, found } => warn!(
                "[{}] {}: FAIL! Expected {} nnz, found {}!",
                self.id, query, expected, found
            ),
            Comparison::RowMismatch { differences } => warn!(
                "[{}] {} ({} nnz): FAIL! Found {} differences!",
                self.id,
                query,
                expected.len(),
                differences
            ),
        }

        Ok(comparison.is_identical())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::executor::FnExecutor;
    use crate::fuzzer_structs::PixelRow;

    fn table() -> ChromosomeTable {
        ChromosomeTable::new([("chr1", 100), ("chr2", 50)]).unwrap()
    }

    fn lengths() -> LengthParams {
        LengthParams {
            mean: 20.0,
            stddev: 5.0,
        }
    }

    fn row(query: &QueryPair, count: i64) -> PixelRow {
        PixelRow {
            chrom1: query.first.chrom.clone(),
            start1: query.first.start,
            end1: query.first.end,
            chrom2: query.second.chrom.clone(),
            start2: query.second.start,
            end2: query.second.end,
            count,
        }
    }

    fn inputs<'a>(
        table: &'a ChromosomeTable,
        reference: &'a dyn QueryExecutor,
        candidate: &'a dyn QueryExecutor,
        deadline: Instant,
    ) -> SharedInputs<'a> {
        SharedInputs {
            table,
            reference,
            candidate,
            lengths: lengths(),
            ratio_2d: 0.33,
            seed: 42,
            deadline,
        }
    }

    #[test]
    fn flag_only_transitions_once() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
        assert_eq!(flag.raised_by(), None);
        assert!(flag.cancel(4));
        assert!(!flag.cancel(0));
        assert!(flag.is_cancelled());
        assert_eq!(flag.raised_by(), Some(4));
    }

    #[test]
    fn worker_seeds_are_stable_and_distinct() {
        assert_eq!(worker_seed(3, 2074288341), worker_seed(3, 2074288341));
        let seeds: std::collections::HashSet<u64> = (0..64).map(|id| worker_seed(id, 42)).collect();
        assert_eq!(seeds.len(), 64);
        assert_ne!(worker_seed(0, 1), worker_seed(0, 2));
    }

    #[test]
    fn matching_results_are_counted_as_successes() {
        let t = table();
        let reference = FnExecutor::new("reference", |q: &QueryPair| Ok(vec![row(q, 1)]));
        let candidate = FnExecutor::new("candidate", |q: &QueryPair| Ok(vec![row(q, 1)]));
        let flag = CancellationFlag::new();
        let deadline = Instant::now() + Duration::from_millis(50);

        let mut worker = Worker::new(0, inputs(&t, &reference, &candidate, deadline), &flag);
        assert_eq!(worker.state(), WorkerState::Seeding);
        let tally = worker.run().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(tally.queries_executed > 0);
        assert_eq!(tally.failures, 0);
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn mismatches_are_failures_not_errors() {
        let t = table();
        let calls = AtomicUsize::new(0);
        let reference = FnExecutor::new("reference", |q: &QueryPair| Ok(vec![row(q, 1)]));
        let candidate = FnExecutor::new("candidate", |q: &QueryPair| {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            Ok(vec![row(q, if n % 2 == 0 { 1 } else { 2 })])
        });
        let flag = CancellationFlag::new();
        let deadline = Instant::now() + Duration::from_millis(50);

        let tally = Worker::new(0, inputs(&t, &reference, &candidate, deadline), &flag)
            .run()
            .unwrap();
        assert_eq!(tally.queries_executed, calls.load(Ordering::Relaxed) as u64);
        assert_eq!(tally.failures, tally.queries_executed / 2);
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn expired_deadline_runs_no_queries() {
        let t = table();
        let reference = FnExecutor::new("reference", |_: &QueryPair| Ok(Vec::new()));
        let flag = CancellationFlag::new();

        let tally = Worker::new(0, inputs(&t, &reference, &reference, Instant::now()), &flag)
            .run()
            .unwrap();
        assert_eq!(tally, WorkerResult::default());
    }

    #[test]
    fn raised_flag_stops_before_the_next_query() {
        let t = table();
        let reference = FnExecutor::new("reference", |_: &QueryPair| Ok(Vec::new()));
        let flag = CancellationFlag::new();
        flag.cancel(3);
        let deadline = Instant::now() + Duration::from_secs(60);

        let tally = Worker::new(0, inputs(&t, &reference, &reference, deadline), &flag)
            .run()
            .unwrap();
        assert_eq!(tally.queries_executed, 0);
    }

    #[test]
    fn execution_errors_raise_the_flag() {
        let t = table();
        let reference = FnExecutor::new("reference", |_: &QueryPair| Ok(Vec::new()));
        let candidate = FnExecutor::new("candidate", |q: &QueryPair| {
            Err(FuzzerError::Execution {
                executor: "candidate".into(),
                query1: q.first.to_string(),
                query2: q.second.to_string(),
                message: "terminated with code 1".into(),
                stderr: String::new(),
            })
        });
        let flag = CancellationFlag::new();
        let deadline = Instant::now() + Duration::from_secs(60);

        let mut worker = Worker::new(1, inputs(&t, &reference, &candidate, deadline), &flag);
        assert!(matches!(worker.run(), Err(FuzzerError::Execution { .. })));
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(flag.raised_by(), Some(1));
    }

    #[test]
    fn later_failures_do_not_take_over_the_flag() {
        // generation fails before the flag is polled, so both workers fail
        let t = ChromosomeTable::default();
        let reference = FnExecutor::new("reference", |_: &QueryPair| Ok(Vec::new()));
        let flag = CancellationFlag::new();
        let deadline = Instant::now() + Duration::from_secs(60);

        for id in [6, 2] {
            let result = Worker::new(id, inputs(&t, &reference, &reference, deadline), &flag).run();
            assert!(result.is_err());
        }
        assert_eq!(flag.raised_by(), Some(6));
    }

    #[test]
    fn empty_table_raises_the_flag() {
        let t = ChromosomeTable::default();
        let reference = FnExecutor::new("reference", |_: &QueryPair| Ok(Vec::new()));
        let flag = CancellationFlag::new();
        let deadline = Instant::now() + Duration::from_secs(60);

        let result = Worker::new(0, inputs(&t, &reference, &reference, deadline), &flag).run();
        assert!(matches!(result, Err(FuzzerError::Generation { .. })));
        assert!(flag.is_cancelled());
    }

    #[test]
    fn panics_become_errors() {
        let t = table();
        let reference = FnExecutor::new("reference", |_: &QueryPair| -> Result<Vec<PixelRow>> {
            panic!("reference exploded")
        });
        let flag = CancellationFlag::new();
        let deadline = Instant::now() + Duration::from_secs(60);

        match Worker::new(2, inputs(&t, &reference, &reference, deadline), &flag).run() {
            Err(FuzzerError::WorkerPanic { worker_id, message }) => {
                assert_eq!(worker_id, 2);
                assert!(message.contains("reference exploded"));
            }
            other => panic!("expected a worker panic, got {:?}", other),
        }
        assert!(flag.is_cancelled());
    }

    #[test]
    fn query_stream_is_reproducible_per_worker() {
        let t = table();
        let seen = Mutex::new(Vec::new());
        let record = FnExecutor::new("reference", |q: &QueryPair| {
            seen.lock().unwrap().push(q.clone());
            Ok(Vec::new())
        });
        let passthrough = FnExecutor::new("candidate", |_: &QueryPair| Ok(Vec::new()));

        let mut runs = Vec::new();
        for _ in 0..2 {
            seen.lock().unwrap().clear();
            let flag = CancellationFlag::new();
            let deadline = Instant::now() + Duration::from_millis(20);
            Worker::new(5, inputs(&t, &record, &passthrough, deadline), &flag)
                .run()
                .unwrap();
            runs.push(seen.lock().unwrap().clone());
        }

        let n = runs[0].len().min(runs[1].len());
        assert!(n > 0);
        assert_eq!(runs[0][..n], runs[1][..n]);
    }
}
