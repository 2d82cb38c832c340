use std::fmt;

use tracing::{info, warn};

use crate::fuzzer_structs::WorkerResult;

/// Totals over every worker that stopped cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub queries: u64,
    pub failures: u64,
}

impl Summary {
    pub fn add(&mut self, result: WorkerResult) {
        self.queries += result.queries_executed;
        self.failures += result.failures;
    }

    pub fn successes(&self) -> u64 {
        self.queries - self.failures
    }

    /// Fraction of queries whose results matched, `None` when nothing ran.
    pub fn pass_rate(&self) -> Option<f64> {
        if self.queries == 0 {
            None
        } else {
            Some(self.successes() as f64 / self.queries as f64)
        }
    }

    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    pub fn log(&self) {
        if self.passed() {
            info!("{}", self);
        } else {
            warn!("{}", self);
        }
    }
}

impl<'a> FromIterator<&'a WorkerResult> for Summary {
    fn from_iter<I: IntoIterator<Item = &'a WorkerResult>>(iter: I) -> Self {
        let mut summary = Summary::default();
        for result in iter {
            summary.add(*result);
        }
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pass_rate() {
            Some(rate) => write!(f, "Score: {}%", format_significant(100.0 * rate, 4))?,
            None => write!(f, "Score: n/a")?,
        }
        write!(
            f,
            " ({} successes and {} failures).",
            self.successes(),
            self.failures
        )
    }
}

/// `%g`-style formatting: `digits` significant digits, trailing zeros dropped.
fn format_significant(value: f64, digits: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (digits - 1 - magnitude).max(0) as usize;
    let s = format!("{:.*}", decimals, value);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
