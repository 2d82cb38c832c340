use crate::error::Result;
use crate::fuzzer_structs::{PixelRow, QueryPair};

/// An implementation of 2D range selection over a contact matrix.
///
/// Rows come back in whatever order the implementation produces them; the
/// comparator does not reorder.
pub trait QueryExecutor: Send + Sync {
    /// Short label used in logs and error messages.
    fn name(&self) -> &str;

    fn execute(&self, query: &QueryPair) -> Result<Vec<PixelRow>>;
}

/// Adapts a closure into an executor.
pub struct FnExecutor<F> {
    name: String,
    f: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&QueryPair) -> Result<Vec<PixelRow>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> QueryExecutor for FnExecutor<F>
where
    F: Fn(&QueryPair) -> Result<Vec<PixelRow>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, query: &QueryPair) -> Result<Vec<PixelRow>> {
        (self.f)(query)
    }
}
