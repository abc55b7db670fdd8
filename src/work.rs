use crate::context::ExecutionContext;

/// The line produced by one work unit for one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkResult {
    pub index: i64,
    pub text: String,
}

impl WorkResult {
    pub fn new(index: i64, text: impl Into<String>) -> WorkResult {
        WorkResult {
            index,
            text: text.into(),
        }
    }
}

/// The smallest schedulable piece of work: a function of an index and the context it runs on.
///
/// Implementations must not share mutable state across indices, output goes through the
/// executor's [OutputSink][crate::OutputSink].
///
/// Any `Fn(i64, &ExecutionContext) -> anyhow::Result<WorkResult>` closure is a work unit.
pub trait WorkUnit: Send + Sync + 'static {
    fn exec(&self, index: i64, ctx: &ExecutionContext) -> anyhow::Result<WorkResult>;
}

impl<F> WorkUnit for F
where
    F: Fn(i64, &ExecutionContext) -> anyhow::Result<WorkResult> + Send + Sync + 'static,
{
    fn exec(&self, index: i64, ctx: &ExecutionContext) -> anyhow::Result<WorkResult> {
        self(index, ctx)
    }
}
