//! Distributing an index range over the PEs of a [Lamellae] and aggregating the results.

use crate::context::ExecutionContext;
use crate::error::{ConfigError, Error, ExecutionError, Result};
use crate::iteration::{ErrorPolicy, RunSummary, Schedule};
use crate::lamellae::{Lamellae, PartitionJob, PartitionMsg, PeHandle};
use crate::output::OutputSink;
use crate::partition::{Distribution, IndexPartitioner};
use crate::work::{WorkResult, WorkUnit};

use futures::future::{join_all, ready};
use futures::Future;
use std::ops::Range;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Optional suffix identifying the locale that produced a line.
///
/// Selected with the `localeTag` option of the programs (`none`, `ordinal` or `name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocaleTag {
    #[default]
    None,
    /// ` [locale L of M]`
    Ordinal,
    /// ` [locale L of M named NAME]`
    OrdinalAndName,
}

impl LocaleTag {
    pub fn suffix(&self, ctx: &ExecutionContext) -> String {
        match self {
            LocaleTag::None => String::new(),
            LocaleTag::Ordinal => format!(" [locale {} of {}]", ctx.id(), ctx.total_count()),
            LocaleTag::OrdinalAndName => format!(
                " [locale {} of {} named {}]",
                ctx.id(),
                ctx.total_count(),
                ctx.display_name()
            ),
        }
    }
}

impl FromStr for LocaleTag {
    type Err = ConfigError;
    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LocaleTag::None),
            "ordinal" => Ok(LocaleTag::Ordinal),
            "name" => Ok(LocaleTag::OrdinalAndName),
            other => Err(ConfigError::InvalidValue {
                name: "localeTag".to_owned(),
                reason: format!("unknown locale tag `{other}`, expected none, ordinal or name"),
            }),
        }
    }
}

struct TaggedWork {
    inner: Arc<dyn WorkUnit>,
    tag: LocaleTag,
}

impl WorkUnit for TaggedWork {
    fn exec(&self, index: i64, ctx: &ExecutionContext) -> anyhow::Result<WorkResult> {
        let mut res = self.inner.exec(index, ctx)?;
        res.text.push_str(&self.tag.suffix(ctx));
        Ok(res)
    }
}

/// Wait for every handle, in submission order.
pub async fn await_all(handles: Vec<PeHandle>) -> Vec<Result<RunSummary>> {
    join_all(handles).await
}

/// Fold per PE results: the first execution error (in PE order) wins, failure counts add up.
fn aggregate(results: Vec<Result<RunSummary>>) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut first_err: Option<ExecutionError> = None;
    let mut total_failed = 0;
    for res in results {
        match res {
            Ok(s) => summary = summary + s,
            Err(Error::Execution { first, failed }) => {
                total_failed += failed;
                first_err.get_or_insert(first);
            }
            Err(e) => return Err(e),
        }
    }
    match first_err {
        Some(first) => Err(Error::Execution {
            first,
            failed: total_failed,
        }),
        None => Ok(summary),
    }
}

/// Runs a work unit over an index range spread across all PEs of a [Lamellae].
///
/// The range is split with an [IndexPartitioner], every non empty partition is submitted to the
/// PE that owns it and executed there by a [LocalExecutor][crate::LocalExecutor].
/// If a PE can not be reached no further partitions are dispatched, the ones already running are
/// awaited and the run fails with [Error::NodeUnavailable]. Lines already written stay written.
#[derive(Clone)]
pub struct DistributedExecutor {
    lamellae: Arc<dyn Lamellae>,
    sink: Arc<dyn OutputSink>,
    partitioner: IndexPartitioner,
    schedule: Schedule,
    policy: ErrorPolicy,
    tag: LocaleTag,
}

impl std::fmt::Debug for DistributedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedExecutor")
            .field("lamellae", &self.lamellae)
            .field("distribution", &self.partitioner.distribution())
            .field("schedule", &self.schedule)
            .field("policy", &self.policy)
            .field("tag", &self.tag)
            .finish()
    }
}

impl DistributedExecutor {
    pub fn new(lamellae: Arc<dyn Lamellae>, sink: Arc<dyn OutputSink>) -> DistributedExecutor {
        DistributedExecutor {
            lamellae,
            sink,
            partitioner: IndexPartitioner::default(),
            schedule: Schedule::default(),
            policy: ErrorPolicy::default(),
            tag: LocaleTag::default(),
        }
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.partitioner = IndexPartitioner::new(distribution);
        self
    }

    /// The schedule each PE uses for its own partitions.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_locale_tags(mut self, tag: LocaleTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn num_pes(&self) -> usize {
        self.lamellae.num_pes()
    }

    /// Execute `work` for every index of `range`, blocking until all PEs completed.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn run(
        &self,
        range: Range<i64>,
        chunk_size: usize,
        work: Arc<dyn WorkUnit>,
    ) -> Result<RunSummary> {
        let my_pe = self.lamellae.my_pe();
        self.lamellae
            .scheduler(my_pe)
            .block_on(self.run_async(range, chunk_size, work))
    }

    /// Partition and dispatch immediately, the returned future awaits and aggregates the PEs.
    pub fn run_async(
        &self,
        range: Range<i64>,
        chunk_size: usize,
        work: Arc<dyn WorkUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<RunSummary>> + Send>> {
        let contexts = self.lamellae.contexts();
        let parts = match self.partitioner.partition(range, &contexts, chunk_size) {
            Ok(parts) => parts,
            Err(e) => return Box::pin(ready(Err(e.into()))),
        };
        let work: Arc<dyn WorkUnit> = match self.tag {
            LocaleTag::None => work,
            tag => Arc::new(TaggedWork { inner: work, tag }),
        };

        let mut handles = Vec::with_capacity(parts.len());
        let mut dispatch_err = None;
        for part in parts.iter().filter(|p| !p.is_empty()) {
            let pe = part.owner.ordinal();
            let msg = PartitionMsg {
                start: part.start(),
                end: part.end(),
                pe,
                schedule: self.schedule,
            };
            let submitted = PartitionJob::new(&msg, work.clone(), self.sink.clone(), self.policy)
                .and_then(|job| self.lamellae.submit(pe, job));
            match submitted {
                Ok(handle) => {
                    trace!("dispatched {:?} to pe {pe}", part.range());
                    handles.push(handle);
                }
                Err(e) => {
                    debug!("dispatch to pe {pe} failed: {e}");
                    dispatch_err = Some(e);
                    break;
                }
            }
        }
        debug!(
            "dispatched {} of {} partitions",
            handles.len(),
            parts.len()
        );

        Box::pin(async move {
            let results = await_all(handles).await;
            match dispatch_err {
                Some(e) => Err(e),
                None => aggregate(results),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(index: i64, ordinal: usize, failed: usize) -> Result<RunSummary> {
        Err(Error::Execution {
            first: ExecutionError {
                index,
                ordinal,
                name: format!("pe{ordinal}"),
                message: "boom".to_owned(),
            },
            failed,
        })
    }

    #[test]
    fn aggregate_sums_and_keeps_first_error() {
        let ok = aggregate(vec![
            Ok(RunSummary { executed: 3 }),
            Ok(RunSummary { executed: 4 }),
        ])
        .unwrap();
        assert_eq!(ok.executed, 7);

        match aggregate(vec![
            Ok(RunSummary { executed: 3 }),
            err(5, 1, 2),
            err(9, 2, 3),
        ]) {
            Err(Error::Execution { first, failed }) => {
                assert_eq!(first.ordinal, 1);
                assert_eq!(first.index, 5);
                assert_eq!(failed, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn locale_suffixes() {
        let ctx = ExecutionContext::new(1, 4, "node7");
        assert_eq!(LocaleTag::None.suffix(&ctx), "");
        assert_eq!(LocaleTag::Ordinal.suffix(&ctx), " [locale 2 of 4]");
        assert_eq!(
            LocaleTag::OrdinalAndName.suffix(&ctx),
            " [locale 2 of 4 named node7]"
        );
    }

    #[test]
    fn locale_tag_names() {
        assert_eq!("none".parse::<LocaleTag>().unwrap(), LocaleTag::None);
        assert_eq!("Ordinal".parse::<LocaleTag>().unwrap(), LocaleTag::Ordinal);
        assert_eq!("name".parse::<LocaleTag>().unwrap(), LocaleTag::OrdinalAndName);
        assert!(matches!(
            "rank".parse::<LocaleTag>(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
