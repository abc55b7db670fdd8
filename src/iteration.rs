//! Running a [WorkUnit] over every index of a [Partition] on the worker threads of one PE.
//!
//! There is no ordering guarantee across indices: work units run concurrently and their lines
//! reach the [OutputSink] in completion order.

pub(crate) mod consumer;
use consumer::{plan, IterSchedule};

use crate::context::ExecutionContext;
use crate::error::{Error, ExecutionError, Result};
use crate::output::OutputSink;
use crate::partition::Partition;
use crate::scheduler::WorkStealing;
use crate::work::WorkUnit;

use futures::future::{join_all, ready};
use futures::Future;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// The Schedule type controls how the indices of a partition are distributed to the worker threads of a PE.
///
/// Inspired by the OpenMP schedule parameter
///
/// # Possible Options
/// - Static: Each thread receives a static range of indices, the range length is roughly partition.len()/number of threads on pe
/// - Dynamic: Each thread processes a single index at a time
/// - Chunk(usize): Each thread processes chunk sized ranges of indices at a time.
/// - Guided: Similar to chunks, but the chunks decrease in size over time
/// - WorkStealing: Initially allocated the same range as static, but allows idle threads to steal work from busy threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Schedule {
    #[default]
    Static,
    Dynamic,      //single index
    Chunk(usize), //dynamic but with multiple indices
    Guided,       // chunks that get smaller over time
    WorkStealing, // static initially but other threads can steal
}

/// What happens to the rest of a run once a work unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ErrorPolicy {
    /// Run every index, then report the first failure and how many failed.
    #[default]
    CollectAll,
    /// Stop claiming new indices after the first failure. Units already running still finish.
    FailFast,
}

/// Completion report of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// The number of work units that produced a line.
    pub executed: usize,
}

impl std::ops::Add for RunSummary {
    type Output = RunSummary;
    fn add(self, other: RunSummary) -> RunSummary {
        RunSummary {
            executed: self.executed + other.executed,
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    executed: AtomicUsize,
    failed: AtomicUsize,
    first: Mutex<Option<ExecutionError>>,
    abort: AtomicBool,
}

impl RunState {
    fn record_failure(&self, err: ExecutionError, policy: ErrorPolicy) {
        debug!("{err}");
        self.failed.fetch_add(1, Ordering::SeqCst);
        let mut first = self.first.lock();
        if first.is_none() {
            *first = Some(err);
        }
        if policy == ErrorPolicy::FailFast {
            self.abort.store(true, Ordering::SeqCst);
        }
    }

    fn to_result(&self) -> Result<RunSummary> {
        match self.first.lock().take() {
            Some(first) => Err(Error::Execution {
                first,
                failed: self.failed.load(Ordering::SeqCst),
            }),
            None => Ok(RunSummary {
                executed: self.executed.load(Ordering::SeqCst),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_owned()
    }
}

struct WorkerTask {
    start: i64,
    sched: IterSchedule,
    ctx: ExecutionContext,
    work: Arc<dyn WorkUnit>,
    sink: Arc<dyn OutputSink>,
    policy: ErrorPolicy,
    state: Arc<RunState>,
}

impl WorkerTask {
    fn exec(self) {
        let WorkerTask {
            start,
            sched,
            ctx,
            work,
            sink,
            policy,
            state,
        } = self;
        for offset in sched.into_indices() {
            if state.abort.load(Ordering::Relaxed) {
                break;
            }
            let index = start.wrapping_add(offset as i64);
            let failure = |message: String| ExecutionError {
                index,
                ordinal: ctx.ordinal(),
                name: ctx.display_name().to_owned(),
                message,
            };
            match catch_unwind(AssertUnwindSafe(|| work.exec(index, &ctx))) {
                Ok(Ok(res)) => match sink.write_line(&res.text) {
                    Ok(()) => {
                        state.executed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => state.record_failure(failure(format!("output: {e}")), policy),
                },
                Ok(Err(e)) => state.record_failure(failure(format!("{e:#}")), policy),
                Err(payload) => state.record_failure(failure(panic_message(&*payload)), policy),
            }
        }
    }
}

/// Runs work units over a partition on the thread pool of a single PE.
///
/// # Examples
///```no_run
/// use lamellar_hello::{ExecutionContext, Partition, WorkResult, WorldBuilder};
/// use std::sync::Arc;
///
/// let world = WorldBuilder::new().build().unwrap();
/// let exec = world.local_executor();
/// let part = Partition::new(1..6, world.here());
/// let work = |i: i64, _ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
///     Ok(WorkResult::new(i, format!("iteration {i}")))
/// };
/// let summary = exec.run(&part, Arc::new(work)).unwrap();
/// assert_eq!(summary.executed, 5);
///```
#[derive(Clone)]
pub struct LocalExecutor {
    scheduler: Arc<WorkStealing>,
    sink: Arc<dyn OutputSink>,
    schedule: Schedule,
    policy: ErrorPolicy,
}

impl std::fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExecutor")
            .field("pe", &self.scheduler.my_pe())
            .field("num_workers", &self.scheduler.num_workers())
            .field("schedule", &self.schedule)
            .field("policy", &self.policy)
            .finish()
    }
}

impl LocalExecutor {
    pub fn new(scheduler: Arc<WorkStealing>, sink: Arc<dyn OutputSink>) -> LocalExecutor {
        LocalExecutor {
            scheduler,
            sink,
            schedule: Schedule::default(),
            policy: ErrorPolicy::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn num_workers(&self) -> usize {
        self.scheduler.num_workers()
    }

    /// Execute `work` for every index of `partition` and block until all of them completed.
    ///
    /// Every successful [WorkResult][crate::WorkResult] is written to the output sink. Failures
    /// (errors, panics, failed writes) are reported once all indices ran, as
    /// [Error::Execution] carrying the first failure and the total count.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn run(&self, partition: &Partition, work: Arc<dyn WorkUnit>) -> Result<RunSummary> {
        self.scheduler
            .block_on(self.run_async(partition.clone(), work))
    }

    /// The non blocking version of [run][LocalExecutor::run], the returned future drives the
    /// worker tasks which are already queued on the pool.
    pub fn run_async(
        &self,
        partition: Partition,
        work: Arc<dyn WorkUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<RunSummary>> + Send>> {
        let scheds = match plan(self.schedule, partition.len(), self.num_workers()) {
            Ok(scheds) => scheds,
            Err(e) => return Box::pin(ready(Err(e.into()))),
        };
        trace!(
            "pe {} running {:?} with {} tasks ({:?})",
            self.scheduler.my_pe(),
            partition.range(),
            scheds.len(),
            self.schedule
        );
        let state = Arc::new(RunState::default());
        let tasks: Vec<_> = scheds
            .into_iter()
            .map(|sched| {
                let task = WorkerTask {
                    start: partition.start(),
                    sched,
                    ctx: partition.owner.clone(),
                    work: work.clone(),
                    sink: self.sink.clone(),
                    policy: self.policy,
                    state: state.clone(),
                };
                self.scheduler.spawn_task(async move { task.exec() })
            })
            .collect();
        Box::pin(async move {
            join_all(tasks).await;
            state.to_result()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CaptureSink;
    use crate::scheduler::{create_scheduler, PoolConfig, SchedulerType};
    use crate::work::WorkResult;
    use std::collections::HashSet;

    fn executor(num_workers: usize) -> (LocalExecutor, Arc<CaptureSink>) {
        let sched = create_scheduler(
            SchedulerType::WorkStealing,
            0,
            &PoolConfig {
                num_workers,
                affinity: false,
                deadlock_timeout: 600.0,
            },
        )
        .unwrap();
        let sink = Arc::new(CaptureSink::new());
        (LocalExecutor::new(sched, sink.clone()), sink)
    }

    fn here() -> ExecutionContext {
        ExecutionContext::new(0, 1, "local")
    }

    fn echo() -> Arc<dyn WorkUnit> {
        Arc::new(|i: i64, _: &ExecutionContext| -> anyhow::Result<WorkResult> {
            Ok(WorkResult::new(i, i.to_string()))
        })
    }

    #[test]
    fn every_index_emits_once_for_all_schedules() {
        for schedule in [
            Schedule::Static,
            Schedule::Dynamic,
            Schedule::Chunk(1),
            Schedule::Chunk(8),
            Schedule::Guided,
            Schedule::WorkStealing,
        ] {
            let (exec, sink) = executor(4);
            let exec = exec.with_schedule(schedule);
            let summary = exec.run(&Partition::new(-50..450, here()), echo()).unwrap();
            assert_eq!(summary.executed, 500);
            let mut got: Vec<i64> = sink.lines().iter().map(|l| l.parse().unwrap()).collect();
            got.sort();
            assert_eq!(got, (-50..450).collect::<Vec<_>>(), "{schedule:?}");
        }
    }

    #[test]
    fn empty_partition_runs_nothing() {
        let (exec, sink) = executor(2);
        let summary = exec.run(&Partition::new(3..3, here()), echo()).unwrap();
        assert_eq!(summary.executed, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn failures_are_collected_after_all_units_ran() {
        let (exec, sink) = executor(3);
        let work = Arc::new(|i: i64, _: &ExecutionContext| {
            if i % 10 == 0 {
                anyhow::bail!("bad index {i}");
            }
            Ok(WorkResult::new(i, i.to_string()))
        });
        let err = exec.run(&Partition::new(0..100, here()), work).unwrap_err();
        match err {
            Error::Execution { first, failed } => {
                assert_eq!(failed, 10);
                assert_eq!(first.index % 10, 0);
                assert_eq!(first.ordinal, 0);
                assert_eq!(first.name, "local");
                assert!(first.message.contains("bad index"));
            }
            e => panic!("unexpected error {e:?}"),
        }
        assert_eq!(sink.len(), 90);
    }

    #[test]
    fn fail_fast_stops_claiming_indices() {
        let (exec, sink) = executor(1);
        let exec = exec.with_policy(ErrorPolicy::FailFast);
        let work = Arc::new(|i: i64, _: &ExecutionContext| {
            if i == 0 {
                anyhow::bail!("first index fails");
            }
            Ok(WorkResult::new(i, i.to_string()))
        });
        let err = exec.run(&Partition::new(0..1000, here()), work).unwrap_err();
        assert!(matches!(err, Error::Execution { failed: 1, .. }));
        // a single static range: nothing after index 0 runs
        assert!(sink.is_empty());
    }

    #[test]
    fn panics_become_execution_errors() {
        let (exec, sink) = executor(2);
        let work = Arc::new(|i: i64, _: &ExecutionContext| {
            if i == 7 {
                panic!("index seven");
            }
            Ok(WorkResult::new(i, i.to_string()))
        });
        let err = exec.run(&Partition::new(0..20, here()), work).unwrap_err();
        match err {
            Error::Execution { first, failed } => {
                assert_eq!(failed, 1);
                assert_eq!(first.index, 7);
                assert!(first.message.contains("index seven"));
            }
            e => panic!("unexpected error {e:?}"),
        }
        let lines: HashSet<String> = sink.lines().into_iter().collect();
        assert_eq!(lines.len(), 19);
        assert!(!lines.contains("7"));
    }

    #[test]
    fn zero_chunk_schedule_is_a_config_error() {
        let (exec, _sink) = executor(2);
        let exec = exec.with_schedule(Schedule::Chunk(0));
        let err = exec.run(&Partition::new(0..5, here()), echo()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(crate::error::ConfigError::InvalidChunkSize(0))
        ));
    }
}
