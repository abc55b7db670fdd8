use super::{Backend, Lamellae, PartitionJob, PeHandle};
use crate::context::{pe_name, ExecutionContext};
use crate::error::{ConfigError, Error, Result};
use crate::iteration::{LocalExecutor, RunSummary};
use crate::partition::Partition;
use crate::scheduler::{create_scheduler, PoolConfig, SchedulerType, WorkStealing};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

struct LocalPe {
    ctx: ExecutionContext,
    scheduler: Arc<WorkStealing>,
    available: AtomicBool,
}

/// Emulates `num_pes` PEs in this process, each one owning a separate worker pool.
///
/// PE 0 is the calling PE. Partitions still travel to the other PEs in serialized form.
pub struct LocalLamellae {
    pes: Vec<LocalPe>,
}

impl std::fmt::Debug for LocalLamellae {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalLamellae {{ num_pes: {} }}", self.pes.len())
    }
}

impl LocalLamellae {
    pub(crate) fn new(num_pes: usize, pool: &PoolConfig) -> Result<LocalLamellae> {
        if num_pes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "numLocales".to_owned(),
                reason: "at least one locale is required".to_owned(),
            }
            .into());
        }
        let mut pes = Vec::with_capacity(num_pes);
        for pe in 0..num_pes {
            let scheduler = create_scheduler(SchedulerType::WorkStealing, pe, pool)?;
            pes.push(LocalPe {
                ctx: ExecutionContext::new(pe, num_pes, pe_name(pe, num_pes)),
                scheduler,
                available: AtomicBool::new(true),
            });
        }
        debug!(
            "local lamellae with {num_pes} pes, {} workers each",
            pool.num_workers
        );
        Ok(LocalLamellae { pes })
    }

    /// `num_pes` PEs with `threads` workers each, the remaining pool settings come from the environment.
    pub fn with_threads(num_pes: usize, threads: usize) -> Result<LocalLamellae> {
        let env = crate::env_var::config()?;
        LocalLamellae::new(
            num_pes,
            &PoolConfig {
                num_workers: threads,
                affinity: env.affinity,
                deadlock_timeout: env.deadlock_timeout,
            },
        )
    }

    fn pe(&self, pe: usize) -> &LocalPe {
        assert!(
            pe < self.pes.len(),
            "invalid pe: {:?} of {:?}",
            pe,
            self.pes.len()
        );
        &self.pes[pe]
    }

    /// Mark `pe` as reachable or not, submitting to an unreachable PE fails with
    /// [Error::NodeUnavailable].
    pub fn set_available(&self, pe: usize, available: bool) {
        if !available {
            warn!("pe {pe} marked unavailable");
        }
        self.pe(pe).available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self, pe: usize) -> bool {
        self.pe(pe).available.load(Ordering::SeqCst)
    }
}

/// Executed on the receiving PE: decode the partition and run it on that PE's pool.
async fn run_job(
    scheduler: Arc<WorkStealing>,
    ctx: ExecutionContext,
    job: PartitionJob,
) -> Result<RunSummary> {
    let msg = job.decode()?;
    debug_assert_eq!(msg.pe, ctx.ordinal());
    let exec = LocalExecutor::new(scheduler, job.sink)
        .with_schedule(msg.schedule)
        .with_policy(job.policy);
    exec.run_async(Partition::new(msg.start..msg.end, ctx), job.work)
        .await
}

impl Lamellae for LocalLamellae {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn my_pe(&self) -> usize {
        0
    }

    fn num_pes(&self) -> usize {
        self.pes.len()
    }

    fn context(&self, pe: usize) -> ExecutionContext {
        self.pe(pe).ctx.clone()
    }

    fn scheduler(&self, pe: usize) -> Arc<WorkStealing> {
        self.pe(pe).scheduler.clone()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    fn submit(&self, pe: usize, job: PartitionJob) -> Result<PeHandle> {
        let target = self.pe(pe);
        if !target.available.load(Ordering::SeqCst) {
            return Err(Error::NodeUnavailable {
                ordinal: pe,
                name: target.ctx.display_name().to_owned(),
            });
        }
        trace!("submitting {job:?} to pe {pe}");
        let task = target.scheduler.spawn_task(run_job(
            target.scheduler.clone(),
            target.ctx.clone(),
            job,
        ));
        Ok(Box::pin(task))
    }

    fn shutdown(&self) {
        for pe in &self.pes {
            pe.scheduler.shutdown();
        }
    }
}

impl Drop for LocalLamellae {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::{ErrorPolicy, Schedule};
    use crate::lamellae::PartitionMsg;
    use crate::output::CaptureSink;
    use crate::work::WorkResult;

    fn lamellae(num_pes: usize) -> LocalLamellae {
        LocalLamellae::new(
            num_pes,
            &PoolConfig {
                num_workers: 2,
                affinity: false,
                deadlock_timeout: 600.0,
            },
        )
        .unwrap()
    }

    fn job(pe: usize, start: i64, end: i64, sink: Arc<CaptureSink>) -> PartitionJob {
        let work = Arc::new(
            |i: i64, ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
                Ok(WorkResult::new(i, format!("{i}@{}", ctx.ordinal())))
            },
        );
        let msg = PartitionMsg {
            start,
            end,
            pe,
            schedule: Schedule::Dynamic,
        };
        PartitionJob::new(&msg, work, sink, ErrorPolicy::CollectAll).unwrap()
    }

    #[test]
    fn pe_names_and_contexts() {
        let lam = lamellae(3);
        let ctxs = lam.contexts();
        assert_eq!(ctxs.len(), 3);
        for (pe, ctx) in ctxs.iter().enumerate() {
            assert_eq!(ctx.ordinal(), pe);
            assert_eq!(ctx.total_count(), 3);
            assert!(ctx.display_name().ends_with(&format!("-{pe}")));
        }
        assert!(!lamellae(1).context(0).display_name().is_empty());
    }

    #[test]
    fn submitted_job_runs_on_its_pe() {
        let lamellae = lamellae(2);
        let sink = Arc::new(CaptureSink::new());
        let handle = lamellae.submit(1, job(1, 0, 4, sink.clone())).unwrap();
        let summary = futures::executor::block_on(handle).unwrap();
        assert_eq!(summary.executed, 4);
        assert_eq!(sink.sorted_lines(), vec!["0@1", "1@1", "2@1", "3@1"]);
    }

    #[test]
    fn unavailable_pe_rejects_jobs() {
        let lamellae = lamellae(2);
        lamellae.set_available(1, false);
        let sink = Arc::new(CaptureSink::new());
        match lamellae.submit(1, job(1, 0, 4, sink.clone())) {
            Err(Error::NodeUnavailable { ordinal, .. }) => assert_eq!(ordinal, 1),
            other => panic!("expected NodeUnavailable, got {:?}", other.map(|_| ())),
        }
        assert!(sink.is_empty());
        lamellae.set_available(1, true);
        assert!(lamellae.is_available(1));
    }
}
