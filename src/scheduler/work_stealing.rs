use crate::error::{Error, Result};
use crate::scheduler::{PoolConfig, SchedulerStatus};

use async_task::{Builder, Runnable, Task};
use core_affinity::CoreId;
use crossbeam::deque::{Injector, Stealer, Worker};
use crossbeam::utils::Backoff;
use futures::Future;
use parking_lot::Mutex;
use rand::distributions::{Distribution, Uniform};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace_span, warn, Instrument};

static TASK_ID: AtomicUsize = AtomicUsize::new(0);

/// A handle to a task spawned on a [WorkStealing] pool, awaiting it yields the task's output.
pub type PoolTask<T> = Task<T, usize>;

#[derive(Debug)]
struct WorkStealingThread {
    work_inj: Arc<Injector<Runnable<usize>>>,
    work_stealers: Vec<Stealer<Runnable<usize>>>,
    work_q: Worker<Runnable<usize>>,
    status: Arc<AtomicU8>,
}

impl WorkStealingThread {
    fn run(
        worker: WorkStealingThread,
        name: String,
        active_cnt: Arc<AtomicUsize>,
        core: Option<CoreId>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new().name(name).spawn(move || {
            if let Some(id) = core {
                core_affinity::set_for_current(id);
            }
            debug!(
                "worker thread running {:?} core: {:?}",
                std::thread::current().name(),
                core
            );
            active_cnt.fetch_add(1, Ordering::SeqCst);
            let mut rng = rand::thread_rng();
            let t = Uniform::from(0..worker.work_stealers.len());
            let backoff = Backoff::new();
            while worker.status.load(Ordering::SeqCst) == SchedulerStatus::Active as u8
                || !(worker.work_q.is_empty() && worker.work_inj.is_empty())
            {
                let omsg = worker.work_q.pop().or_else(|| {
                    worker
                        .work_inj
                        .steal_batch_and_pop(&worker.work_q)
                        .success()
                        .or_else(|| worker.work_stealers[t.sample(&mut rng)].steal().success())
                });
                match omsg {
                    Some(runnable) => {
                        runnable.run();
                        backoff.reset();
                    }
                    None if backoff.is_completed() => {
                        thread::sleep(Duration::from_micros(50));
                    }
                    None => backoff.snooze(),
                }
            }
            active_cnt.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

/// The thread pool of a single PE.
///
/// Tasks are pushed to a shared injector, workers move batches of them into their own queues and
/// steal from each other when idle. The thread calling [block_on][WorkStealing::block_on] helps
/// executing tasks, so one fewer worker thread than requested is spawned.
#[derive(Debug)]
pub struct WorkStealing {
    my_pe: usize,
    num_workers: usize,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    work_inj: Arc<Injector<Runnable<usize>>>,
    work_stealers: Vec<Stealer<Runnable<usize>>>,
    status: Arc<AtomicU8>,
    active_cnt: Arc<AtomicUsize>,
    deadlock_timeout: f64,
}

impl WorkStealing {
    pub(crate) fn new(my_pe: usize, config: &PoolConfig) -> Result<WorkStealing> {
        let num_workers = config.num_workers.max(1);
        let max_num_threads = std::cmp::max(1, num_workers - 1);
        let core_ids = if config.affinity {
            core_affinity::get_core_ids().filter(|ids| !ids.is_empty())
        } else {
            None
        };

        let mut work_workers = Vec::with_capacity(max_num_threads);
        let mut work_stealers = Vec::with_capacity(max_num_threads);
        for _ in 0..max_num_threads {
            let work_worker = Worker::new_fifo();
            work_stealers.push(work_worker.stealer());
            work_workers.push(work_worker);
        }

        let ws = WorkStealing {
            my_pe,
            num_workers,
            threads: Mutex::new(Vec::new()),
            work_inj: Arc::new(Injector::new()),
            work_stealers,
            status: Arc::new(AtomicU8::new(SchedulerStatus::Active as u8)),
            active_cnt: Arc::new(AtomicUsize::new(0)),
            deadlock_timeout: config.deadlock_timeout,
        };

        for (i, work_q) in work_workers.into_iter().enumerate() {
            let worker = WorkStealingThread {
                work_inj: ws.work_inj.clone(),
                work_stealers: ws.work_stealers.clone(),
                work_q,
                status: ws.status.clone(),
            };
            let core = core_ids
                .as_ref()
                .map(|ids| ids[(my_pe * max_num_threads + i) % ids.len()]);
            match WorkStealingThread::run(
                worker,
                format!("pe{my_pe}_worker{i}"),
                ws.active_cnt.clone(),
                core,
            ) {
                Ok(handle) => ws.threads.lock().push(handle),
                Err(e) => {
                    ws.shutdown();
                    return Err(Error::Spawn(e));
                }
            }
        }
        while ws.active_cnt.load(Ordering::SeqCst) != max_num_threads {
            std::thread::yield_now();
        }
        debug!("pe {my_pe} started {max_num_threads} worker threads");
        Ok(ws)
    }

    pub fn my_pe(&self) -> usize {
        self.my_pe
    }

    /// The number of threads executing tasks, including the one blocking on the pool.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn active(&self) -> bool {
        self.status.load(Ordering::SeqCst) == SchedulerStatus::Active as u8
    }

    /// Spawn a task onto the pool, the returned handle resolves to the task's output.
    ///
    /// Dropping the handle cancels the task, use [Task::detach] to let it run in the background.
    pub fn spawn_task<F>(&self, task: F) -> PoolTask<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let task_id = TASK_ID.fetch_add(1, Ordering::Relaxed);
        let work_inj = self.work_inj.clone();
        let schedule = move |runnable: Runnable<usize>| work_inj.push(runnable);
        let (runnable, task) = Builder::new()
            .metadata(task_id)
            .propagate_panic(true)
            .spawn(
                move |_task_id: &usize| {
                    task.instrument(trace_span!("Spawned Task", task_id = task_id))
                },
                schedule,
            );
        runnable.schedule();
        task
    }

    /// Try to run one queued task on the calling thread, returns false if there was none.
    pub fn exec_task(&self) -> bool {
        let ret = self.work_inj.steal().success().or_else(|| {
            let mut rng = rand::thread_rng();
            let t = Uniform::from(0..self.work_stealers.len());
            self.work_stealers[t.sample(&mut rng)].steal().success()
        });
        match ret {
            Some(runnable) => {
                runnable.run();
                true
            }
            None => false,
        }
    }

    /// Run a future to completion on the pool, the calling thread executes other tasks while it waits.
    pub fn block_on<F>(&self, fut: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let task = self.spawn_task(fut);
        let timer = Instant::now();
        let mut warned = false;
        while !task.is_finished() {
            if !self.exec_task() {
                std::thread::yield_now();
            }
            if !warned && timer.elapsed().as_secs_f64() > self.deadlock_timeout {
                warn!(
                    "pe {} has been blocked for more than {} seconds, possible deadlock",
                    self.my_pe, self.deadlock_timeout
                );
                warned = true;
            }
        }
        futures::executor::block_on(task)
    }

    /// Let the workers drain the queues and join them.
    pub fn shutdown(&self) {
        self.status
            .store(SchedulerStatus::Finished as u8, Ordering::SeqCst);
        let threads = std::mem::take(&mut *self.threads.lock());
        let my_id = std::thread::current().id();
        for thread in threads {
            if thread.thread().id() != my_id {
                let _res = thread.join();
            }
        }
        debug!("pe {} work stealing pool shut down", self.my_pe);
    }
}

impl Drop for WorkStealing {
    fn drop(&mut self) {
        self.shutdown();
    }
}
