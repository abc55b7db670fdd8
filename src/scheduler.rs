use std::sync::Arc;

pub(crate) mod work_stealing;
pub use work_stealing::{PoolTask, WorkStealing};

use crate::error::Result;

/// The available worker thread scheduling algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerType {
    #[default]
    WorkStealing,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SchedulerStatus {
    Active,
    Finished,
}

/// Per PE settings of the worker pool.
#[derive(Debug, Clone)]
pub(crate) struct PoolConfig {
    pub(crate) num_workers: usize,
    pub(crate) affinity: bool,
    pub(crate) deadlock_timeout: f64,
}

pub(crate) fn create_scheduler(
    sched: SchedulerType,
    my_pe: usize,
    config: &PoolConfig,
) -> Result<Arc<WorkStealing>> {
    match sched {
        SchedulerType::WorkStealing => Ok(Arc::new(WorkStealing::new(my_pe, config)?)),
    }
}
