use super::HelloProgram;
use crate::config_store::ConfigStore;
use crate::context::ExecutionContext;
use crate::error::{ConfigError, Result};
use crate::iteration::{RunSummary, Schedule};
use crate::partition::Partition;
use crate::work::WorkResult;
use crate::world::World;

use std::sync::Arc;

/// One task per message, handed out to the worker threads one at a time.
pub struct Hello5TaskPar;

impl HelloProgram for Hello5TaskPar {
    const NAME: &'static str = "hello5-taskpar";

    fn register_config(config: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
        config.register_with_help("numTasks", 100i64, "number of tasks to create")
    }

    fn run(config: &ConfigStore, world: &World) -> Result<RunSummary> {
        let num_tasks = config.get_count("numTasks")? as i64;
        let work = move |tid: i64, _ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
            Ok(WorkResult::new(
                tid,
                format!("Hello, world! (from task {} of {num_tasks})", tid + 1),
            ))
        };
        world
            .local_executor()
            .with_schedule(Schedule::Chunk(1))
            .run(&Partition::new(0..num_tasks, world.here()), Arc::new(work))
    }
}
