use super::{count_too_large, HelloProgram};
use crate::config_store::ConfigStore;
use crate::context::ExecutionContext;
use crate::error::{ConfigError, Result};
use crate::iteration::{RunSummary, Schedule};
use crate::partition::Partition;
use crate::work::WorkResult;
use crate::world::World;

use std::sync::Arc;

/// A data parallel loop over `1..=numMessages` on the cores of this locale.
///
/// The messages may be printed in any order.
pub struct Hello3DataPar;

impl HelloProgram for Hello3DataPar {
    const NAME: &'static str = "hello3-datapar";

    fn register_config(config: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
        config.register_with_help("numMessages", 100i64, "number of messages to print")
    }

    fn run(config: &ConfigStore, world: &World) -> Result<RunSummary> {
        let num_messages = config.get_count("numMessages")? as i64;
        let end = num_messages
            .checked_add(1)
            .ok_or_else(|| count_too_large("numMessages"))?;
        let work = move |i: i64, _ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
            Ok(WorkResult::new(
                i,
                format!("Hello, world! (from iteration {i} of {num_messages})"),
            ))
        };
        world
            .local_executor()
            .with_schedule(Schedule::Static)
            .run(&Partition::new(1..end, world.here()), Arc::new(work))
    }
}
