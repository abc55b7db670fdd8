use super::{count_too_large, HelloProgram};
use crate::config_store::ConfigStore;
use crate::context::ExecutionContext;
use crate::error::{ConfigError, Result};
use crate::iteration::RunSummary;
use crate::work::WorkResult;
use crate::world::World;

use std::sync::Arc;

/// The data parallel loop of [Hello3DataPar][super::Hello3DataPar], with the iterations
/// block distributed over all locales.
pub struct Hello4DataParDist;

impl HelloProgram for Hello4DataParDist {
    const NAME: &'static str = "hello4-datapar-dist";

    fn register_config(config: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
        config.register_with_help("numMessages", 100i64, "number of messages to print")
    }

    fn run(config: &ConfigStore, world: &World) -> Result<RunSummary> {
        let num_messages = config.get_count("numMessages")? as i64;
        let end = num_messages
            .checked_add(1)
            .ok_or_else(|| count_too_large("numMessages"))?;
        let work = move |i: i64, ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
            Ok(WorkResult::new(
                i,
                format!(
                    "Hello, world! (from iteration {i} of {num_messages} owned by locale {} of {})",
                    ctx.id(),
                    ctx.total_count()
                ),
            ))
        };
        world
            .dist_executor()
            .run(1..end, world.chunk_size(), Arc::new(work))
    }
}
