use super::HelloProgram;
use crate::config_store::ConfigStore;
use crate::error::{ConfigError, Result};
use crate::iteration::RunSummary;
use crate::world::World;

/// The simplest program: a single line from the main thread.
pub struct Hello;

impl HelloProgram for Hello {
    const NAME: &'static str = "hello";

    fn register_config(_config: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
        Ok(())
    }

    fn run(_config: &ConfigStore, world: &World) -> Result<RunSummary> {
        world.output().write_line("Hello world!")?;
        Ok(RunSummary { executed: 1 })
    }
}
