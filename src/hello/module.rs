use super::HelloProgram;
use crate::config_store::ConfigStore;
use crate::error::{ConfigError, Result};
use crate::iteration::RunSummary;
use crate::world::World;

/// Prints a configurable message.
pub struct Hello2Module;

impl HelloProgram for Hello2Module {
    const NAME: &'static str = "hello2-module";

    fn register_config(config: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
        config.register_with_help("message", "Hello, world!", "the message to print")
    }

    fn run(config: &ConfigStore, world: &World) -> Result<RunSummary> {
        world.output().write_line(config.get_str("message")?)?;
        Ok(RunSummary { executed: 1 })
    }
}
