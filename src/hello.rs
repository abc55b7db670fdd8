//! The hello world tutorial programs, from a single line on one thread up to task groups on
//! every locale.
//!
//! Every program registers its options into a [ConfigStore], and [launch] takes care of the
//! rest: command line resolution, `--help`, the [World] and logging.

mod basic;
mod datapar;
mod datapar_dist;
mod module;
mod taskpar;
mod taskpar_dist;

pub use basic::Hello;
pub use datapar::Hello3DataPar;
pub use datapar_dist::Hello4DataParDist;
pub use module::Hello2Module;
pub use taskpar::Hello5TaskPar;
pub use taskpar_dist::Hello6TaskParDist;

use crate::config_store::ConfigStore;
use crate::distributed::LocaleTag;
use crate::env_var::config;
use crate::error::{ConfigError, Result};
use crate::iteration::RunSummary;
use crate::output::OutputSink;
use crate::utils::init_logging;
use crate::world::{World, WorldBuilder};

use anyhow::Context;
use std::sync::Arc;
use tracing::debug;

/// A tutorial program.
pub trait HelloProgram {
    /// The binary name, used in the usage listing.
    const NAME: &'static str;

    /// Register the program's own options.
    fn register_config(config: &mut ConfigStore) -> std::result::Result<(), ConfigError>;

    fn run(config: &ConfigStore, world: &World) -> Result<RunSummary>;
}

/// A count option whose derived index range would not fit an `i64`.
pub(crate) fn count_too_large(name: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_owned(),
        reason: "the resulting index range exceeds i64".to_owned(),
    }
}

fn register_runtime_config(config_store: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
    let num_pes = config()?.num_pes as i64;
    config_store.register_with_help("numLocales", num_pes, "number of locales to run on")?;
    config_store.alias("nl", "numLocales")?;
    config_store.register_with_help(
        "localeTag",
        "none",
        "suffix distributed output with its locale: none, ordinal or name",
    )
}

/// The options of `P` plus the runtime options, with their defaults.
pub fn program_config<P: HelloProgram>() -> std::result::Result<ConfigStore, ConfigError> {
    let mut config = ConfigStore::new();
    register_runtime_config(&mut config)?;
    P::register_config(&mut config)?;
    Ok(config)
}

/// Run `P` with the process arguments, the entry point of the binaries.
pub fn launch<P: HelloProgram>() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = std::env::args().skip(1).collect();
    launch_with::<P>(&args, None)?;
    Ok(())
}

/// Run `P` with `args` (without the program name), writing to `sink` or standard output.
///
/// Returns `None` when only the usage listing was requested.
pub fn launch_with<P: HelloProgram>(
    args: &[String],
    sink: Option<Arc<dyn OutputSink>>,
) -> anyhow::Result<Option<RunSummary>> {
    let mut config = program_config::<P>()?;
    if config.wants_help(args) {
        print!("{}", config.usage(P::NAME));
        return Ok(None);
    }
    config.resolve_args(args)?;
    debug!("{} config: {:?}", P::NAME, config);

    let locale_tag: LocaleTag = config.get_str("localeTag")?.parse()?;
    let mut builder = WorldBuilder::new()
        .with_num_pes(config.get_count("numLocales")?)
        .with_locale_tags(locale_tag);
    if let Some(sink) = sink {
        builder = builder.with_output(sink);
    }
    let world = builder.build().context("failed to start the runtime")?;
    let summary = P::run(&config, &world).with_context(|| format!("{} failed", P::NAME))?;
    Ok(Some(summary))
}
