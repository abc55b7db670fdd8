use super::{count_too_large, HelloProgram};
use crate::config_store::ConfigStore;
use crate::context::ExecutionContext;
use crate::error::{ConfigError, Result};
use crate::iteration::{RunSummary, Schedule};
use crate::work::WorkResult;
use crate::world::World;

use std::sync::Arc;

/// A group of `tasksPerLocale` tasks on every locale.
///
/// Task `t` of locale `l` runs index `l * tasksPerLocale + t`, with a chunk size of
/// `tasksPerLocale` every locale owns exactly its own tasks.
pub struct Hello6TaskParDist;

pub(crate) fn greeting(
    task: usize,
    tasks_per_locale: usize,
    ctx: &ExecutionContext,
    print_locale_name: bool,
) -> String {
    let mut message = String::from("Hello, world! (from ");
    if tasks_per_locale > 1 {
        message.push_str(&format!("task {} of {tasks_per_locale} on ", task + 1));
    }
    message.push_str(&format!("locale {} of {}", ctx.id(), ctx.total_count()));
    if print_locale_name {
        message.push_str(&format!(" named {}", ctx.display_name()));
    }
    message.push(')');
    message
}

impl HelloProgram for Hello6TaskParDist {
    const NAME: &'static str = "hello6-taskpar-dist";

    fn register_config(config: &mut ConfigStore) -> std::result::Result<(), ConfigError> {
        config.register_with_help(
            "printLocaleName",
            true,
            "print the name of the locale each task runs on",
        )?;
        config.register_with_help("tasksPerLocale", 1i64, "number of tasks on each locale")
    }

    fn run(config: &ConfigStore, world: &World) -> Result<RunSummary> {
        let print_locale_name = config.get_bool("printLocaleName")?;
        let tasks_per_locale = config.get_count("tasksPerLocale")?;
        let work = move |i: i64, ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
            let task = i as usize % tasks_per_locale;
            Ok(WorkResult::new(
                i,
                greeting(task, tasks_per_locale, ctx, print_locale_name),
            ))
        };
        let num_tasks = world
            .num_pes()
            .checked_mul(tasks_per_locale)
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(|| count_too_large("tasksPerLocale"))?;
        if num_tasks == 0 {
            // nothing to print, and a chunk size of 0 would be rejected
            return Ok(RunSummary::default());
        }
        world
            .dist_executor()
            .with_schedule(Schedule::Chunk(1))
            .run(0..num_tasks, tasks_per_locale, Arc::new(work))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_formats() {
        let ctx = ExecutionContext::new(0, 2, "node0");
        assert_eq!(
            greeting(0, 1, &ctx, true),
            "Hello, world! (from locale 1 of 2 named node0)"
        );
        assert_eq!(greeting(0, 1, &ctx, false), "Hello, world! (from locale 1 of 2)");
        assert_eq!(
            greeting(2, 3, &ExecutionContext::new(1, 2, "node1"), false),
            "Hello, world! (from task 3 of 3 on locale 2 of 2)"
        );
    }
}
