//! Hello world programs on top of a small PGAS style runtime.
//!
//! The runtime runs a unit of work for every index of a range, either on the worker threads of a
//! single PE (processing element, a.k.a. locale) or spread across all PEs of a [World].
//!
//! The pieces, leaf first:
//! - [ConfigStore]: typed, named options with defaults, overridden from the command line
//! - [WorkUnit]: a function of an index and the [ExecutionContext] it runs on, producing one line
//! - [IndexPartitioner]: splits a range into contiguous [Partition]s, one per context
//! - [LocalExecutor]: runs a partition on the thread pool of one PE, see [Schedule]
//! - [DistributedExecutor]: partitions a range over the PEs of a [Lamellae] and aggregates the results
//! - [OutputSink]: writes whole lines, never interleaving concurrent writers
//!
//! Output order across indices is unspecified, work units run concurrently.
//!
//! Lamellae are the substrate the PEs live on. Currently only the "local" lamellae exists,
//! emulating any number of PEs inside a single process.
//!
//! EXAMPLES
//! --------
//!
//! # Running a distributed loop
//! ```no_run
//! use lamellar_hello::{ExecutionContext, WorkResult, WorldBuilder};
//! use std::sync::Arc;
//!
//! let world = WorldBuilder::new().with_num_pes(4).build().unwrap();
//! let work = |i: i64, ctx: &ExecutionContext| -> anyhow::Result<WorkResult> {
//!     Ok(WorkResult::new(i, format!("iteration {i} on locale {}", ctx.id())))
//! };
//! let summary = world.dist_executor().run(0..100, 1, Arc::new(work)).unwrap();
//! assert_eq!(summary.executed, 100);
//! ```
//!
//! Runtime settings are read from `LAMELLAR_` prefixed environment variables, see [env_var::Config].

pub mod config_store;
pub mod context;
pub mod distributed;
pub mod env_var;
pub mod error;
pub mod hello;
pub mod iteration;
pub mod lamellae;
pub mod output;
pub mod partition;
mod scheduler;
pub mod utils;
pub mod work;
pub mod world;

pub use crate::config_store::{ConfigEntry, ConfigStore, ConfigValue, ValueKind};
pub use crate::context::ExecutionContext;
pub use crate::distributed::{DistributedExecutor, LocaleTag};
pub use crate::env_var::config;
pub use crate::error::{ConfigError, Error, ExecutionError, Result};
pub use crate::iteration::{ErrorPolicy, LocalExecutor, RunSummary, Schedule};
pub use crate::lamellae::{Backend, Lamellae, LocalLamellae};
pub use crate::output::{CaptureSink, LockedWriter, OutputSink};
pub use crate::partition::{Distribution, IndexPartitioner, Partition};
pub use crate::scheduler::{PoolTask, SchedulerType, WorkStealing};
pub use crate::work::{WorkResult, WorkUnit};
pub use crate::world::{World, WorldBuilder};
