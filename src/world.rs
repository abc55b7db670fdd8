use crate::context::ExecutionContext;
use crate::distributed::{DistributedExecutor, LocaleTag};
use crate::env_var::config;
use crate::error::{ConfigError, Result};
use crate::iteration::LocalExecutor;
use crate::lamellae::{create_lamellae, Backend, Lamellae};
use crate::output::{LockedWriter, OutputSink};
use crate::scheduler::PoolConfig;

use futures::Future;
use std::sync::Arc;
use tracing::debug;

/// An abstraction representing all the PEs (processing elements) within a given distributed execution.
///
/// Constructed with a [WorldBuilder]. Dropping the world shuts down the worker pools of every PE.
///
/// # Examples
///```no_run
/// use lamellar_hello::WorldBuilder;
///
/// let world = WorldBuilder::new().with_num_pes(2).build().unwrap();
/// assert_eq!(world.num_pes(), 2);
///```
pub struct World {
    lamellae: Arc<dyn Lamellae>,
    sink: Arc<dyn OutputSink>,
    my_pe: usize,
    num_pes: usize,
    threads: usize,
    chunk_size: usize,
    locale_tag: LocaleTag,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("lamellae", &self.lamellae)
            .field("my_pe", &self.my_pe)
            .field("num_pes", &self.num_pes)
            .field("threads", &self.threads)
            .finish()
    }
}

impl World {
    /// Returns the id of this PE (roughly equivalent to MPI Rank)
    pub fn my_pe(&self) -> usize {
        self.my_pe
    }

    /// Returns the number of PEs in the execution
    pub fn num_pes(&self) -> usize {
        self.num_pes
    }

    pub fn num_threads_per_pe(&self) -> usize {
        self.threads
    }

    /// The distribution chunk size configured through `LAMELLAR_CHUNK_SIZE`.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The execution context of this PE.
    pub fn here(&self) -> ExecutionContext {
        self.lamellae.context(self.my_pe)
    }

    pub fn contexts(&self) -> Vec<ExecutionContext> {
        self.lamellae.contexts()
    }

    pub fn lamellae(&self) -> &Arc<dyn Lamellae> {
        &self.lamellae
    }

    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    /// An executor over the worker threads of this PE, writing to the world's output.
    pub fn local_executor(&self) -> LocalExecutor {
        LocalExecutor::new(self.lamellae.scheduler(self.my_pe), self.sink.clone())
    }

    /// An executor over all PEs of the world, writing to the world's output and tagging lines
    /// with the world's [LocaleTag].
    pub fn dist_executor(&self) -> DistributedExecutor {
        DistributedExecutor::new(self.lamellae.clone(), self.sink.clone())
            .with_locale_tags(self.locale_tag)
    }

    /// Run a future to completion on this PE's worker pool.
    pub fn block_on<F>(&self, f: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.lamellae.scheduler(self.my_pe).block_on(f)
    }
}

impl Drop for World {
    fn drop(&mut self) {
        debug!("shutting down world");
        self.lamellae.shutdown();
    }
}

/// Builder for [World], unset fields fall back to the `LAMELLAR_` environment.
pub struct WorldBuilder {
    primary_lamellae: Option<Backend>,
    num_pes: Option<usize>,
    threads: Option<usize>,
    affinity: Option<bool>,
    sink: Option<Arc<dyn OutputSink>>,
    locale_tag: LocaleTag,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        WorldBuilder::new()
    }
}

impl WorldBuilder {
    pub fn new() -> WorldBuilder {
        WorldBuilder {
            primary_lamellae: None,
            num_pes: None,
            threads: None,
            affinity: None,
            sink: None,
            locale_tag: LocaleTag::None,
        }
    }

    /// Specify the lamellae backend to use for this execution
    ///```no_run
    /// use lamellar_hello::{Backend, WorldBuilder};
    ///
    /// let builder = WorldBuilder::new().with_lamellae(Backend::Local);
    ///```
    pub fn with_lamellae(mut self, lamellae: Backend) -> WorldBuilder {
        self.primary_lamellae = Some(lamellae);
        self
    }

    pub fn with_num_pes(mut self, num_pes: usize) -> WorldBuilder {
        self.num_pes = Some(num_pes);
        self
    }

    /// Worker threads per PE, the thread calling `block_on` counts as one of them.
    pub fn with_threads(mut self, threads: usize) -> WorldBuilder {
        self.threads = Some(threads);
        self
    }

    pub fn with_affinity(mut self, affinity: bool) -> WorldBuilder {
        self.affinity = Some(affinity);
        self
    }

    /// Where the lines of the executors go, standard output by default.
    pub fn with_output(mut self, sink: Arc<dyn OutputSink>) -> WorldBuilder {
        self.sink = Some(sink);
        self
    }

    pub fn with_locale_tags(mut self, tag: LocaleTag) -> WorldBuilder {
        self.locale_tag = tag;
        self
    }

    #[tracing::instrument(skip_all, level = "debug")]
    pub fn build(self) -> Result<World> {
        let env = config()?;
        let backend = match self.primary_lamellae {
            Some(backend) => backend,
            None => env.backend.parse()?,
        };
        let num_pes = self.num_pes.unwrap_or(env.num_pes);
        if num_pes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "numLocales".to_owned(),
                reason: "at least one locale is required".to_owned(),
            }
            .into());
        }
        let threads = self.threads.unwrap_or(env.threads);
        if threads == 0 {
            return Err(ConfigError::InvalidValue {
                name: "LAMELLAR_THREADS".to_owned(),
                reason: "at least one thread per PE is required".to_owned(),
            }
            .into());
        }
        if env.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(0).into());
        }
        let pool = PoolConfig {
            num_workers: threads,
            affinity: self.affinity.unwrap_or(env.affinity),
            deadlock_timeout: env.deadlock_timeout,
        };
        let lamellae = create_lamellae(backend, num_pes, &pool)?;
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(LockedWriter::stdout()));
        debug!("world: {backend:?} {num_pes} pes, {threads} threads per pe");
        Ok(World {
            my_pe: lamellae.my_pe(),
            num_pes: lamellae.num_pes(),
            lamellae,
            sink,
            threads,
            chunk_size: env.chunk_size,
            locale_tag: self.locale_tag,
        })
    }
}
