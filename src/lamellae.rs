//! The substrate partitions are dispatched to: a set of PEs, each with its own worker pool.

use crate::context::ExecutionContext;
use crate::env_var::config;
use crate::error::{ConfigError, Result};
use crate::iteration::{ErrorPolicy, RunSummary, Schedule};
use crate::output::OutputSink;
use crate::scheduler::{PoolConfig, WorkStealing};
use crate::work::WorkUnit;

use futures::Future;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

pub(crate) mod local_lamellae;
pub use local_lamellae::LocalLamellae;

/// The list of available lamellae backends, used to specify how partitions are transferred between PEs
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
pub enum Backend {
    /// The Local backend -- emulates `num_pes` PEs inside this process, one thread pool per PE
    Local,
}

impl FromStr for Backend {
    type Err = ConfigError;
    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            other => Err(ConfigError::InvalidValue {
                name: "LAMELLAR_BACKEND".to_owned(),
                reason: format!("unknown backend `{other}`"),
            }),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        match config().map(|c| c.backend.parse::<Backend>()) {
            Ok(Ok(backend)) => backend,
            _ => Backend::Local,
        }
    }
}

/// The wire form of a dispatched partition, decoded by the receiving PE.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionMsg {
    pub(crate) start: i64,
    pub(crate) end: i64,
    pub(crate) pe: usize,
    pub(crate) schedule: Schedule,
}

/// A partition ready to be submitted to a PE.
///
/// The index range travels serialized, the work unit and sink are shared with the submitting PE.
pub struct PartitionJob {
    pub(crate) msg: Vec<u8>,
    pub(crate) work: Arc<dyn WorkUnit>,
    pub(crate) sink: Arc<dyn OutputSink>,
    pub(crate) policy: ErrorPolicy,
}

impl PartitionJob {
    pub(crate) fn new(
        msg: &PartitionMsg,
        work: Arc<dyn WorkUnit>,
        sink: Arc<dyn OutputSink>,
        policy: ErrorPolicy,
    ) -> Result<PartitionJob> {
        Ok(PartitionJob {
            msg: bincode::serialize(msg)?,
            work,
            sink,
            policy,
        })
    }

    pub(crate) fn decode(&self) -> Result<PartitionMsg> {
        Ok(bincode::deserialize(&self.msg)?)
    }
}

impl std::fmt::Debug for PartitionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionJob")
            .field("msg_len", &self.msg.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Resolves once the submitted partition completed on its PE.
pub type PeHandle = Pin<Box<dyn Future<Output = Result<RunSummary>> + Send>>;

/// A set of PEs partitions can be submitted to.
pub trait Lamellae: Send + Sync + std::fmt::Debug {
    fn backend(&self) -> Backend;
    fn my_pe(&self) -> usize;
    fn num_pes(&self) -> usize;
    /// The execution context of `pe`.
    fn context(&self, pe: usize) -> ExecutionContext;
    fn contexts(&self) -> Vec<ExecutionContext> {
        (0..self.num_pes()).map(|pe| self.context(pe)).collect()
    }
    /// The worker pool of `pe`.
    fn scheduler(&self, pe: usize) -> Arc<WorkStealing>;
    /// Start running `job` on `pe`, fails immediately if the PE can not be reached.
    fn submit(&self, pe: usize, job: PartitionJob) -> Result<PeHandle>;
    fn shutdown(&self);
}

pub(crate) fn create_lamellae(
    backend: Backend,
    num_pes: usize,
    pool: &PoolConfig,
) -> Result<Arc<dyn Lamellae>> {
    match backend {
        Backend::Local => Ok(Arc::new(LocalLamellae::new(num_pes, pool)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("local".parse::<Backend>().unwrap(), Backend::Local);
        assert_eq!("LOCAL".parse::<Backend>().unwrap(), Backend::Local);
        assert!(matches!(
            "rofi".parse::<Backend>(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
