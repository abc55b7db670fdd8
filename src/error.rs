//! Error types shared by the configuration layer, the executors and the lamellae.

use crate::config_store::ValueKind;
use thiserror::Error;

/// Errors raised while registering, resolving or validating configuration.
///
/// These surface at startup, before any work has been scheduled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config option `{0}` is already registered")]
    DuplicateName(String),
    #[error("config option `{name}` expects a {expected} value, got `{value}`")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        value: String,
    },
    #[error("config option `{0}` is not registered")]
    NotFound(String),
    #[error("invalid chunk size {0}, must be at least 1")]
    InvalidChunkSize(i64),
    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// A single work unit failure, with enough context to reproduce it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("index {index} failed on locale {ordinal} ({name}): {message}")]
pub struct ExecutionError {
    pub index: i64,
    pub ordinal: usize,
    pub name: String,
    pub message: String,
}

/// The crate wide error type returned by the executors and the world.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// One or more work units failed; `first` is the first failure observed.
    #[error("{failed} work unit(s) failed, first: {first}")]
    Execution { first: ExecutionError, failed: usize },
    #[error("locale {ordinal} ({name}) is unavailable")]
    NodeUnavailable { ordinal: usize, name: String },
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
    #[error("failed to start worker threads: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
