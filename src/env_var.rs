use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::ConfigError;

fn default_deadlock_timeout() -> f64 {
    600.0
}

fn default_backend() -> String {
    "local".to_owned()
}

fn default_threads() -> usize {
    match std::thread::available_parallelism() {
        Ok(n) => n.into(),
        Err(_) => 4,
    }
}

fn default_num_pes() -> usize {
    1
}

fn default_chunk_size() -> usize {
    1
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Seconds a `block_on` may wait before a possible deadlock is reported, default: 600.0 seconds
    #[serde(default = "default_deadlock_timeout")]
    pub deadlock_timeout: f64,

    /// The lamellae backend to use
    /// local -- in process execution, emulating `num_pes` PEs (default)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Worker threads per PE, default: available parallelism
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Number of PEs when none is given on the command line, default: 1
    #[serde(default = "default_num_pes")]
    pub num_pes: usize,

    /// Distribution chunk size used by the distributed tutorials, default: 1
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pin worker threads to cores. Default: false
    #[serde(default)]
    pub affinity: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            deadlock_timeout: default_deadlock_timeout(),
            backend: default_backend(),
            threads: default_threads(),
            num_pes: default_num_pes(),
            chunk_size: default_chunk_size(),
            affinity: false,
        }
    }
}

/// Read the `LAMELLAR_` prefixed environment into a [Config].
pub fn from_env() -> Result<Config, ConfigError> {
    envy::prefixed("LAMELLAR_")
        .from_env::<Config>()
        .map_err(|e| ConfigError::InvalidValue {
            name: "LAMELLAR_*".to_owned(),
            reason: e.to_string(),
        })
}

/// Get the current Environment Variable configuration
///
/// The environment is read once; a malformed environment is reported on every call.
pub fn config() -> Result<&'static Config, ConfigError> {
    static CONFIG: OnceLock<Result<Config, ConfigError>> = OnceLock::new();
    CONFIG.get_or_init(from_env).as_ref().map_err(Clone::clone)
}
