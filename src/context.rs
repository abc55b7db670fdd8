use serde::{Deserialize, Serialize};

/// A place work can run: a worker slot on this PE, or a PE (locale) of the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionContext {
    ordinal: usize,
    total_count: usize,
    display_name: String,
}

impl ExecutionContext {
    pub fn new(ordinal: usize, total_count: usize, display_name: impl Into<String>) -> Self {
        assert!(total_count > 0, "a context set must not be empty");
        assert!(
            ordinal < total_count,
            "invalid ordinal: {:?} of {:?}",
            ordinal,
            total_count
        );
        ExecutionContext {
            ordinal,
            total_count,
            display_name: display_name.into(),
        }
    }

    /// Returns the 0-based id of this context (roughly equivalent to MPI Rank)
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the 1-based id, as printed by the tutorials
    pub fn id(&self) -> usize {
        self.ordinal + 1
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// The name used for PE `pe` of `num_pes` running on this host.
pub(crate) fn pe_name(pe: usize, num_pes: usize) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_owned());
    if num_pes == 1 {
        host
    } else {
        format!("{host}-{pe}")
    }
}
