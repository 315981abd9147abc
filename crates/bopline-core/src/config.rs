//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chunk capacity for operators that do not carry a `chunkCapacity`
    /// annotation. Also the flush threshold of local output buffers.
    pub chunk_capacity: usize,

    /// Number of chunks a blocking buffer holds before producers block.
    /// This is the backpressure knob bounding pipeline memory.
    pub sink_capacity: usize,

    /// Result-size hint passed to range scans (0 lets the index decide).
    pub scan_capacity_hint: usize,

    /// Upper bound on the depth of operator spines walked during analysis.
    pub max_tree_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: 100,
            sink_capacity: 10,
            scan_capacity_hint: 0,
            max_tree_depth: 4096,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `BOPLINE_CHUNK_CAPACITY`: default operator chunk capacity
    /// - `BOPLINE_SINK_CAPACITY`: chunks per blocking buffer
    /// - `BOPLINE_SCAN_CAPACITY_HINT`: range scan result-size hint
    /// - `BOPLINE_MAX_TREE_DEPTH`: spine walk depth bound
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("BOPLINE_CHUNK_CAPACITY") {
            cfg.chunk_capacity = v.max(1);
        }

        if let Some(v) = env_usize("BOPLINE_SINK_CAPACITY") {
            cfg.sink_capacity = v.max(1);
        }

        if let Some(v) = env_usize("BOPLINE_SCAN_CAPACITY_HINT") {
            cfg.scan_capacity_hint = v;
        }

        if let Some(v) = env_usize("BOPLINE_MAX_TREE_DEPTH") {
            cfg.max_tree_depth = v.max(1);
        }

        cfg
    }

    /// Reject settings that would stall or mis-size the pipeline.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.chunk_capacity == 0 {
            return Err(crate::error::Error::Config(
                "chunk_capacity must be at least 1".into(),
            ));
        }
        if self.sink_capacity == 0 {
            return Err(crate::error::Error::Config(
                "sink_capacity must be at least 1".into(),
            ));
        }
        if self.max_tree_depth == 0 {
            return Err(crate::error::Error::Config(
                "max_tree_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
}
