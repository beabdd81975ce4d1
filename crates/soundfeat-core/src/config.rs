//! Pipeline configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on the worker count.
pub const MAX_THREADS: usize = 256;

/// Configuration for building and running a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads; `None` uses the rayon default.
    pub threads: Option<usize>,
    /// Upper bound on the solved buffer footprint in bytes.
    pub memory_limit: Option<usize>,
    /// Check every stage output for invalid values and log a warning.
    pub validate_outputs: bool,
    /// Write the lifetime tree as Graphviz DOT here after solving.
    pub dump_graph: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(threads) = self.threads {
            if threads == 0 || threads > MAX_THREADS {
                return Err(Error::InvalidConfig(format!(
                    "threads {} out of range (1-{})",
                    threads, MAX_THREADS
                )));
            }
        }
        if self.memory_limit == Some(0) {
            return Err(Error::InvalidConfig(
                "memory_limit must be greater than 0".to_string(),
            ));
        }
        if let Some(path) = &self.dump_graph {
            if path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig("dump_graph path is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Number of workers the pipeline will use.
    pub fn workers(&self) -> usize {
        self.threads
            .unwrap_or_else(rayon::current_num_threads)
            .max(1)
    }
}
