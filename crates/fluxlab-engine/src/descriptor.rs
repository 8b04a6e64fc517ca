//! Source of the orchestration descriptor a deploy brings up.

use std::path::PathBuf;
use tracing::debug;

use fluxlab_core::{LabError, Result, TopologyRegistry};

/// Produces the fleet descriptor for the current catalog
pub trait DescriptorSource: Send + Sync {
    /// Make the descriptor for `registry` available and return its path
    fn prepare(&self, registry: &TopologyRegistry) -> Result<PathBuf>;
}

/// Operator-maintained compose file used as is
#[derive(Debug, Clone)]
pub struct ComposeFile {
    path: PathBuf,
}

impl ComposeFile {
    /// Descriptor at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DescriptorSource for ComposeFile {
    fn prepare(&self, registry: &TopologyRegistry) -> Result<PathBuf> {
        if !self.path.is_file() {
            return Err(LabError::Orchestration(format!(
                "compose file {} not found; it must declare the services for: {}",
                self.path.display(),
                registry.names().join(", ")
            )));
        }
        debug!(path = %self.path.display(), "using compose file");
        Ok(self.path.clone())
    }
}
