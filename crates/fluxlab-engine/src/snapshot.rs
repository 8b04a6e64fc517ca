//! Registry snapshot writer for monitoring.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use fluxlab_core::{RegistrySnapshot, Result, TopologyRegistry};

/// Writes the read-only registry projection to disk
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
    domain: String,
}

impl SnapshotWriter {
    /// Writer targeting `path`, publishing FQDNs under `domain`
    pub fn new(path: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            domain: domain.into(),
        }
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Project `registry` at the current time and write it.
    ///
    /// Readers never see a half-written file: the JSON goes to a sibling
    /// temp file that is then renamed over the target.
    pub fn write(&self, registry: &TopologyRegistry) -> Result<RegistrySnapshot> {
        let snapshot = RegistrySnapshot::build(
            registry.list(),
            &self.domain,
            chrono::Utc::now().timestamp(),
        );
        self.write_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Write an already built snapshot
    pub fn write_snapshot(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            path = %self.path.display(),
            networks = snapshot.networks.len(),
            "wrote registry snapshot"
        );
        Ok(())
    }
}
