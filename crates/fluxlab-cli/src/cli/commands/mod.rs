//! Command implementations.

pub mod client;
pub mod config;
pub mod lab;
pub mod live;
pub mod network;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use fluxlab_core::TopologyRegistry;
use fluxlab_engine::{ComposeFile, ComposeRuntime, LabFiles, Reconciler, SnapshotWriter};

use crate::config::LabConfig;
use crate::output::OutputFormat;
use crate::state;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: LabConfig,

    /// Where the configuration lives
    pub config_path: PathBuf,

    /// Resolved lab directory
    pub work_dir: PathBuf,

    /// Output format
    pub output_format: OutputFormat,

    /// Log verbosity (0 = warnings only)
    pub verbose: u8,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// Load the catalog kept in the lab directory.
    pub fn load_registry(&self) -> Result<TopologyRegistry> {
        state::load(&self.work_dir, self.config.base_subnet_octet)
    }

    /// Persist a mutated catalog and refresh the monitoring snapshot.
    ///
    /// The snapshot is best effort: a failure is logged, not returned.
    pub fn commit(&self, registry: &TopologyRegistry) -> Result<()> {
        state::save(&self.work_dir, registry)?;
        if let Err(e) = self.snapshot_writer().write(registry) {
            warn!(error = %e, "could not write registry snapshot");
        }
        Ok(())
    }

    /// On-disk lab layout.
    pub fn files(&self) -> LabFiles {
        LabFiles::new(&self.work_dir)
    }

    /// Monitoring snapshot writer.
    pub fn snapshot_writer(&self) -> SnapshotWriter {
        SnapshotWriter::new(self.files().snapshot_path(), &self.config.domain)
    }

    /// Compose descriptor for deploys.
    pub fn descriptor(&self) -> ComposeFile {
        ComposeFile::new(self.config.compose_path(&self.work_dir))
    }

    /// Reconciler driving the compose project from the config.
    pub fn reconciler(&self) -> Reconciler {
        let runtime = ComposeRuntime::new(
            &self.config.project_name,
            self.config.compose_path(&self.work_dir),
            &self.work_dir,
        );
        Reconciler::new(
            Arc::new(runtime),
            self.files(),
            self.config.reconcile_settings(),
        )
    }
}
