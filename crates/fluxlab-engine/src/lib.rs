//! Side-effecting half of fluxlab.
//!
//! This crate turns the catalog kept by [`fluxlab_core`] into a running lab:
//!
//! - [`runtime`]: the container runtime contract and its `docker compose` driver
//! - [`discovery`]: bounded polling for the addresses a service holds
//! - [`reconcile`]: the scale, discover, publish, reload state machine
//! - [`files`]: zone files, agent lists and the other files a lab keeps on disk
//! - [`snapshot`]: the registry projection written for monitoring
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fluxlab_core::{NetworkKind, TopologyRegistry};
//! use fluxlab_engine::{ComposeRuntime, LabFiles, ReconcileSettings, Reconciler};
//!
//! let runtime = Arc::new(ComposeRuntime::new("multi-flux-sim", "docker-compose.yml", "."));
//! let reconciler = Reconciler::new(runtime, LabFiles::new("."), ReconcileSettings::default());
//!
//! let mut registry = TopologyRegistry::new();
//! registry.add("fluxy", NetworkKind::Flux)?;
//! let outcome = reconciler.scale_up(&mut registry, "fluxy").await?;
//! println!("{}: {}", outcome.network, outcome.state);
//! ```

pub mod clock;
pub mod descriptor;
pub mod discovery;
mod error;
pub mod files;
pub mod reconcile;
pub mod runtime;
pub mod snapshot;

pub use clock::{Clock, TokioClock};
pub use descriptor::{ComposeFile, DescriptorSource};
pub use discovery::{discover, DiscoveryPolicy};
pub use error::{RuntimeError, RuntimeResult};
pub use files::LabFiles;
pub use reconcile::{
    DegradedReason, DeployReport, Outcome, ReconcileSettings, Reconciler, ScaleDirection, State,
    StopReport,
};
pub use runtime::{ComposeRuntime, ContainerRuntime};
pub use snapshot::SnapshotWriter;
