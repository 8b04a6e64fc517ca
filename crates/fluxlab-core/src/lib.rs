//! Core model for the fluxlab DNS topology simulator.
//!
//! This crate is pure: no processes, no filesystem, no clock. It provides:
//!
//! - **Registry**: the catalog of simulated networks and their tunables
//! - **Types**: network kinds, resolver settings and the monitoring snapshot
//! - **Zone**: the zone file grammar and the transforms the reconciler applies
//! - **Errors**: the lab-wide error type [`LabError`]
//!
//! # Example
//!
//! ```rust
//! use fluxlab_core::{NetworkKind, TopologyRegistry, zone};
//!
//! let mut registry = TopologyRegistry::new();
//! let net = registry.add("fluxy", NetworkKind::Flux).unwrap().clone();
//! assert_eq!(net.subnet(), "172.60.0.0/24");
//!
//! let text = zone::render(&net, "sim.local", 2024060101);
//! let text = zone::set_single_a(&text, "fluxy", "172.60.0.7".parse().unwrap());
//! assert!(text.contains("2024060102 ; Serial (dynamically generated)"));
//! ```

mod error;
pub mod registry;
pub mod types;
pub mod zone;

pub use error::{LabError, Result};
pub use registry::TopologyRegistry;
pub use types::*;
pub use zone::Zone;
