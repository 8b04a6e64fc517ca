//! # fluxlab-cli
//!
//! Command-line control plane for fluxlab labs.
//!
//! ## Features
//!
//! - **Catalog**: add, remove and tune normal, flux, lb and cdn networks
//! - **Deploy**: write zones, bring the compose fleet up, converge every network
//! - **Live operations**: scale by one, change TTLs, reload DNS, refresh flux agents
//! - **Client resolver**: nameserver order and options for the test client
//! - **Multiple output formats**: Pretty tables, JSON, CSV, YAML

pub mod cli;
pub mod config;
pub mod output;
pub mod state;

pub use cli::run;
