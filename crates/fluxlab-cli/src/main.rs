//! fluxlab - DNS topology lab control plane
//!
//! Builds fast-flux, load-balanced and CDN style networks out of containers
//! and keeps their zone files in step with what is actually running.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fluxlab_cli::run().await
}
