//! `fluxlab deploy|stop|reset` - whole-lab lifecycle.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::Context;
use crate::cli::args::ResetArgs;
use crate::output::{self, OutcomeView, OutputFormat};

#[derive(Serialize)]
struct DeploySummary {
    descriptor: Option<String>,
    converged: usize,
    outcomes: Vec<OutcomeView>,
}

#[derive(Serialize)]
struct StopSummary {
    fleet_down: bool,
    removed_networks: Vec<String>,
    warnings: Vec<String>,
}

pub async fn deploy(ctx: Context) -> Result<()> {
    let mut registry = ctx.load_registry()?;
    if registry.is_empty() {
        output::warning("No networks registered; nothing to deploy.");
        return Ok(());
    }

    let before = registry.clone();
    let reconciler = ctx.reconciler();
    if ctx.output_format == OutputFormat::Pretty {
        println!("{}", "Deploying...".bold().cyan());
    }
    let report = reconciler.deploy(&mut registry, &ctx.descriptor()).await?;

    if before != registry {
        ctx.commit(&registry)?;
    } else if let Err(e) = ctx.snapshot_writer().write(&registry) {
        tracing::warn!(error = %e, "could not write registry snapshot");
    }

    let summary = DeploySummary {
        descriptor: report.descriptor.as_ref().map(|p| p.display().to_string()),
        converged: report.converged(),
        outcomes: report.outcomes.iter().map(OutcomeView::from).collect(),
    };
    if !output::print_structured(ctx.output_format, &summary)? {
        output::print_outcomes(ctx.output_format, &report.outcomes)?;
        if ctx.output_format == OutputFormat::Pretty {
            println!();
            println!(
                "{} {}/{} networks converged.",
                "Deployment complete:".bold(),
                summary.converged,
                report.outcomes.len()
            );
        }
    }

    let degraded = report.outcomes.len() - summary.converged;
    if degraded > 0 {
        anyhow::bail!("{degraded} network(s) did not converge");
    }
    Ok(())
}

pub async fn stop(ctx: Context) -> Result<()> {
    let report = ctx.reconciler().stop().await;

    // The catalog survives a stop; monitoring still gets a fresh view of it.
    let registry = ctx.load_registry()?;
    if let Err(e) = ctx.snapshot_writer().write(&registry) {
        tracing::warn!(error = %e, "could not write registry snapshot");
    }

    let summary = StopSummary {
        fleet_down: report.fleet_down,
        removed_networks: report.removed_networks,
        warnings: report.warnings,
    };
    if output::print_structured(ctx.output_format, &summary)? {
        return Ok(());
    }

    if summary.fleet_down {
        output::success("Fleet stopped.");
    }
    if !summary.removed_networks.is_empty() {
        output::success(&format!(
            "Removed networks: {}",
            summary.removed_networks.join(", ")
        ));
    }
    for warning in &summary.warnings {
        output::warning(warning);
    }
    Ok(())
}

pub async fn reset(ctx: Context, args: ResetArgs) -> Result<()> {
    if !args.yes {
        anyhow::bail!(
            "Refusing to drop every network without confirmation.\n\
             Re-run with: fluxlab reset --yes"
        );
    }

    let mut registry = ctx.load_registry()?;
    let count = registry.len();
    registry.reset();
    ctx.commit(&registry)?;

    output::success(&format!("Catalog cleared ({count} network(s) removed)."));
    Ok(())
}
