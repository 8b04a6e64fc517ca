//! `fluxlab scale|ttl|reload|refresh` - operations on the running fleet.

use anyhow::Result;

use fluxlab_core::TopologyRegistry;
use fluxlab_engine::{Outcome, ScaleDirection};

use super::Context;
use crate::cli::args::{NameArgs, ScaleArgs, ScaleCommands, TtlArgs};
use crate::output;

pub async fn scale(ctx: Context, args: ScaleArgs) -> Result<()> {
    let (name, direction) = match args.command {
        ScaleCommands::Up(NameArgs { name }) => (name, ScaleDirection::Up),
        ScaleCommands::Down(NameArgs { name }) => (name, ScaleDirection::Down),
    };

    let mut registry = ctx.load_registry()?;
    let before = registry.clone();
    let outcome = ctx
        .reconciler()
        .scale(&mut registry, &name, direction)
        .await?;

    finish(&ctx, &before, &registry, &outcome)
}

pub async fn ttl(ctx: Context, args: TtlArgs) -> Result<()> {
    let mut registry = ctx.load_registry()?;
    let before = registry.clone();
    let outcome = ctx
        .reconciler()
        .set_live_ttl(&mut registry, &args.name, args.ttl)
        .await?;

    finish(&ctx, &before, &registry, &outcome)
}

pub async fn reload(ctx: Context, args: NameArgs) -> Result<()> {
    let registry = ctx.load_registry()?;
    let outcome = ctx.reconciler().reload(&registry, &args.name).await?;

    finish(&ctx, &registry, &registry, &outcome)
}

pub async fn refresh(ctx: Context, args: NameArgs) -> Result<()> {
    let registry = ctx.load_registry()?;
    let outcome = ctx.reconciler().refresh(&registry, &args.name).await?;

    finish(&ctx, &registry, &registry, &outcome)
}

/// Persist the catalog if the operation committed anything, print the
/// outcome and turn a degraded network into a failing exit status.
fn finish(
    ctx: &Context,
    before: &TopologyRegistry,
    after: &TopologyRegistry,
    outcome: &Outcome,
) -> Result<()> {
    if before != after {
        ctx.commit(after)?;
    }

    output::print_outcomes(ctx.output_format, std::slice::from_ref(outcome))?;

    match outcome.degraded() {
        Some(reason) => anyhow::bail!("{} is degraded: {reason}", outcome.network),
        None => Ok(()),
    }
}
