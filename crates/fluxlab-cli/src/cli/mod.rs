//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LabConfig;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so structured output on stdout stays parseable
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Load configuration
    let config_path = match cli.config {
        Some(path) => path,
        None => LabConfig::default_path()?,
    };
    let config = LabConfig::load(&config_path)?;

    let work_dir = cli.work_dir.unwrap_or_else(|| config.work_dir.clone());
    let output_format = cli.output.or(config.output_format).unwrap_or_default();

    let ctx = commands::Context {
        config,
        config_path,
        work_dir,
        output_format,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };

    match cli.command {
        Commands::Add(args) => commands::network::add(ctx, args).await,
        Commands::Remove(args) => commands::network::remove(ctx, args).await,
        Commands::Status(args) => commands::network::status(ctx, args).await,
        Commands::List => commands::network::list(ctx).await,
        Commands::Set(args) => commands::network::set(ctx, args).await,
        Commands::Scale(args) => commands::live::scale(ctx, args).await,
        Commands::Ttl(args) => commands::live::ttl(ctx, args).await,
        Commands::Reload(args) => commands::live::reload(ctx, args).await,
        Commands::Refresh(args) => commands::live::refresh(ctx, args).await,
        Commands::Deploy => commands::lab::deploy(ctx).await,
        Commands::Stop => commands::lab::stop(ctx).await,
        Commands::Reset(args) => commands::lab::reset(ctx, args).await,
        Commands::Client(args) => commands::client::execute(ctx, args).await,
        Commands::Config(args) => commands::config::execute(ctx, args).await,
    }
}
