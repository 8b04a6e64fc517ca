//! `fluxlab config` - CLI configuration management.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::LabConfig;
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(&ctx),
        ConfigCommands::Set { key, value } => set_config(&ctx, &key, &value),
        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(config)?);
        }
        _ => {
            println!("{}", "Current Configuration:".bold());
            println!();
            println!("  {} {}", "project_name:".bold(), config.project_name);
            println!("  {} {}", "compose_file:".bold(), config.compose_file.display());
            println!("  {} {}", "work_dir:".bold(), config.work_dir.display());
            println!("  {} {}", "domain:".bold(), config.domain);
            println!("  {} {}", "base_subnet_octet:".bold(), config.base_subnet_octet);
            println!(
                "  {} {}",
                "output_format:".bold(),
                config.output_format.unwrap_or_default()
            );
            println!(
                "  {} {}s (cdn {}s), polling every {}s",
                "discovery:".bold(),
                config.discovery.timeout_secs,
                config.discovery.cdn_timeout_secs,
                config.discovery.poll_interval_secs
            );
        }
    }

    Ok(())
}

fn set_config(ctx: &Context, key: &str, value: &str) -> Result<()> {
    // Re-read so values only present through flags are not persisted.
    let mut config = LabConfig::load(&ctx.config_path)?;
    config.set(key, value)?;
    config.save(&ctx.config_path)?;

    println!(
        "{} {} set to {}.",
        "Success:".green().bold(),
        key,
        value.trim().cyan()
    );
    Ok(())
}
