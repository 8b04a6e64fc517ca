//! Output formatting for different formats.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use fluxlab_engine::{Outcome, State};

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed tables with colors
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// YAML output
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "table" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: pretty, json, csv, yaml",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Print `value` as JSON or YAML. Returns false for the other formats so the
/// caller can render them itself.
pub fn print_structured<T: Serialize>(format: OutputFormat, value: &T) -> Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Pretty | OutputFormat::Csv => return Ok(false),
    }
    Ok(true)
}

pub fn success(msg: &str) {
    println!("{} {}", "Success:".green().bold(), msg);
}

pub fn warning(msg: &str) {
    println!("{} {}", "Warning:".yellow().bold(), msg);
}

/// Serializable view of a reconciliation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeView {
    pub network: String,
    pub kind: String,
    pub state: String,
    pub converged: bool,
    pub addresses: Vec<String>,
    pub desired: u32,
}

impl From<&Outcome> for OutcomeView {
    fn from(outcome: &Outcome) -> Self {
        Self {
            network: outcome.network.clone(),
            kind: outcome.kind.to_string(),
            state: outcome.state.to_string(),
            converged: outcome.is_converged(),
            addresses: outcome.addresses.iter().map(ToString::to_string).collect(),
            desired: outcome.desired,
        }
    }
}

/// Print reconciliation outcomes in `format`.
pub fn print_outcomes(format: OutputFormat, outcomes: &[Outcome]) -> Result<()> {
    let views: Vec<OutcomeView> = outcomes.iter().map(OutcomeView::from).collect();
    if print_structured(format, &views)? {
        return Ok(());
    }

    if format == OutputFormat::Csv {
        println!("network,kind,state,desired,addresses");
        for v in &views {
            println!(
                "{},{},{},{},{}",
                v.network,
                v.kind,
                v.state.replace(',', ";"),
                v.desired,
                v.addresses.join(" ")
            );
        }
        return Ok(());
    }

    for outcome in outcomes {
        print_outcome_line(outcome);
    }
    Ok(())
}

fn print_outcome_line(outcome: &Outcome) {
    let addrs: Vec<String> = outcome.addresses.iter().map(ToString::to_string).collect();
    match &outcome.state {
        State::Converged if outcome.is_partial() => println!(
            "  {} {}: converged with {} of {} {} ({})",
            "!".yellow().bold(),
            outcome.network.bold(),
            addrs.len(),
            outcome.desired,
            outcome.kind.unit_name(),
            addrs.join(", ").cyan()
        ),
        State::Converged if addrs.is_empty() => {
            println!("  {} {}: converged", "✓".green().bold(), outcome.network.bold());
        }
        State::Converged => println!(
            "  {} {}: converged ({})",
            "✓".green().bold(),
            outcome.network.bold(),
            addrs.join(", ").cyan()
        ),
        State::Degraded(reason) => println!(
            "  {} {}: {}",
            "✗".red().bold(),
            outcome.network.bold(),
            reason.to_string().red()
        ),
        other => println!("  {} {}: {}", "?".dimmed(), outcome.network.bold(), other),
    }
}
