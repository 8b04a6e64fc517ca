//! `fluxlab add|remove|status|list|set` - catalog management.
//!
//! These commands only touch the catalog. Changes reach the running fleet
//! on the next deploy, or through the live commands.

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fluxlab_core::{NetworkDefinition, NetworkKind, RegistrySnapshot};

use super::Context;
use crate::cli::args::{AddArgs, NameArgs, SetArgs, SetCommands, StatusArgs};
use crate::output::{self, OutputFormat};

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Subnet")]
    subnet: String,
    #[tabled(rename = "DNS")]
    dns_ip: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "TTL")]
    ttl: u32,
    #[tabled(rename = "Tuning")]
    tuning: String,
}

impl NetworkRow {
    fn new(net: &NetworkDefinition) -> Self {
        Self {
            name: net.name.clone(),
            kind: net.kind.to_string(),
            subnet: net.subnet(),
            dns_ip: net.dns_ip().to_string(),
            size: format!("{} {}", net.size, net.kind.unit_name()),
            ttl: net.ttl,
            tuning: tuning(net),
        }
    }
}

fn tuning(net: &NetworkDefinition) -> String {
    match net.kind {
        NetworkKind::Flux => format!(
            "every {}s, {}",
            net.flux_interval, net.flux_selector
        ),
        NetworkKind::Lb => format!("{} via {}", net.lb_algo, net.lb_ip()),
        NetworkKind::Normal | NetworkKind::Cdn => "-".to_string(),
    }
}

/// Command to try from inside the test client.
fn probe_hint(net: &NetworkDefinition, domain: &str) -> String {
    match net.kind {
        NetworkKind::Lb => format!(
            "docker compose exec dns_client_test curl http://{}",
            net.lb_ip()
        ),
        _ => format!(
            "docker compose exec dns_client_test dig @{} {} +short",
            net.dns_ip(),
            net.fqdn(domain)
        ),
    }
}

pub async fn add(ctx: Context, args: AddArgs) -> Result<()> {
    let mut registry = ctx.load_registry()?;
    let net = registry.add(&args.name, args.kind)?.clone();
    ctx.commit(&registry)?;

    if output::print_structured(ctx.output_format, &net)? {
        return Ok(());
    }
    output::success(&format!(
        "Added {} network {} on {} (DNS {}).",
        net.kind,
        net.name.cyan(),
        net.subnet(),
        net.dns_ip()
    ));
    println!(
        "{}",
        format!("Run `fluxlab deploy` to bring {} up.", net.name).dimmed()
    );
    Ok(())
}

pub async fn remove(ctx: Context, args: NameArgs) -> Result<()> {
    let mut registry = ctx.load_registry()?;
    let kind = registry.remove(&args.name)?;
    ctx.commit(&registry)?;

    output::success(&format!("Removed {kind} network {}.", args.name.cyan()));
    Ok(())
}

pub async fn list(ctx: Context) -> Result<()> {
    let registry = ctx.load_registry()?;
    let names = registry.names();
    if output::print_structured(ctx.output_format, &names)? {
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

pub async fn status(ctx: Context, args: StatusArgs) -> Result<()> {
    let registry = ctx.load_registry()?;
    let networks: Vec<&NetworkDefinition> = match &args.name {
        Some(name) => vec![registry.require(name)?],
        None => registry.list(),
    };

    let domain = &ctx.config.domain;
    match ctx.output_format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let snapshot = RegistrySnapshot::build(networks, domain, now());
            output::print_structured(ctx.output_format, &snapshot)?;
        }
        OutputFormat::Csv => {
            println!("name,kind,subnet,dns_ip,size,ttl,flux_interval,flux_selector,lb_algo,fqdn");
            for net in networks {
                println!(
                    "{},{},{},{},{},{},{},{},{},{}",
                    net.name,
                    net.kind,
                    net.subnet(),
                    net.dns_ip(),
                    net.size,
                    net.ttl,
                    net.flux_interval,
                    net.flux_selector,
                    net.lb_algo,
                    net.fqdn(domain)
                );
            }
        }
        OutputFormat::Pretty => print_status_pretty(&networks, domain),
    }

    Ok(())
}

fn print_status_pretty(networks: &[&NetworkDefinition], domain: &str) {
    if networks.is_empty() {
        println!("{}", "No networks configured.".yellow());
        println!();
        println!(
            "  Add one with: {} add <normal|flux|lb|cdn> <NAME>",
            "fluxlab".cyan()
        );
        return;
    }

    println!("{}", "Configured Networks:".bold());
    let rows: Vec<NetworkRow> = networks.iter().map(|n| NetworkRow::new(n)).collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    println!();
    println!("{}", "Try:".bold());
    for net in networks {
        println!("  {:<12} {}", net.name.cyan(), probe_hint(net, domain).dimmed());
    }
}

pub async fn set(ctx: Context, args: SetArgs) -> Result<()> {
    let mut registry = ctx.load_registry()?;

    let (name, message) = match args.command {
        SetCommands::Size { name, size } => {
            registry.set_size(&name, size)?;
            let unit = registry.require(&name)?.kind.unit_name();
            let message = format!("{name} will run {size} {unit}(s) on next deploy.");
            (name, message)
        }
        SetCommands::Ttl { name, ttl } => {
            registry.set_ttl(&name, ttl)?;
            let message = format!("{name} TTL set to {ttl}s for the next deploy.");
            (name, message)
        }
        SetCommands::FluxInterval { name, seconds } => {
            registry.set_flux_interval(&name, seconds)?;
            let message = format!("{name} rotates every {seconds}s.");
            (name, message)
        }
        SetCommands::FluxSelector { name, selector } => {
            registry.set_flux_selector(&name, selector)?;
            let message = format!("{name} selects agents by {selector}.");
            (name, message)
        }
        SetCommands::LbAlgo { name, algo } => {
            registry.set_lb_algo(&name, algo)?;
            let message = format!("{name} balances with {algo}.");
            (name, message)
        }
    };

    ctx.commit(&registry)?;

    if output::print_structured(ctx.output_format, registry.require(&name)?)? {
        return Ok(());
    }
    output::success(&message);
    Ok(())
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_hints() {
        let lb = NetworkDefinition::new("lbn", NetworkKind::Lb, 62);
        assert_eq!(
            probe_hint(&lb, "sim.local"),
            "docker compose exec dns_client_test curl http://172.62.0.80"
        );
        let cdn = NetworkDefinition::new("edge1", NetworkKind::Cdn, 61);
        assert_eq!(
            probe_hint(&cdn, "sim.local"),
            "docker compose exec dns_client_test dig @172.61.0.53 edge1.sim.local +short"
        );
    }

    #[test]
    fn test_tuning_column() {
        let flux = NetworkDefinition::new("fluxy", NetworkKind::Flux, 60);
        assert_eq!(tuning(&flux), "every 5s, random");
        let lb = NetworkDefinition::new("lbn", NetworkKind::Lb, 62);
        assert_eq!(tuning(&lb), "round_robin via 172.62.0.80");
    }
}
