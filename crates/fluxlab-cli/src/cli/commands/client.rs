//! `fluxlab client` - resolver settings of the test client.

use anyhow::Result;
use tracing::debug;

use fluxlab_core::TopologyRegistry;

use super::Context;
use crate::cli::args::{ClientArgs, ClientCommands, ClientOption};
use crate::output;

pub async fn execute(ctx: Context, args: ClientArgs) -> Result<()> {
    let mut registry = ctx.load_registry()?;

    let message = match args.command {
        ClientCommands::Show => {
            print!("{}", registry.render_resolver());
            return Ok(());
        }
        ClientCommands::Order { order } => {
            let order = parse_order(&order);
            let message = match &order {
                Some(names) => format!("Nameserver order pinned to {}.", names.join(", ")),
                None => "Nameserver order follows subnet allocation.".to_string(),
            };
            registry.set_resolver_order(order)?;
            message
        }
        ClientCommands::Set {
            option: ClientOption::Search { domain },
        } => {
            registry.set_resolver_search(&domain)?;
            format!("Search domain set to {}.", registry.resolver().search)
        }
        ClientCommands::Set {
            option: ClientOption::Ndots { ndots },
        } => {
            registry.set_resolver_ndots(ndots);
            format!("ndots set to {ndots}.")
        }
    };

    ctx.commit(&registry)?;
    publish(&ctx, &registry)?;

    output::success(&message);
    Ok(())
}

/// `auto` (or nothing) clears the pin; otherwise a comma-separated list.
fn parse_order(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        return None;
    }
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Rewrite the client's resolver file when the lab has been deployed.
/// Before the first deploy it is written as part of the deploy itself.
fn publish(ctx: &Context, registry: &TopologyRegistry) -> Result<()> {
    let files = ctx.files();
    if !files.dns_config_dir().is_dir() {
        debug!("lab not deployed yet, resolver file left for deploy");
        return Ok(());
    }
    let path = files.write_resolver(&registry.render_resolver())?;
    debug!(path = %path.display(), "resolver file updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        assert_eq!(parse_order("auto"), None);
        assert_eq!(parse_order(" AUTO "), None);
        assert_eq!(parse_order(""), None);
        assert_eq!(
            parse_order("fluxy, edge1,,lbn"),
            Some(vec![
                "fluxy".to_string(),
                "edge1".to_string(),
                "lbn".to_string()
            ])
        );
    }
}
