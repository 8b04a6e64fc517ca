use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::network::{NetworkDefinition, DEFAULT_DOMAIN};

/// Resolver settings for the in-lab test client.
///
/// Rebuilt into resolv.conf text on demand; the nameserver list always
/// reflects the networks currently in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientResolverConfig {
    /// Search domain appended to short names
    pub search: String,

    /// `options ndots:N`
    pub ndots: u32,

    /// Explicit nameserver order by network name, `None` for auto
    #[serde(default)]
    pub order: Option<Vec<String>>,
}

impl Default for ClientResolverConfig {
    fn default() -> Self {
        Self {
            search: DEFAULT_DOMAIN.to_string(),
            ndots: 1,
            order: None,
        }
    }
}

impl ClientResolverConfig {
    /// Nameserver addresses in the order the client should try them.
    ///
    /// Auto order sorts numerically by address. Explicit order skips names
    /// that are no longer in the catalog.
    #[must_use]
    pub fn nameservers<'a, I>(&self, networks: I) -> Vec<Ipv4Addr>
    where
        I: IntoIterator<Item = &'a NetworkDefinition>,
    {
        let networks: Vec<&NetworkDefinition> = networks.into_iter().collect();
        let mut ips: Vec<Ipv4Addr> = match &self.order {
            Some(order) => order
                .iter()
                .filter_map(|name| networks.iter().find(|n| &n.name == name))
                .map(|n| n.dns_ip())
                .collect(),
            None => {
                let mut ips: Vec<Ipv4Addr> = networks.iter().map(|n| n.dns_ip()).collect();
                ips.sort_unstable();
                ips
            }
        };
        let mut seen = std::collections::HashSet::new();
        ips.retain(|ip| seen.insert(*ip));
        ips
    }

    /// Render resolv.conf text
    #[must_use]
    pub fn render<'a, I>(&self, networks: I) -> String
    where
        I: IntoIterator<Item = &'a NetworkDefinition>,
    {
        let mut out = format!("search {}\noptions ndots:{}\n", self.search, self.ndots);
        for ip in self.nameservers(networks) {
            out.push_str(&format!("nameserver {ip}\n"));
        }
        out
    }
}
