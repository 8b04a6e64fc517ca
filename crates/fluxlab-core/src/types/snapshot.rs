//! Registry snapshot -- read-only projection for monitoring.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::network::{FluxSelector, NetworkDefinition, NetworkKind};

/// Point-in-time projection of the whole catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Unix seconds at which the snapshot was taken
    pub updated_at: i64,
    /// One entry per network, keyed by name
    pub networks: BTreeMap<String, SnapshotEntry>,
}

/// Per-network view exposed to monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Network name
    pub name: String,
    /// Topology kind
    pub kind: NetworkKind,
    /// Subnet octet
    pub subnet_octet: u8,
    /// CIDR of the network
    pub subnet: String,
    /// Backing instance count
    pub size: u32,
    /// Record TTL in seconds
    pub ttl: u32,
    /// Flux rotation interval in seconds
    pub flux_interval: u32,
    /// Flux selection strategy
    pub flux_selector: FluxSelector,
    /// Name clients resolve
    pub fqdn: String,
    /// DNS server address
    pub dns_ip: String,
}

impl RegistrySnapshot {
    /// Project `networks` at time `updated_at`
    #[must_use]
    pub fn build<'a, I>(networks: I, domain: &str, updated_at: i64) -> Self
    where
        I: IntoIterator<Item = &'a NetworkDefinition>,
    {
        let networks = networks
            .into_iter()
            .map(|net| (net.name.clone(), SnapshotEntry::from_definition(net, domain)))
            .collect();
        Self {
            updated_at,
            networks,
        }
    }
}

impl SnapshotEntry {
    fn from_definition(net: &NetworkDefinition, domain: &str) -> Self {
        Self {
            name: net.name.clone(),
            kind: net.kind,
            subnet_octet: net.subnet_octet,
            subnet: net.subnet(),
            size: net.size,
            ttl: net.ttl,
            flux_interval: net.flux_interval,
            flux_selector: net.flux_selector,
            fqdn: net.fqdn(domain),
            dns_ip: net.dns_ip().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_shape() {
        let mut net = NetworkDefinition::new("fluxy", NetworkKind::Flux, 60);
        net.size = 3;
        net.flux_interval = 10;
        net.flux_selector = FluxSelector::RoundRobin;

        let snap = RegistrySnapshot::build([&net], "sim.local", 1_700_000_000);
        let json: serde_json::Value = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["updated_at"], 1_700_000_000);
        let entry = &json["networks"]["fluxy"];
        assert_eq!(entry["name"], "fluxy");
        assert_eq!(entry["kind"], "flux");
        assert_eq!(entry["subnet"], "172.60.0.0/24");
        assert_eq!(entry["fqdn"], "fluxy.sim.local");
        assert_eq!(entry["dns_ip"], "172.60.0.53");
        assert_eq!(entry["flux_selector"], "roundrobin");
        assert_eq!(entry["size"], 3);
    }
}
