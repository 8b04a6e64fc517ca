//! Topology registry: the in-memory catalog of simulated networks.
//!
//! The registry owns every [`NetworkDefinition`] and is the only place they
//! are created or destroyed. Every setter validates kind and bounds before
//! touching anything, so a rejected command never leaves a half-applied
//! change behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{LabError, Result};
use crate::types::{
    ClientResolverConfig, FluxSelector, LbAlgo, NetworkDefinition, NetworkKind,
    BASE_SUBNET_START, MAX_AGENTS,
};

/// Largest TTL a zone file may carry (RFC 2181 section 8).
pub const MAX_TTL: u32 = 2_147_483_647;

const MAX_OCTET: u16 = 255;

/// Catalog of network definitions plus the client resolver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRegistry {
    networks: BTreeMap<String, NetworkDefinition>,
    base_octet: u8,
    next_octet: u16,
    #[serde(default)]
    resolver: ClientResolverConfig,
}

impl Default for TopologyRegistry {
    fn default() -> Self {
        Self::with_base(BASE_SUBNET_START)
    }
}

impl TopologyRegistry {
    /// Create an empty registry with the default subnet base
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that allocates octets from `base` upward
    #[must_use]
    pub fn with_base(base: u8) -> Self {
        Self {
            networks: BTreeMap::new(),
            base_octet: base,
            next_octet: u16::from(base),
            resolver: ClientResolverConfig::default(),
        }
    }

    /// Register a new network with the defaults for `kind`
    pub fn add(&mut self, name: &str, kind: NetworkKind) -> Result<&NetworkDefinition> {
        validate_name(name)?;
        if self.networks.contains_key(name) {
            return Err(LabError::DuplicateName {
                name: name.to_string(),
            });
        }
        let octet = self.allocate_subnet()?;
        let net = NetworkDefinition::new(name, kind, octet);
        Ok(self.networks.entry(name.to_string()).or_insert(net))
    }

    /// Delete a network and return its kind.
    ///
    /// The freed octet is not handed out again.
    pub fn remove(&mut self, name: &str) -> Result<NetworkKind> {
        let net = self
            .networks
            .remove(name)
            .ok_or_else(|| LabError::unknown(name))?;
        Ok(net.kind)
    }

    /// Look up a network by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NetworkDefinition> {
        self.networks.get(name)
    }

    /// Look up a network, failing with `UnknownNetwork`
    pub fn require(&self, name: &str) -> Result<&NetworkDefinition> {
        self.get(name).ok_or_else(|| LabError::unknown(name))
    }

    /// All networks sorted by name
    #[must_use]
    pub fn list(&self) -> Vec<&NetworkDefinition> {
        self.networks.values().collect()
    }

    /// Names of all networks, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// Number of registered networks
    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Returns true if no network is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Hand out the next unused subnet octet.
    ///
    /// Starts at the allocation counter, skips octets held by live
    /// definitions and advances the counter past the returned value.
    pub fn allocate_subnet(&mut self) -> Result<u8> {
        let mut candidate = self.next_octet.max(u16::from(self.base_octet));
        while self
            .networks
            .values()
            .any(|n| u16::from(n.subnet_octet) == candidate)
        {
            candidate += 1;
        }
        let octet = u8::try_from(candidate)
            .map_err(|_| LabError::SubnetExhausted { last: MAX_OCTET })?;
        self.next_octet = candidate + 1;
        Ok(octet)
    }

    /// Set the backing instance count (flux, lb and cdn only)
    pub fn set_size(&mut self, name: &str, size: u32) -> Result<()> {
        let net = self.require_mut(name)?;
        if !net.kind.is_scalable() {
            return Err(LabError::UnsupportedOperation {
                name: name.to_string(),
                kind: net.kind,
                operation: "resizing",
            });
        }
        check_range("size", size, 1, MAX_AGENTS)?;
        net.size = size;
        Ok(())
    }

    /// Set the record TTL in seconds
    pub fn set_ttl(&mut self, name: &str, ttl: u32) -> Result<()> {
        check_range("ttl", ttl, 1, MAX_TTL)?;
        self.require_mut(name)?.ttl = ttl;
        Ok(())
    }

    /// Set the flux rotation interval in seconds
    pub fn set_flux_interval(&mut self, name: &str, seconds: u32) -> Result<()> {
        let net = self.require_kind_mut(name, NetworkKind::Flux)?;
        check_range("flux interval", seconds, 1, MAX_TTL)?;
        net.flux_interval = seconds;
        Ok(())
    }

    /// Set the flux agent selection strategy
    pub fn set_flux_selector(&mut self, name: &str, selector: FluxSelector) -> Result<()> {
        self.require_kind_mut(name, NetworkKind::Flux)?.flux_selector = selector;
        Ok(())
    }

    /// Set the load balancer algorithm
    pub fn set_lb_algo(&mut self, name: &str, algo: LbAlgo) -> Result<()> {
        self.require_kind_mut(name, NetworkKind::Lb)?.lb_algo = algo;
        Ok(())
    }

    /// Client resolver settings
    #[must_use]
    pub const fn resolver(&self) -> &ClientResolverConfig {
        &self.resolver
    }

    /// Render the test client's resolv.conf for the current catalog
    #[must_use]
    pub fn render_resolver(&self) -> String {
        self.resolver.render(self.networks.values())
    }

    /// Pin the nameserver order, or `None` for auto.
    ///
    /// Every name must be registered.
    pub fn set_resolver_order(&mut self, order: Option<Vec<String>>) -> Result<()> {
        if let Some(names) = &order {
            let missing: Vec<&str> = names
                .iter()
                .filter(|n| !self.networks.contains_key(n.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(LabError::UnknownNetwork {
                    name: missing.join(", "),
                });
            }
        }
        self.resolver.order = order;
        Ok(())
    }

    /// Set the resolver search domain
    pub fn set_resolver_search(&mut self, domain: &str) -> Result<()> {
        let domain = domain.trim();
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(LabError::InvalidValue {
                field: "search domain",
                value: domain.to_string(),
                expected: "a single domain name",
            });
        }
        self.resolver.search = domain.to_string();
        Ok(())
    }

    /// Set the resolver `ndots` option
    pub fn set_resolver_ndots(&mut self, ndots: u32) {
        self.resolver.ndots = ndots;
    }

    /// Drop every definition and restart allocation at the base octet
    pub fn reset(&mut self) {
        *self = Self::with_base(self.base_octet);
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut NetworkDefinition> {
        self.networks
            .get_mut(name)
            .ok_or_else(|| LabError::unknown(name))
    }

    fn require_kind_mut(
        &mut self,
        name: &str,
        expected: NetworkKind,
    ) -> Result<&mut NetworkDefinition> {
        let net = self.require_mut(name)?;
        if net.kind != expected {
            return Err(LabError::KindMismatch {
                name: name.to_string(),
                expected,
                actual: net.kind,
            });
        }
        Ok(net)
    }
}

/// Labels the zone itself defines; a network named like one would clobber
/// the name server glue record.
const RESERVED_LABELS: [&str; 2] = ["ns", "@"];

/// Names end up in file paths, compose service names and zone labels.
fn validate_name(name: &str) -> Result<()> {
    if RESERVED_LABELS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
        return Err(LabError::InvalidValue {
            field: "network name",
            value: name.to_string(),
            expected: "a label other than the zone's own (ns, @)",
        });
    }
    let ok = !name.is_empty()
        && name.len() <= 48
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(LabError::InvalidValue {
            field: "network name",
            value: name.to_string(),
            expected: "1-48 chars of [A-Za-z0-9_-], starting alphanumeric",
        })
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(LabError::OutOfRange {
            field,
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        })
    }
}
