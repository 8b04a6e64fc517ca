use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::LabError;

/// Upper bound on backing instances per network
pub const MAX_AGENTS: u32 = 10;

/// First subnet octet handed out by a fresh registry
pub const BASE_SUBNET_START: u8 = 60;

/// Default record TTL in seconds
pub const DEFAULT_TTL: u32 = 60;

/// Default flux rotation interval in seconds
pub const DEFAULT_FLUX_INTERVAL: u32 = 5;

/// Number of edges a new CDN network starts with
pub const DEFAULT_CDN_SIZE: u32 = 3;

/// Search domain every simulated network lives under
pub const DEFAULT_DOMAIN: &str = "sim.local";

/// Topology kind of a simulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    /// Single origin server
    Normal,
    /// Fast-flux: rotating set of proxy agents in front of an origin
    Flux,
    /// Load balancer in front of a worker pool
    Lb,
    /// Several edges published as multi-A records
    Cdn,
}

impl NetworkKind {
    /// All kinds, in display order
    pub const ALL: [Self; 4] = [Self::Normal, Self::Flux, Self::Lb, Self::Cdn];

    /// Size a freshly added network of this kind starts with
    #[must_use]
    pub const fn default_size(self) -> u32 {
        match self {
            Self::Cdn => DEFAULT_CDN_SIZE,
            _ => 1,
        }
    }

    /// Whether live scaling by one unit is available
    #[must_use]
    pub const fn is_scalable(self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Service prefix of the workload that gets scaled
    #[must_use]
    pub const fn scaled_service_prefix(self) -> &'static str {
        match self {
            Self::Normal => "origin_server",
            Self::Flux => "proxy_agent",
            Self::Lb => "worker",
            Self::Cdn => "cdn_edge",
        }
    }

    /// Service prefix of the workload whose addresses get published
    #[must_use]
    pub const fn published_service_prefix(self) -> &'static str {
        match self {
            Self::Lb => "load_balancer",
            other => other.scaled_service_prefix(),
        }
    }

    /// What one unit of `size` is called for this kind
    #[must_use]
    pub const fn unit_name(self) -> &'static str {
        match self {
            Self::Normal => "origin",
            Self::Flux => "agent",
            Self::Lb => "worker",
            Self::Cdn => "edge",
        }
    }
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Flux => write!(f, "flux"),
            Self::Lb => write!(f, "lb"),
            Self::Cdn => write!(f, "cdn"),
        }
    }
}

impl FromStr for NetworkKind {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "flux" => Ok(Self::Flux),
            "lb" => Ok(Self::Lb),
            "cdn" => Ok(Self::Cdn),
            _ => Err(LabError::InvalidValue {
                field: "kind",
                value: s.to_string(),
                expected: "normal|flux|lb|cdn",
            }),
        }
    }
}

/// How the flux DNS updater picks the next proxy agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluxSelector {
    /// Uniformly random agent per rotation
    #[default]
    #[serde(rename = "random")]
    Random,
    /// Cycle through agents in list order
    #[serde(rename = "roundrobin")]
    RoundRobin,
}

impl std::fmt::Display for FluxSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::RoundRobin => write!(f, "roundrobin"),
        }
    }
}

impl FromStr for FluxSelector {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "roundrobin" => Ok(Self::RoundRobin),
            _ => Err(LabError::InvalidValue {
                field: "flux selector",
                value: s.to_string(),
                expected: "random|roundrobin",
            }),
        }
    }
}

/// Upstream selection algorithm of the load balancer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbAlgo {
    /// Rotate requests across workers
    #[default]
    RoundRobin,
    /// Pin clients to a worker by source address
    IpHash,
}

impl std::fmt::Display for LbAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::IpHash => write!(f, "ip_hash"),
        }
    }
}

impl FromStr for LbAlgo {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Self::RoundRobin),
            "ip_hash" => Ok(Self::IpHash),
            _ => Err(LabError::InvalidValue {
                field: "lb algorithm",
                value: s.to_string(),
                expected: "round_robin|ip_hash",
            }),
        }
    }
}

/// A named simulated network in the catalog.
///
/// `kind` and `subnet_octet` never change after creation; everything else is
/// tuned through the registry, which validates bounds before mutating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDefinition {
    /// Unique catalog key
    pub name: String,

    /// Topology kind
    pub kind: NetworkKind,

    /// Second octet of the network's 172.x.0.0/24 range
    pub subnet_octet: u8,

    /// Number of backing instances (1..=MAX_AGENTS)
    pub size: u32,

    /// Record TTL in seconds (>= 1)
    pub ttl: u32,

    /// Flux rotation interval in seconds
    #[serde(default = "default_flux_interval")]
    pub flux_interval: u32,

    /// Flux agent selection strategy
    #[serde(default)]
    pub flux_selector: FluxSelector,

    /// Load balancer algorithm
    #[serde(default)]
    pub lb_algo: LbAlgo,
}

const fn default_flux_interval() -> u32 {
    DEFAULT_FLUX_INTERVAL
}

impl NetworkDefinition {
    /// Create a definition with the defaults for `kind`
    #[must_use]
    pub fn new(name: impl Into<String>, kind: NetworkKind, subnet_octet: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            subnet_octet,
            size: kind.default_size(),
            ttl: DEFAULT_TTL,
            flux_interval: DEFAULT_FLUX_INTERVAL,
            flux_selector: FluxSelector::default(),
            lb_algo: LbAlgo::default(),
        }
    }

    /// CIDR of the network's isolated address range
    #[must_use]
    pub fn subnet(&self) -> String {
        format!("172.{}.0.0/24", self.subnet_octet)
    }

    /// Host address `172.<octet>.0.<host>` inside this network
    #[must_use]
    pub const fn host(&self, host: u8) -> Ipv4Addr {
        Ipv4Addr::new(172, self.subnet_octet, 0, host)
    }

    /// Fixed address of the network's DNS server
    #[must_use]
    pub const fn dns_ip(&self) -> Ipv4Addr {
        self.host(53)
    }

    /// Address the initial zone points at before discovery runs
    #[must_use]
    pub const fn placeholder_ip(&self) -> Ipv4Addr {
        self.host(5)
    }

    /// Fixed address of the load balancer (lb networks)
    #[must_use]
    pub const fn lb_ip(&self) -> Ipv4Addr {
        self.host(80)
    }

    /// Fully qualified name clients resolve
    #[must_use]
    pub fn fqdn(&self, domain: &str) -> String {
        format!("{}.{domain}", self.name)
    }

    /// Compose service name of the DNS server
    #[must_use]
    pub fn dns_service(&self) -> String {
        format!("dns_server_{}", self.name)
    }

    /// Compose service name of the workload that gets scaled
    #[must_use]
    pub fn scaled_service(&self) -> String {
        format!("{}_{}", self.kind.scaled_service_prefix(), self.name)
    }

    /// Compose service name of the workload whose addresses get published
    #[must_use]
    pub fn published_service(&self) -> String {
        format!("{}_{}", self.kind.published_service_prefix(), self.name)
    }
}
