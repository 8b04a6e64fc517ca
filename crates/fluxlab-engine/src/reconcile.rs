//! Reconciliation engine.
//!
//! Drives one network at a time through
//!
//! ```text
//! Unprovisioned -> Scaling -> Discovering -> Publishing -> Reloading -> Converged
//! ```
//!
//! with `Degraded` reachable from every step. Requests that break a bound or
//! do not apply to the network's kind are rejected with an error before any
//! step runs. Everything that goes wrong afterwards is reported in the
//! returned [`Outcome`] instead.
//!
//! `size` is committed to the registry only once Publishing succeeded, so a
//! failed scale or an empty discovery never makes the catalog claim capacity
//! the fleet does not have. A failed reload leaves the published zone in
//! place; re-issuing the reload recovers.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use fluxlab_core::{
    zone, LabError, NetworkDefinition, NetworkKind, Result, TopologyRegistry, Zone, DEFAULT_DOMAIN,
    MAX_AGENTS,
};

use crate::clock::{Clock, TokioClock};
use crate::descriptor::DescriptorSource;
use crate::discovery::{discover, DiscoveryPolicy};
use crate::files::LabFiles;
use crate::runtime::ContainerRuntime;

/// Tunables of the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Zone every network is published under
    pub domain: String,
    /// Discovery bounds for normal, flux and lb networks
    pub discovery: DiscoveryPolicy,
    /// Discovery bounds for cdn networks, which wait for every edge
    pub cdn_discovery: DiscoveryPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            discovery: DiscoveryPolicy::default(),
            cdn_discovery: DiscoveryPolicy {
                timeout: Duration::from_secs(90),
                ..DiscoveryPolicy::default()
            },
        }
    }
}

/// Why a network ended up degraded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// The request was refused before any step ran
    Rejected(String),
    /// The scale request failed
    ScaleFailed(String),
    /// Discovery timed out without a single address
    NoAddresses,
    /// Writing the zone or agent list failed
    PublishFailed(String),
    /// The DNS server did not accept the reload request
    ReloadFailed(String),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(e) => write!(f, "rejected: {e}"),
            Self::ScaleFailed(e) => write!(f, "scaling failed: {e}"),
            Self::NoAddresses => write!(f, "no addresses discovered"),
            Self::PublishFailed(e) => write!(f, "publishing failed: {e}"),
            Self::ReloadFailed(e) => write!(f, "dns reload failed: {e}"),
        }
    }
}

/// Convergence state of one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Nothing has run yet
    Unprovisioned,
    /// Scale request in flight
    Scaling,
    /// Polling for live addresses
    Discovering,
    /// Writing DNS data
    Publishing,
    /// Asking the DNS server to reload
    Reloading,
    /// Published and reload requested
    Converged,
    /// Stopped early
    Degraded(DegradedReason),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprovisioned => write!(f, "unprovisioned"),
            Self::Scaling => write!(f, "scaling"),
            Self::Discovering => write!(f, "discovering"),
            Self::Publishing => write!(f, "publishing"),
            Self::Reloading => write!(f, "reloading"),
            Self::Converged => write!(f, "converged"),
            Self::Degraded(reason) => write!(f, "degraded ({reason})"),
        }
    }
}

/// Result of driving one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Network name
    pub network: String,
    /// Network kind
    pub kind: NetworkKind,
    /// Final state
    pub state: State,
    /// Addresses that were published, sorted ascending
    pub addresses: Vec<Ipv4Addr>,
    /// Instance count that was asked for
    pub desired: u32,
}

impl Outcome {
    fn start(net: &NetworkDefinition, desired: u32) -> Self {
        Self {
            network: net.name.clone(),
            kind: net.kind,
            state: State::Unprovisioned,
            addresses: Vec::new(),
            desired,
        }
    }

    fn enter(&mut self, state: State) {
        debug!(network = %self.network, from = %self.state, to = %state, "state transition");
        self.state = state;
    }

    fn degrade(mut self, reason: DegradedReason) -> Self {
        warn!(network = %self.network, reason = %reason, "network degraded");
        self.enter(State::Degraded(reason));
        self
    }

    fn rejected(network: &str, kind: NetworkKind, err: &LabError) -> Self {
        Self {
            network: network.to_string(),
            kind,
            state: State::Degraded(DegradedReason::Rejected(err.to_string())),
            addresses: Vec::new(),
            desired: 0,
        }
    }

    /// Whether the network reached `Converged`
    pub const fn is_converged(&self) -> bool {
        matches!(self.state, State::Converged)
    }

    /// Converged, but with fewer live addresses than desired
    pub fn is_partial(&self) -> bool {
        self.is_converged()
            && self.kind != NetworkKind::Normal
            && self.kind != NetworkKind::Lb
            && self.addresses.len() < self.desired as usize
    }

    /// Degradation reason, if any
    pub const fn degraded(&self) -> Option<&DegradedReason> {
        match &self.state {
            State::Degraded(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Live scaling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    /// One more instance
    Up,
    /// One fewer instance
    Down,
}

/// Per-network results of a full deploy
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    /// Descriptor the fleet was brought up from, `None` if nothing ran
    pub descriptor: Option<PathBuf>,
    /// One outcome per network, in name order
    pub outcomes: Vec<Outcome>,
}

impl DeployReport {
    /// Number of networks that converged
    pub fn converged(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_converged()).count()
    }
}

/// What a teardown did. Every field is informational.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    /// Whether `down` succeeded
    pub fleet_down: bool,
    /// Leftover runtime networks that were removed
    pub removed_networks: Vec<String>,
    /// Non-fatal problems hit along the way
    pub warnings: Vec<String>,
}

/// Drives the container fleet and the zone files towards the catalog
pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
    clock: Arc<dyn Clock>,
    files: LabFiles,
    settings: ReconcileSettings,
}

impl Reconciler {
    /// Reconciler over `runtime` writing under `files`
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        files: LabFiles,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            runtime,
            clock: Arc::new(TokioClock),
            files,
            settings,
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Lab file layout
    pub const fn files(&self) -> &LabFiles {
        &self.files
    }

    /// Active settings
    pub const fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    // ========================================================================
    // Per-network state machine
    // ========================================================================

    /// Converge `name` at its committed size
    pub async fn converge(&self, registry: &mut TopologyRegistry, name: &str) -> Result<Outcome> {
        let size = registry.require(name)?.size;
        self.scale_to(registry, name, size).await
    }

    /// Converge `name` at `size` instances, committing `size` on publish
    pub async fn scale_to(
        &self,
        registry: &mut TopologyRegistry,
        name: &str,
        size: u32,
    ) -> Result<Outcome> {
        let net = registry.require(name)?.clone();
        if !(1..=MAX_AGENTS).contains(&size) {
            return Err(out_of_range(i64::from(size)));
        }
        if !net.kind.is_scalable() && size != net.size {
            return Err(unsupported(&net, "resizing"));
        }

        let mut outcome = Outcome::start(&net, size);
        let scaled = net.scaled_service();

        outcome.enter(State::Scaling);
        if let Err(e) = self.runtime.scale(&scaled, size).await {
            return Ok(outcome.degrade(DegradedReason::ScaleFailed(e.to_string())));
        }

        outcome.enter(State::Discovering);
        let (min_count, policy) = match net.kind {
            NetworkKind::Cdn => (size as usize, self.settings.cdn_discovery),
            _ => (1, self.settings.discovery),
        };
        let addrs = discover(
            self.runtime.as_ref(),
            self.clock.as_ref(),
            &net.published_service(),
            &net.name,
            min_count,
            policy,
        )
        .await;
        if addrs.is_empty() {
            return Ok(outcome.degrade(DegradedReason::NoAddresses));
        }
        if addrs.len() < min_count {
            warn!(
                network = %net.name,
                found = addrs.len(),
                wanted = min_count,
                "discovery timed out with a partial result"
            );
        }

        outcome.enter(State::Publishing);
        if let Err(e) = self.publish(&net, &addrs) {
            return Ok(outcome.degrade(DegradedReason::PublishFailed(e.to_string())));
        }
        outcome.addresses = addrs;
        if net.kind.is_scalable() {
            registry.set_size(name, size)?;
        }

        self.finish_with_reload(outcome, &net).await
    }

    /// Add one instance to `name`
    pub async fn scale_up(&self, registry: &mut TopologyRegistry, name: &str) -> Result<Outcome> {
        self.scale(registry, name, ScaleDirection::Up).await
    }

    /// Remove one instance from `name`
    pub async fn scale_down(
        &self,
        registry: &mut TopologyRegistry,
        name: &str,
    ) -> Result<Outcome> {
        self.scale(registry, name, ScaleDirection::Down).await
    }

    /// Move `name` one instance in `direction`, staying within `1..=MAX_AGENTS`
    pub async fn scale(
        &self,
        registry: &mut TopologyRegistry,
        name: &str,
        direction: ScaleDirection,
    ) -> Result<Outcome> {
        let net = registry.require(name)?;
        if !net.kind.is_scalable() {
            return Err(unsupported(net, "live scaling"));
        }
        let current = i64::from(net.size);
        let target = match direction {
            ScaleDirection::Up => current + 1,
            ScaleDirection::Down => current - 1,
        };
        let size = u32::try_from(target)
            .ok()
            .filter(|s| (1..=MAX_AGENTS).contains(s))
            .ok_or_else(|| out_of_range(target))?;

        info!(network = name, from = current, to = size, "live scaling");
        self.scale_to(registry, name, size).await
    }

    /// Rewrite the `$TTL` of `name`'s zone and reload, committing `ttl` once
    /// the zone is written
    pub async fn set_live_ttl(
        &self,
        registry: &mut TopologyRegistry,
        name: &str,
        ttl: u32,
    ) -> Result<Outcome> {
        let net = registry.require(name)?.clone();
        if !(1..=fluxlab_core::registry::MAX_TTL).contains(&ttl) {
            return Err(LabError::OutOfRange {
                field: "ttl",
                value: i64::from(ttl),
                min: 1,
                max: i64::from(fluxlab_core::registry::MAX_TTL),
            });
        }

        let mut outcome = Outcome::start(&net, net.size);
        outcome.enter(State::Publishing);
        let written = self.files.read_zone(&net.name).and_then(|zone| {
            // Healing from the initial zone would publish the placeholder A
            // record, so a live TTL change needs the deployed zone.
            let Some(mut zone) = zone else {
                warn!(network = %net.name, "zone file missing; ttl not changed");
                return Err(LabError::Integrity("zone file missing".to_string()));
            };
            if let Err(e) = zone.check_integrity() {
                warn!(network = %net.name, error = %e, "zone integrity");
            }
            if !zone.set_ttl_directive(ttl) {
                warn_missing_serial(&net.name);
            }
            self.files.write_zone(&net.name, &zone)
        });
        if let Err(e) = written {
            return Ok(outcome.degrade(DegradedReason::PublishFailed(e.to_string())));
        }
        registry.set_ttl(name, ttl)?;

        self.finish_with_reload(outcome, &net).await
    }

    /// Ask the DNS server of `name` to reload its zone
    pub async fn reload(&self, registry: &TopologyRegistry, name: &str) -> Result<Outcome> {
        let net = registry.require(name)?;
        let outcome = Outcome::start(net, net.size);
        self.finish_with_reload(outcome, net).await
    }

    /// Rediscover the proxy agents of flux network `name` and rewrite its
    /// agent list. An empty observation leaves the current list alone.
    pub async fn refresh(&self, registry: &TopologyRegistry, name: &str) -> Result<Outcome> {
        let net = registry.require(name)?;
        if net.kind != NetworkKind::Flux {
            return Err(LabError::KindMismatch {
                name: name.to_string(),
                expected: NetworkKind::Flux,
                actual: net.kind,
            });
        }

        let mut outcome = Outcome::start(net, net.size);
        outcome.enter(State::Discovering);
        let single_poll = DiscoveryPolicy {
            timeout: Duration::ZERO,
            ..self.settings.discovery
        };
        let addrs = discover(
            self.runtime.as_ref(),
            self.clock.as_ref(),
            &net.published_service(),
            &net.name,
            1,
            single_poll,
        )
        .await;
        if addrs.is_empty() {
            return Ok(outcome.degrade(DegradedReason::NoAddresses));
        }

        outcome.enter(State::Publishing);
        if let Err(e) = self.files.write_agents(&net.name, &addrs) {
            return Ok(outcome.degrade(DegradedReason::PublishFailed(e.to_string())));
        }
        outcome.addresses = addrs;
        self.finish_with_reload(outcome, net).await
    }

    async fn finish_with_reload(
        &self,
        mut outcome: Outcome,
        net: &NetworkDefinition,
    ) -> Result<Outcome> {
        outcome.enter(State::Reloading);
        if let Err(e) = self
            .runtime
            .reload_dns(&net.dns_service(), &self.settings.domain)
            .await
        {
            return Ok(outcome.degrade(DegradedReason::ReloadFailed(e.to_string())));
        }
        outcome.enter(State::Converged);
        info!(
            network = %net.name,
            addresses = outcome.addresses.len(),
            "network converged"
        );
        Ok(outcome)
    }

    fn publish(&self, net: &NetworkDefinition, addrs: &[Ipv4Addr]) -> Result<()> {
        match net.kind {
            NetworkKind::Flux => {
                self.files.write_agents(&net.name, addrs)?;
            }
            NetworkKind::Normal | NetworkKind::Lb => {
                let first = addrs.first().copied().ok_or_else(|| {
                    LabError::Integrity(format!("no address to publish for '{}'", net.name))
                })?;
                let mut zone = self.load_zone(net)?;
                if !zone.set_single_a(&net.name, first) {
                    warn_missing_serial(&net.name);
                }
                self.files.write_zone(&net.name, &zone)?;
            }
            NetworkKind::Cdn => {
                let mut zone = self.load_zone(net)?;
                if !zone.set_multi_a(&net.name, addrs) {
                    warn_missing_serial(&net.name);
                }
                self.files.write_zone(&net.name, &zone)?;
            }
        }
        Ok(())
    }

    /// Current zone of `net`, starting from the initial zone when the file
    /// is missing
    fn load_zone(&self, net: &NetworkDefinition) -> Result<Zone> {
        let zone = match self.files.read_zone(&net.name)? {
            Some(zone) => zone,
            None => {
                warn!(network = %net.name, "zone file missing; starting from the initial zone");
                self.initial_zone(net)
            }
        };
        if let Err(e) = zone.check_integrity() {
            warn!(network = %net.name, error = %e, "zone integrity");
        }
        Ok(zone)
    }

    fn initial_zone(&self, net: &NetworkDefinition) -> Zone {
        let serial = zone::initial_serial(chrono::Utc::now().date_naive());
        Zone::initial(net, &self.settings.domain, serial)
    }

    // ========================================================================
    // Fleet-wide operations
    // ========================================================================

    /// Write every zone, bring the fleet down and back up, then converge
    /// each network in name order.
    ///
    /// Pre-flight failures (file writes, missing or invalid descriptor,
    /// `up` failing) abort the deploy. Per-network failures do not.
    pub async fn deploy(
        &self,
        registry: &mut TopologyRegistry,
        descriptor: &dyn DescriptorSource,
    ) -> Result<DeployReport> {
        if registry.is_empty() {
            warn!("no networks registered; nothing to deploy");
            return Ok(DeployReport::default());
        }

        for net in registry.list() {
            self.files.write_zone(&net.name, &self.initial_zone(net))?;
            self.files.prepare_query_log(&net.name)?;
        }
        // The client container bind-mounts this file, so it has to exist
        // before `up`.
        self.files.write_resolver(&registry.render_resolver())?;

        let descriptor_path = descriptor.prepare(registry)?;
        self.runtime.validate().await?;

        info!(networks = registry.len(), "bringing the fleet down and up");
        if let Err(e) = self.runtime.down().await {
            warn!(error = %e, "teardown before deploy failed");
        }
        self.runtime.up().await?;
        self.files.write_resolver(&registry.render_resolver())?;

        let mut outcomes = Vec::with_capacity(registry.len());
        for name in registry.names() {
            let outcome = match self.converge(registry, &name).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let kind = registry
                        .get(&name)
                        .map_or(NetworkKind::Normal, |n| n.kind);
                    warn!(network = %name, error = %e, "network skipped");
                    Outcome::rejected(&name, kind, &e)
                }
            };
            outcomes.push(outcome);
        }

        Ok(DeployReport {
            descriptor: Some(descriptor_path),
            outcomes,
        })
    }

    /// Tear the fleet down and remove leftover project networks.
    ///
    /// Best effort: failures are logged and listed in the report. The
    /// catalog is not touched.
    pub async fn stop(&self) -> StopReport {
        let mut report = StopReport::default();

        match self.runtime.down().await {
            Ok(()) => report.fleet_down = true,
            Err(e) => {
                warn!(error = %e, "fleet teardown failed");
                report.warnings.push(e.to_string());
            }
        }

        match self.runtime.leftover_networks().await {
            Ok(names) if names.is_empty() => {}
            Ok(names) => match self.runtime.remove_networks(&names).await {
                Ok(()) => {
                    info!(networks = ?names, "removed leftover networks");
                    report.removed_networks = names;
                }
                Err(e) => {
                    warn!(error = %e, "removing leftover networks failed");
                    report.warnings.push(e.to_string());
                }
            },
            Err(e) => {
                warn!(error = %e, "listing networks failed");
                report.warnings.push(e.to_string());
            }
        }

        report
    }
}

fn out_of_range(value: i64) -> LabError {
    LabError::OutOfRange {
        field: "size",
        value,
        min: 1,
        max: i64::from(MAX_AGENTS),
    }
}

fn unsupported(net: &NetworkDefinition, operation: &'static str) -> LabError {
    LabError::UnsupportedOperation {
        name: net.name.clone(),
        kind: net.kind,
        operation,
    }
}

fn warn_missing_serial(network: &str) {
    warn!(network, "zone has no serial marker; the DNS server may not notice the change");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::descriptor::ComposeFile;
    use crate::runtime::fake::FakeRuntime;
    use std::fs;
    use tempfile::TempDir;

    struct Lab {
        _dir: TempDir,
        runtime: Arc<FakeRuntime>,
        clock: Arc<ManualClock>,
        reconciler: Reconciler,
    }

    fn lab() -> Lab {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let clock = Arc::new(ManualClock::new());
        let reconciler = Reconciler::new(
            runtime.clone(),
            LabFiles::new(dir.path()),
            ReconcileSettings::default(),
        )
        .with_clock(clock.clone());
        Lab {
            _dir: dir,
            runtime,
            clock,
            reconciler,
        }
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn zone_of(lab: &Lab, name: &str) -> Zone {
        lab.reconciler.files().read_zone(name).unwrap().unwrap()
    }

    fn seed_zone(lab: &Lab, registry: &TopologyRegistry, name: &str, serial: u64) {
        let net = registry.require(name).unwrap();
        lab.reconciler
            .files()
            .write_zone(name, &Zone::initial(net, "sim.local", serial))
            .unwrap();
    }

    #[tokio::test]
    async fn test_flux_partial_discovery_publishes_what_was_found() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("fluxy", NetworkKind::Flux).unwrap();
        registry.set_size("fluxy", 2).unwrap();
        lab.reconciler
            .files()
            .write_agents("fluxy", &[ip("172.60.0.9"), ip("172.60.0.8")])
            .unwrap();
        lab.runtime.script(
            "proxy_agent_fluxy",
            vec![vec!["172.60.0.4", "172.60.0.2", "172.60.0.3"]],
        );

        let outcome = lab.reconciler.scale_to(&mut registry, "fluxy", 5).await.unwrap();

        assert!(outcome.is_converged());
        assert!(outcome.is_partial());
        let agents = lab.reconciler.files().read_agents("fluxy").unwrap();
        assert_eq!(
            agents,
            vec![ip("172.60.0.2"), ip("172.60.0.3"), ip("172.60.0.4")]
        );
        assert_eq!(registry.require("fluxy").unwrap().size, 5);
        assert_eq!(
            lab.runtime.calls().first().map(String::as_str),
            Some("scale proxy_agent_fluxy=5")
        );
        assert_eq!(lab.runtime.count("reload dns_server_fluxy sim.local"), 1);
    }

    #[tokio::test]
    async fn test_cdn_publishes_sorted_multi_a() {
        let lab = lab();
        let mut registry = TopologyRegistry::with_base(61);
        registry.add("edge1", NetworkKind::Cdn).unwrap();
        registry.set_size("edge1", 3).unwrap();
        seed_zone(&lab, &registry, "edge1", 2_024_060_101);
        lab.runtime.script(
            "cdn_edge_edge1",
            vec![vec!["172.61.0.3", "172.61.0.2", "172.61.0.4"]],
        );

        let outcome = lab.reconciler.converge(&mut registry, "edge1").await.unwrap();

        assert!(outcome.is_converged());
        assert!(!outcome.is_partial());
        let text = fs::read_to_string(lab.reconciler.files().zone_path("edge1")).unwrap();
        let records: Vec<&str> = text.lines().filter(|l| l.starts_with("edge1")).collect();
        assert_eq!(
            records,
            vec![
                "edge1  IN A 172.61.0.2",
                "edge1  IN A 172.61.0.3",
                "edge1  IN A 172.61.0.4",
            ]
        );
        assert_eq!(Zone::parse(&text).serial(), Some(2_024_060_102));
    }

    #[tokio::test]
    async fn test_cdn_waits_for_every_edge() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("edge1", NetworkKind::Cdn).unwrap();
        lab.runtime.script(
            "cdn_edge_edge1",
            vec![vec!["172.60.0.2"], vec!["172.60.0.2", "172.60.0.3", "172.60.0.4"]],
        );

        let outcome = lab.reconciler.converge(&mut registry, "edge1").await.unwrap();

        assert_eq!(outcome.addresses.len(), 3);
        assert_eq!(lab.runtime.count("addresses cdn_edge_edge1@edge1"), 2);
    }

    #[tokio::test]
    async fn test_scale_failure_commits_nothing() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("lbn", NetworkKind::Lb).unwrap();
        lab.runtime.fail("scale worker_lbn");

        let outcome = lab.reconciler.scale_up(&mut registry, "lbn").await.unwrap();

        assert!(matches!(
            outcome.degraded(),
            Some(DegradedReason::ScaleFailed(_))
        ));
        assert_eq!(registry.require("lbn").unwrap().size, 1);
        assert_eq!(lab.runtime.count("addresses"), 0);
        assert_eq!(lab.runtime.count("reload"), 0);
        assert!(lab.reconciler.files().read_zone("lbn").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_discovery_degrades_without_publishing() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("fluxy", NetworkKind::Flux).unwrap();

        let outcome = lab.reconciler.scale_up(&mut registry, "fluxy").await.unwrap();

        assert_eq!(outcome.degraded(), Some(&DegradedReason::NoAddresses));
        assert_eq!(registry.require("fluxy").unwrap().size, 1);
        assert!(!lab.reconciler.files().agents_path("fluxy").exists());
        assert_eq!(lab.clock.elapsed(), Duration::from_secs(60));
        assert_eq!(lab.runtime.count("scale"), 1);
        assert_eq!(lab.runtime.count("reload"), 0);
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_published_zone() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("edge1", NetworkKind::Cdn).unwrap();
        seed_zone(&lab, &registry, "edge1", 10);
        lab.runtime.script(
            "cdn_edge_edge1",
            vec![vec!["172.60.0.2", "172.60.0.3", "172.60.0.4", "172.60.0.5"]],
        );
        lab.runtime.fail("reload");

        let outcome = lab.reconciler.scale_up(&mut registry, "edge1").await.unwrap();

        assert!(matches!(
            outcome.degraded(),
            Some(DegradedReason::ReloadFailed(_))
        ));
        assert_eq!(registry.require("edge1").unwrap().size, 4);
        let zone = zone_of(&lab, "edge1");
        assert_eq!(zone.a_records("edge1").len(), 4);
        assert_eq!(zone.serial(), Some(11));
    }

    #[tokio::test]
    async fn test_lb_publishes_load_balancer_address() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("lbn", NetworkKind::Lb).unwrap();
        seed_zone(&lab, &registry, "lbn", 1);
        lab.runtime.script("load_balancer_lbn", vec![vec!["172.60.0.80"]]);

        let outcome = lab.reconciler.scale_up(&mut registry, "lbn").await.unwrap();

        assert!(outcome.is_converged());
        assert_eq!(lab.runtime.calls()[0], "scale worker_lbn=2");
        assert_eq!(lab.runtime.count("addresses load_balancer_lbn@lbn"), 1);
        assert_eq!(zone_of(&lab, "lbn").a_records("lbn"), vec![ip("172.60.0.80")]);
        assert_eq!(registry.require("lbn").unwrap().size, 2);
    }

    #[tokio::test]
    async fn test_normal_uses_lowest_address_and_heals_missing_zone() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("plain", NetworkKind::Normal).unwrap();
        lab.runtime.script("origin_server_plain", vec![vec!["172.60.0.9", "172.60.0.3"]]);

        let outcome = lab.reconciler.converge(&mut registry, "plain").await.unwrap();

        assert!(outcome.is_converged());
        let zone = zone_of(&lab, "plain");
        assert_eq!(zone.a_records("plain"), vec![ip("172.60.0.3")]);
        assert_eq!(zone.a_records("ns"), vec![ip("172.60.0.53")]);
        assert!(zone.check_integrity().is_ok());
    }

    #[tokio::test]
    async fn test_live_scaling_rejections() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("plain", NetworkKind::Normal).unwrap();
        registry.add("fluxy", NetworkKind::Flux).unwrap();
        registry.add("edge1", NetworkKind::Cdn).unwrap();
        registry.set_size("edge1", MAX_AGENTS).unwrap();

        let err = lab.reconciler.scale_up(&mut registry, "plain").await.unwrap_err();
        assert!(matches!(err, LabError::UnsupportedOperation { .. }));

        let err = lab.reconciler.scale_down(&mut registry, "fluxy").await.unwrap_err();
        assert!(matches!(err, LabError::OutOfRange { value: 0, .. }));

        let err = lab.reconciler.scale_up(&mut registry, "edge1").await.unwrap_err();
        assert!(matches!(err, LabError::OutOfRange { value: 11, .. }));

        let err = lab.reconciler.scale_up(&mut registry, "ghost").await.unwrap_err();
        assert!(matches!(err, LabError::UnknownNetwork { .. }));

        assert!(lab.runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_live_ttl() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("fluxy", NetworkKind::Flux).unwrap();
        seed_zone(&lab, &registry, "fluxy", 100);

        let outcome = lab
            .reconciler
            .set_live_ttl(&mut registry, "fluxy", 5)
            .await
            .unwrap();

        assert!(outcome.is_converged());
        let zone = zone_of(&lab, "fluxy");
        assert_eq!(zone.ttl(), Some(5));
        assert_eq!(zone.serial(), Some(101));
        assert_eq!(registry.require("fluxy").unwrap().ttl, 5);
        assert_eq!(lab.runtime.calls(), vec!["reload dns_server_fluxy sim.local"]);

        let err = lab
            .reconciler
            .set_live_ttl(&mut registry, "fluxy", 0)
            .await
            .unwrap_err();
        assert!(err.is_user_input());
        assert_eq!(registry.require("fluxy").unwrap().ttl, 5);
    }

    #[tokio::test]
    async fn test_live_ttl_needs_deployed_zone() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("edge1", NetworkKind::Cdn).unwrap();

        let outcome = lab
            .reconciler
            .set_live_ttl(&mut registry, "edge1", 30)
            .await
            .unwrap();

        assert!(matches!(
            outcome.degraded(),
            Some(DegradedReason::PublishFailed(msg)) if msg.contains("zone file missing")
        ));
        assert_eq!(registry.require("edge1").unwrap().ttl, 60);
        assert!(lab.reconciler.files().read_zone("edge1").unwrap().is_none());
        assert_eq!(lab.runtime.count("reload"), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_commits_nothing() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("edge1", NetworkKind::Cdn).unwrap();
        // A regular file where the zone directory should be
        fs::write(lab.reconciler.files().dns_config_dir(), "").unwrap();
        lab.runtime.script(
            "cdn_edge_edge1",
            vec![vec!["172.60.0.2", "172.60.0.3", "172.60.0.4", "172.60.0.5"]],
        );

        let outcome = lab.reconciler.scale_up(&mut registry, "edge1").await.unwrap();
        assert!(matches!(
            outcome.degraded(),
            Some(DegradedReason::PublishFailed(_))
        ));
        assert!(outcome.addresses.is_empty());
        assert_eq!(registry.require("edge1").unwrap().size, 3);

        let outcome = lab
            .reconciler
            .set_live_ttl(&mut registry, "edge1", 30)
            .await
            .unwrap();
        assert!(matches!(
            outcome.degraded(),
            Some(DegradedReason::PublishFailed(_))
        ));
        assert_eq!(registry.require("edge1").unwrap().ttl, 60);

        assert_eq!(lab.runtime.count("scale cdn_edge_edge1=4"), 1);
        assert_eq!(lab.runtime.count("reload"), 0);
    }

    #[tokio::test]
    async fn test_refresh() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("fluxy", NetworkKind::Flux).unwrap();
        registry.add("plain", NetworkKind::Normal).unwrap();

        let err = lab.reconciler.refresh(&registry, "plain").await.unwrap_err();
        assert!(matches!(err, LabError::KindMismatch { .. }));

        lab.reconciler
            .files()
            .write_agents("fluxy", &[ip("172.60.0.7")])
            .unwrap();
        let outcome = lab.reconciler.refresh(&registry, "fluxy").await.unwrap();
        assert_eq!(outcome.degraded(), Some(&DegradedReason::NoAddresses));
        assert_eq!(
            lab.reconciler.files().read_agents("fluxy").unwrap(),
            vec![ip("172.60.0.7")]
        );
        assert_eq!(lab.clock.sleeps(), 0);

        lab.runtime.script("proxy_agent_fluxy", vec![vec!["172.60.0.12", "172.60.0.11"]]);
        let outcome = lab.reconciler.refresh(&registry, "fluxy").await.unwrap();
        assert!(outcome.is_converged());
        assert_eq!(
            lab.reconciler.files().read_agents("fluxy").unwrap(),
            vec![ip("172.60.0.11"), ip("172.60.0.12")]
        );
        assert_eq!(lab.runtime.count("reload"), 1);
    }

    #[tokio::test]
    async fn test_reload() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("plain", NetworkKind::Normal).unwrap();

        let outcome = lab.reconciler.reload(&registry, "plain").await.unwrap();
        assert!(outcome.is_converged());

        lab.runtime.fail("reload");
        let outcome = lab.reconciler.reload(&registry, "plain").await.unwrap();
        assert!(matches!(
            outcome.degraded(),
            Some(DegradedReason::ReloadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_deploy_empty_catalog_does_nothing() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        let descriptor = ComposeFile::new("/nonexistent/docker-compose.yml");

        let report = lab.reconciler.deploy(&mut registry, &descriptor).await.unwrap();

        assert!(report.outcomes.is_empty());
        assert!(report.descriptor.is_none());
        assert!(lab.runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_missing_descriptor_aborts_before_teardown() {
        let lab = lab();
        let mut registry = TopologyRegistry::new();
        registry.add("plain", NetworkKind::Normal).unwrap();
        let descriptor = ComposeFile::new(lab.reconciler.files().root().join("missing.yml"));

        let err = lab
            .reconciler
            .deploy(&mut registry, &descriptor)
            .await
            .unwrap_err();

        assert!(err.is_orchestration());
        assert!(lab.runtime.calls().is_empty());
        assert!(lab.reconciler.files().zone_path("plain").is_file());
        assert!(lab.reconciler.files().resolver_path().is_file());
    }

    #[tokio::test]
    async fn test_deploy_continues_past_failed_network() {
        let lab = lab();
        let files = lab.reconciler.files();
        let compose = files.root().join("docker-compose.yml");
        fs::write(&compose, "services: {}\n").unwrap();
        fs::create_dir_all(files.query_log_path("bravo")).unwrap();

        let mut registry = TopologyRegistry::new();
        registry.add("charlie", NetworkKind::Cdn).unwrap();
        registry.add("alpha", NetworkKind::Lb).unwrap();
        registry.add("bravo", NetworkKind::Flux).unwrap();
        lab.runtime.fail("scale worker_alpha");
        lab.runtime.script("proxy_agent_bravo", vec![vec!["172.62.0.4"]]);
        lab.runtime.script(
            "cdn_edge_charlie",
            vec![vec!["172.60.0.2", "172.60.0.3", "172.60.0.4"]],
        );

        let report = lab
            .reconciler
            .deploy(&mut registry, &ComposeFile::new(&compose))
            .await
            .unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.network.as_str()).collect();
        assert_eq!(names, vec!["alpha", "bravo", "charlie"]);
        assert!(matches!(
            report.outcomes[0].degraded(),
            Some(DegradedReason::ScaleFailed(_))
        ));
        assert!(report.outcomes[1].is_converged());
        assert!(report.outcomes[2].is_converged());
        assert_eq!(report.converged(), 2);

        let calls = lab.runtime.calls();
        assert_eq!(&calls[..3], &["validate", "down", "up"]);
        assert!(files.query_log_path("bravo").is_file());
        assert!(files.query_log_path("alpha").is_file());

        let resolv = fs::read_to_string(files.resolver_path()).unwrap();
        assert!(resolv.contains("nameserver 172.60.0.53\nnameserver 172.61.0.53\nnameserver 172.62.0.53\n"));
        assert_eq!(
            files.read_agents("bravo").unwrap(),
            vec![ip("172.62.0.4")]
        );
        assert_eq!(zone_of(&lab, "charlie").a_records("charlie").len(), 3);
    }

    #[tokio::test]
    async fn test_stop_removes_leftovers_and_reports_failures() {
        let lab = lab();
        lab.runtime.set_leftovers(&["multi-flux-sim_a_net", "multi-flux-sim_default"]);

        let report = lab.reconciler.stop().await;
        assert!(report.fleet_down);
        assert_eq!(report.removed_networks.len(), 2);
        assert!(report.warnings.is_empty());
        assert_eq!(
            lab.runtime.calls().last().map(String::as_str),
            Some("networks rm multi-flux-sim_a_net multi-flux-sim_default")
        );

        lab.runtime.fail("networks rm");
        lab.runtime.fail("down");
        let report = lab.reconciler.stop().await;
        assert!(!report.fleet_down);
        assert!(report.removed_networks.is_empty());
        assert_eq!(report.warnings.len(), 2);
    }
}
