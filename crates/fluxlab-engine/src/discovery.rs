//! Workload discovery: bounded polling for live service addresses.

use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::runtime::ContainerRuntime;

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    /// Give up after this long
    pub timeout: Duration,
    /// Fixed wait between polls
    pub poll_interval: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Poll `runtime` until `service` holds at least `min_count` addresses in
/// `network`, or `policy.timeout` elapses.
///
/// Never fails: on timeout the last observation is returned, possibly empty.
/// A runtime error during a poll counts as an empty observation. Addresses
/// come back deduplicated and sorted ascending.
pub async fn discover(
    runtime: &dyn ContainerRuntime,
    clock: &dyn Clock,
    service: &str,
    network: &str,
    min_count: usize,
    policy: DiscoveryPolicy,
) -> Vec<Ipv4Addr> {
    let deadline = clock.now() + policy.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut found = match runtime.service_addresses(service, network).await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!(service, network, attempt, error = %e, "address lookup failed");
                Vec::new()
            }
        };
        found.sort_unstable();
        found.dedup();

        debug!(service, network, attempt, found = found.len(), min_count, "discovery poll");
        if found.len() >= min_count {
            return found;
        }
        if clock.now() >= deadline {
            debug!(service, network, attempt, "discovery timed out");
            return found;
        }
        clock.sleep(policy.poll_interval).await;
    }
}
