//! Container runtime contract and the docker compose driver.
//!
//! The reconciler only needs a handful of verbs from the orchestration layer:
//! scale a service, list the addresses a service holds inside one topology
//! network, ask a DNS server to reload, and bring the whole fleet up or down.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{RuntimeError, RuntimeResult};

/// Orchestration verbs the reconciler drives
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Run `service` with exactly `replicas` instances
    async fn scale(&self, service: &str, replicas: u32) -> RuntimeResult<()>;

    /// Live IPv4 addresses `service` holds inside topology `network`
    async fn service_addresses(&self, service: &str, network: &str)
        -> RuntimeResult<Vec<Ipv4Addr>>;

    /// Ask the DNS server `service` to reload the zone for `domain`
    async fn reload_dns(&self, service: &str, domain: &str) -> RuntimeResult<()>;

    /// Check that the fleet descriptor is well formed
    async fn validate(&self) -> RuntimeResult<()>;

    /// Tear down the fleet, volumes and orphans included
    async fn down(&self) -> RuntimeResult<()>;

    /// Build and start the whole fleet
    async fn up(&self) -> RuntimeResult<()>;

    /// Runtime networks that belong to this project
    async fn leftover_networks(&self) -> RuntimeResult<Vec<String>>;

    /// Delete runtime networks by name
    async fn remove_networks(&self, names: &[String]) -> RuntimeResult<()>;
}

/// `docker compose` driver for one project
#[derive(Debug, Clone)]
pub struct ComposeRuntime {
    docker: String,
    project: String,
    compose_file: PathBuf,
    work_dir: PathBuf,
}

impl ComposeRuntime {
    /// Create a driver for `project` described by `compose_file`.
    ///
    /// Commands run with `work_dir` as their working directory so relative
    /// bind mounts in the compose file resolve against the lab directory.
    pub fn new(
        project: impl Into<String>,
        compose_file: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            docker: "docker".to_string(),
            project: project.into(),
            compose_file: compose_file.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Use another docker-compatible binary
    #[must_use]
    pub fn with_docker_binary(mut self, docker: impl Into<String>) -> Self {
        self.docker = docker.into();
        self
    }

    /// Project name passed as `-p`
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Runtime network name of topology `network`
    pub fn project_network(&self, network: &str) -> String {
        format!("{}_{network}_net", self.project)
    }

    fn compose_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = vec![
            "compose".to_string(),
            "-p".to_string(),
            self.project.clone(),
            "-f".to_string(),
            self.compose_file.display().to_string(),
        ];
        full.extend(args.iter().map(|a| (*a).to_string()));
        full
    }

    async fn compose(&self, args: &[&str]) -> RuntimeResult<String> {
        self.docker_cmd(self.compose_args(args)).await
    }

    async fn docker_cmd(&self, args: Vec<String>) -> RuntimeResult<String> {
        let command = format!("{} {}", self.docker, args.join(" "));
        debug!(command = %command, "running container runtime command");

        let output = Command::new(&self.docker)
            .args(&args)
            .current_dir(&self.work_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ContainerRuntime for ComposeRuntime {
    #[instrument(skip(self), fields(project = %self.project))]
    async fn scale(&self, service: &str, replicas: u32) -> RuntimeResult<()> {
        let scale = format!("{service}={replicas}");
        self.compose(&["up", "-d", "--scale", &scale, service])
            .await
            .map(drop)
    }

    #[instrument(skip(self), fields(project = %self.project))]
    async fn service_addresses(
        &self,
        service: &str,
        network: &str,
    ) -> RuntimeResult<Vec<Ipv4Addr>> {
        let ids = self.compose(&["ps", "-q", service]).await?;
        let ids: Vec<String> = ids
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .NetworkSettings.Networks}}".to_string(),
        ];
        args.extend(ids);
        let output = self.docker_cmd(args).await?;
        parse_network_addresses(&output, &self.project_network(network))
    }

    #[instrument(skip(self), fields(project = %self.project))]
    async fn reload_dns(&self, service: &str, domain: &str) -> RuntimeResult<()> {
        let script = format!("rndc reload {domain} || pkill -HUP named");
        self.compose(&["exec", "-T", service, "sh", "-lc", &script])
            .await
            .map(drop)
    }

    async fn validate(&self) -> RuntimeResult<()> {
        self.compose(&["config", "-q"]).await.map(drop)
    }

    async fn down(&self) -> RuntimeResult<()> {
        self.compose(&["down", "-v", "--remove-orphans"])
            .await
            .map(drop)
    }

    async fn up(&self) -> RuntimeResult<()> {
        self.compose(&["up", "-d", "--build"]).await.map(drop)
    }

    async fn leftover_networks(&self) -> RuntimeResult<Vec<String>> {
        let output = self
            .docker_cmd(vec![
                "network".to_string(),
                "ls".to_string(),
                "--format".to_string(),
                "{{.Name}}".to_string(),
            ])
            .await?;
        let prefix = format!("{}_", self.project);
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|n| n.starts_with(&prefix))
            .map(String::from)
            .collect())
    }

    async fn remove_networks(&self, names: &[String]) -> RuntimeResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["network".to_string(), "rm".to_string()];
        args.extend(names.iter().cloned());
        self.docker_cmd(args).await.map(drop)
    }
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Pull the address each container holds on `network` out of
/// `docker inspect --format '{{json .NetworkSettings.Networks}}'` output,
/// one JSON object per line.
fn parse_network_addresses(output: &str, network: &str) -> RuntimeResult<Vec<Ipv4Addr>> {
    let mut addrs = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let networks: HashMap<String, Endpoint> = serde_json::from_str(line)
            .map_err(|e| RuntimeError::Parse(format!("inspect output: {e}")))?;
        let Some(endpoint) = networks.get(network) else {
            continue;
        };
        if endpoint.ip_address.is_empty() {
            continue;
        }
        let addr = endpoint.ip_address.parse().map_err(|_| {
            RuntimeError::Parse(format!("not an IPv4 address: {}", endpoint.ip_address))
        })?;
        addrs.push(addr);
    }
    Ok(addrs)
}
