//! Configuration management.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fluxlab_core::{BASE_SUBNET_START, DEFAULT_DOMAIN};
use fluxlab_engine::{DiscoveryPolicy, ReconcileSettings};

use crate::output::OutputFormat;

/// Lab configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabConfig {
    /// Compose project name (`docker compose -p`).
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Compose file, relative to the work dir unless absolute.
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,

    /// Lab directory holding zones, logs, state and the compose file.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Zone every network is published under.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// First subnet octet of a fresh catalog.
    #[serde(default = "default_base_subnet_octet")]
    pub base_subnet_octet: u8,

    /// Default output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,

    /// Address discovery bounds.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Discovery polling bounds in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Timeout for normal, flux and lb networks.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for cdn networks.
    #[serde(default = "default_cdn_timeout_secs")]
    pub cdn_timeout_secs: u64,

    /// Fixed wait between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_project_name() -> String {
    "multi-flux-sim".to_string()
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

const fn default_base_subnet_octet() -> u8 {
    BASE_SUBNET_START
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_cdn_timeout_secs() -> u64 {
    90
}

const fn default_poll_interval_secs() -> u64 {
    2
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            compose_file: default_compose_file(),
            work_dir: default_work_dir(),
            domain: default_domain(),
            base_subnet_octet: default_base_subnet_octet(),
            output_format: None,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cdn_timeout_secs: default_cdn_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Keys accepted by `fluxlab config set`.
pub const KEYS: &[(&str, &str)] = &[
    ("project_name", "Compose project name"),
    ("compose_file", "Compose file (relative to work_dir)"),
    ("work_dir", "Lab directory"),
    ("domain", "Zone domain"),
    ("base_subnet_octet", "First subnet octet of a fresh catalog"),
    ("discovery.timeout_secs", "Discovery timeout for normal/flux/lb"),
    ("discovery.cdn_timeout_secs", "Discovery timeout for cdn"),
    ("discovery.poll_interval_secs", "Wait between discovery polls"),
    ("output_format", "Default output format (pretty/json/csv/yaml)"),
];

impl LabConfig {
    /// Default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "fluxlab", "fluxlab")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Set `key` from its textual form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "project_name" => self.project_name = non_empty(key, value)?,
            "compose_file" => self.compose_file = PathBuf::from(non_empty(key, value)?),
            "work_dir" => self.work_dir = PathBuf::from(non_empty(key, value)?),
            "domain" => self.domain = non_empty(key, value)?.trim_end_matches('.').to_string(),
            "base_subnet_octet" => self.base_subnet_octet = parse_num(key, value)?,
            "discovery.timeout_secs" => self.discovery.timeout_secs = parse_num(key, value)?,
            "discovery.cdn_timeout_secs" => {
                self.discovery.cdn_timeout_secs = parse_num(key, value)?;
            }
            "discovery.poll_interval_secs" => {
                self.discovery.poll_interval_secs = parse_num(key, value)?;
            }
            "output_format" | "output" => self.output_format = Some(value.parse()?),
            _ => {
                let known: Vec<String> = KEYS
                    .iter()
                    .map(|(k, desc)| format!("  {k:<30} - {desc}"))
                    .collect();
                anyhow::bail!(
                    "Unknown config key: {key}\n\nAvailable keys:\n{}",
                    known.join("\n")
                );
            }
        }
        Ok(())
    }

    /// Compose file resolved against `work_dir`.
    pub fn compose_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(&self.compose_file)
    }

    /// Reconciler settings derived from this config.
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        let poll_interval = Duration::from_secs(self.discovery.poll_interval_secs);
        ReconcileSettings {
            domain: self.domain.clone(),
            discovery: DiscoveryPolicy {
                timeout: Duration::from_secs(self.discovery.timeout_secs),
                poll_interval,
            },
            cdn_discovery: DiscoveryPolicy {
                timeout: Duration::from_secs(self.discovery.cdn_timeout_secs),
                poll_interval,
            },
        }
    }
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("{key} must not be empty");
    }
    Ok(value.to_string())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} expects a non-negative number, got '{value}'"))
}
