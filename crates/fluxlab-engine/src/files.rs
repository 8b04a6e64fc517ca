//! On-disk layout of a lab directory.
//!
//! ```text
//! <root>/dns_config/db.<name>.zone
//! <root>/dns_config/flux_agents_<name>.txt
//! <root>/dns_config/resolv.dns_client.conf
//! <root>/monitoring/registry.json
//! <root>/bind_logs/<name>/query.log
//! ```
//!
//! Files that containers bind-mount individually are rewritten in place so
//! the mount keeps pointing at the same inode.

use std::fs;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use fluxlab_core::{Result, Zone};

/// Paths and file operations rooted at a lab working directory
#[derive(Debug, Clone)]
pub struct LabFiles {
    root: PathBuf,
}

impl LabFiles {
    /// Lab rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lab working directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding zones, agent lists and the client resolver
    pub fn dns_config_dir(&self) -> PathBuf {
        self.root.join("dns_config")
    }

    /// Zone file of network `name`
    pub fn zone_path(&self, name: &str) -> PathBuf {
        self.dns_config_dir().join(format!("db.{name}.zone"))
    }

    /// Agent list of flux network `name`
    pub fn agents_path(&self, name: &str) -> PathBuf {
        self.dns_config_dir().join(format!("flux_agents_{name}.txt"))
    }

    /// Resolver file of the test client
    pub fn resolver_path(&self) -> PathBuf {
        self.dns_config_dir().join("resolv.dns_client.conf")
    }

    /// Monitoring snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join("monitoring").join("registry.json")
    }

    /// Query log the DNS server of `name` appends to
    pub fn query_log_path(&self, name: &str) -> PathBuf {
        self.root.join("bind_logs").join(name).join("query.log")
    }

    /// Read and parse the zone of `name`; `None` if the file does not exist
    pub fn read_zone(&self, name: &str) -> Result<Option<Zone>> {
        match fs::read_to_string(self.zone_path(name)) {
            Ok(text) => Ok(Some(Zone::parse(&text))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the zone of `name`
    pub fn write_zone(&self, name: &str, zone: &Zone) -> Result<PathBuf> {
        let path = self.zone_path(name);
        write_regular_file(&path, &zone.to_string())?;
        debug!(network = name, path = %path.display(), "wrote zone");
        Ok(path)
    }

    /// Write the agent list of `name`: one address per line, nothing else
    pub fn write_agents(&self, name: &str, addrs: &[Ipv4Addr]) -> Result<PathBuf> {
        let path = self.agents_path(name);
        let body: String = addrs.iter().map(|a| format!("{a}\n")).collect();
        write_regular_file(&path, &body)?;
        debug!(network = name, count = addrs.len(), "wrote agent list");
        Ok(path)
    }

    /// Read back the agent list of `name`, empty if absent
    pub fn read_agents(&self, name: &str) -> Result<Vec<Ipv4Addr>> {
        match fs::read_to_string(self.agents_path(name)) {
            Ok(text) => Ok(text
                .lines()
                .filter_map(|l| l.trim().parse().ok())
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the client resolver file
    pub fn write_resolver(&self, text: &str) -> Result<PathBuf> {
        let path = self.resolver_path();
        write_regular_file(&path, text)?;
        Ok(path)
    }

    /// Make sure the query log of `name` exists as a regular file, keeping
    /// any existing content
    pub fn prepare_query_log(&self, name: &str) -> Result<PathBuf> {
        let path = self.query_log_path(name);
        ensure_regular_file(&path)?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(path)
    }
}

/// Prepare `path` to be written as a regular file.
///
/// Creates missing parent directories. A directory sitting at `path` (left
/// behind by a bind mount whose source did not exist) is moved aside to
/// `<path>.backup_<unix seconds>`; the backup path is returned.
pub fn ensure_regular_file(path: &Path) -> Result<Option<PathBuf>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if !path.is_dir() {
        return Ok(None);
    }

    let mut backup = PathBuf::from(format!(
        "{}.backup_{}",
        path.display(),
        chrono::Utc::now().timestamp()
    ));
    let mut n = 1;
    while backup.exists() {
        backup = PathBuf::from(format!(
            "{}.backup_{}_{n}",
            path.display(),
            chrono::Utc::now().timestamp()
        ));
        n += 1;
    }
    fs::rename(path, &backup)?;
    warn!(
        path = %path.display(),
        backup = %backup.display(),
        "directory found where a file was expected; moved it aside"
    );
    Ok(Some(backup))
}

fn write_regular_file(path: &Path, contents: &str) -> Result<()> {
    ensure_regular_file(path)?;
    fs::write(path, contents)?;
    Ok(())
}
