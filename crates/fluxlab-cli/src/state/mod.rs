//! Lab state persistence.
//!
//! Every invocation is a fresh process, so the catalog (definitions, subnet
//! allocation counter and client resolver settings) is kept as JSON in the
//! lab directory between runs.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use fluxlab_core::TopologyRegistry;

/// State file name inside the work dir.
pub const STATE_FILE: &str = "fluxlab_state.json";

/// State file location for `work_dir`.
pub fn path(work_dir: &Path) -> PathBuf {
    work_dir.join(STATE_FILE)
}

/// Load the catalog, or start an empty one allocating from `base_octet`.
pub fn load(work_dir: &Path, base_octet: u8) -> Result<TopologyRegistry> {
    let path = path(work_dir);
    if !path.exists() {
        return Ok(TopologyRegistry::with_base(base_octet));
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let registry = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;

    Ok(registry)
}

/// Save the catalog, replacing the previous state atomically.
pub fn save(work_dir: &Path, registry: &TopologyRegistry) -> Result<()> {
    std::fs::create_dir_all(work_dir)?;
    let path = path(work_dir);
    let tmp = path.with_extension("json.tmp");

    std::fs::write(&tmp, serde_json::to_string_pretty(registry)?)?;
    std::fs::rename(&tmp, &path).with_context(|| format!("writing {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxlab_core::NetworkKind;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_state_uses_base() {
        let dir = TempDir::new().unwrap();
        let mut registry = load(dir.path(), 70).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.add("a", NetworkKind::Normal).unwrap().subnet_octet, 70);
    }

    #[test]
    fn test_counter_survives_reload() {
        let dir = TempDir::new().unwrap();
        let mut registry = load(dir.path(), 60).unwrap();
        registry.add("a", NetworkKind::Flux).unwrap();
        registry.remove("a").unwrap();
        save(dir.path(), &registry).unwrap();

        let mut registry = load(dir.path(), 60).unwrap();
        assert_eq!(registry.add("b", NetworkKind::Cdn).unwrap().subnet_octet, 61);
        assert!(!dir.path().join("fluxlab_state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(path(dir.path()), "{ not json").unwrap();
        let err = load(dir.path(), 60).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }
}
