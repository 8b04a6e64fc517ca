//! End-to-end tests of the catalog commands.
//!
//! Nothing here needs a container runtime: every command used either only
//! touches the catalog, stops before talking to docker, or treats docker
//! failures as warnings.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn fluxlab(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fluxlab").unwrap();
    cmd.env_remove("FLUXLAB_CONFIG")
        .env_remove("FLUXLAB_WORK_DIR")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--work-dir")
        .arg(dir)
        .arg("--no-color");
    cmd
}

#[test]
fn add_then_status_shows_allocated_subnet() {
    let dir = TempDir::new().unwrap();

    fluxlab(dir.path())
        .args(["add", "flux", "fluxy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("172.60.0.0/24"));

    fluxlab(dir.path())
        .args(["add", "cdn", "edge1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("172.61.0.53"));

    fluxlab(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("fluxy"))
        .stdout(predicate::str::contains("edge1"))
        .stdout(predicate::str::contains("dig @172.61.0.53 edge1.sim.local +short"));

    assert!(dir.path().join("fluxlab_state.json").is_file());
    assert!(dir.path().join("monitoring/registry.json").is_file());
}

#[test]
fn list_is_sorted_by_name() {
    let dir = TempDir::new().unwrap();
    for (kind, name) in [("normal", "zeta"), ("lb", "alpha")] {
        fluxlab(dir.path()).args(["add", kind, name]).assert().success();
    }

    fluxlab(dir.path())
        .arg("ls")
        .assert()
        .success()
        .stdout("alpha\nzeta\n");
}

#[test]
fn duplicate_add_is_rejected() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "normal", "web"]).assert().success();

    fluxlab(dir.path())
        .args(["add", "flux", "web"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn remove_unknown_network_changes_nothing() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "normal", "web"]).assert().success();

    let snapshot = dir.path().join("monitoring/registry.json");
    let before = std::fs::read_to_string(&snapshot).unwrap();

    fluxlab(dir.path())
        .args(["remove", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown network 'ghost'"));

    assert_eq!(std::fs::read_to_string(&snapshot).unwrap(), before);
}

#[test]
fn remove_drops_network() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "normal", "web"]).assert().success();

    fluxlab(dir.path())
        .args(["rm", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed normal network"));

    fluxlab(dir.path()).arg("list").assert().success().stdout("");
}

#[test]
fn set_size_out_of_range_fails() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "flux", "fluxy"]).assert().success();

    fluxlab(dir.path())
        .args(["set", "size", "fluxy", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("size must be in 1..=10"));

    fluxlab(dir.path())
        .args(["set", "size", "fluxy", "4"])
        .assert()
        .success();

    fluxlab(dir.path())
        .args(["-o", "json", "status", "fluxy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"size\": 4"));
}

#[test]
fn json_status_is_a_snapshot() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "lb", "lbn"]).assert().success();

    let output = fluxlab(dir.path())
        .args(["status", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["networks"]["lbn"]["kind"], "lb");
    assert_eq!(value["networks"]["lbn"]["dns_ip"], "172.60.0.53");
    assert_eq!(value["networks"]["lbn"]["fqdn"], "lbn.sim.local");
}

#[test]
fn client_order_must_name_known_networks() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "normal", "web"]).assert().success();

    fluxlab(dir.path())
        .args(["client", "order", "web,ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn client_show_renders_resolver() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "normal", "web"]).assert().success();
    fluxlab(dir.path()).args(["add", "flux", "fluxy"]).assert().success();

    fluxlab(dir.path())
        .args(["client", "order", "fluxy,web"])
        .assert()
        .success();
    fluxlab(dir.path())
        .args(["client", "set", "ndots", "3"])
        .assert()
        .success();

    fluxlab(dir.path())
        .args(["client", "show"])
        .assert()
        .success()
        .stdout(
            "search sim.local\n\
             options ndots:3\n\
             nameserver 172.61.0.53\n\
             nameserver 172.60.0.53\n",
        );
}

#[test]
fn reset_requires_confirmation() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path()).args(["add", "normal", "web"]).assert().success();

    fluxlab(dir.path()).arg("reset").assert().failure();
    fluxlab(dir.path()).arg("list").assert().stdout("web\n");

    fluxlab(dir.path()).args(["reset", "--yes"]).assert().success();
    fluxlab(dir.path()).arg("list").assert().stdout("");

    // Allocation starts over after a reset
    fluxlab(dir.path())
        .args(["add", "normal", "again"])
        .assert()
        .success()
        .stdout(predicate::str::contains("172.60.0.0/24"));
}

#[test]
fn deploy_with_empty_catalog_is_a_no_op() {
    let dir = TempDir::new().unwrap();

    fluxlab(dir.path())
        .arg("deploy")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to deploy"));

    assert!(!dir.path().join("dns_config").exists());
}

#[test]
fn config_set_and_path() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");

    fluxlab(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    fluxlab(dir.path())
        .args(["config", "set", "project_name", "mylab"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&config)
        .unwrap()
        .contains("project_name = \"mylab\""));

    fluxlab(dir.path())
        .args(["config", "set", "api_key", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));

    fluxlab(dir.path())
        .args(["-o", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"project_name\": \"mylab\""));
}

#[test]
fn configured_domain_reaches_status() {
    let dir = TempDir::new().unwrap();
    fluxlab(dir.path())
        .args(["config", "set", "domain", "lab.test"])
        .assert()
        .success();
    fluxlab(dir.path()).args(["add", "cdn", "edge1"]).assert().success();

    fluxlab(dir.path())
        .args(["-o", "csv", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("edge1.lab.test"));
}

#[test]
fn stop_refreshes_monitoring_snapshot() {
    let dir = TempDir::new().unwrap();
    // No compose file in the lab dir, so teardown fails fast and only warns
    fluxlab(dir.path())
        .args(["config", "set", "project_name", "fluxlab-cli-test-stop"])
        .assert()
        .success();
    fluxlab(dir.path()).args(["add", "flux", "fluxy"]).assert().success();

    let snapshot = dir.path().join("monitoring/registry.json");
    std::fs::remove_file(&snapshot).unwrap();

    fluxlab(dir.path()).arg("stop").assert().success();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(value["networks"]["fluxy"]["kind"], "flux");
    fluxlab(dir.path()).arg("list").assert().stdout("fluxy\n");
}
