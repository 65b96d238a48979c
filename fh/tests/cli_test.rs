//! End-to-end tests of the `fh` binary against scripted fixtures

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FIXTURE: &str = r#"
badges:
  - game-id: 440
    name: Team Fortress 2
    cards: 2
  - game-id: 570
    name: Dota 2
    cards: 1
  - game-id: 730
    name: Counter-Strike
    cards: 0
market:
  buy:
    - { price: 150, quantity: 2 }
    - { price: 175, quantity: 1 }
  sell:
    - { price: 199, quantity: 4 }
"#;

const CONFIG: &str = r#"
cards:
  max-concurrency: 2
  wait-interval-ms: 5
  tick-ms: 5
  retry-delay-ms: 5
market:
  poll-interval-ms: 5
  retry-delay-ms: 5
  max-rounds: 2
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(dir.path().join("fixture.yml"), FIXTURE).unwrap();
        fs::write(dir.path().join("config.yml"), CONFIG).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// `fh` isolated from the user's config and data directories
    fn fh(&self) -> Command {
        let mut cmd = Command::cargo_bin("fh").unwrap();
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.path("config-home"))
            .env("XDG_DATA_HOME", self.path("data-home"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn fh_with_config(&self) -> Command {
        let mut cmd = self.fh();
        cmd.arg("--config").arg(self.path("config.yml"));
        cmd
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cards_text_output() {
    let ws = Workspace::new();
    ws.fh_with_config()
        .args(["cards", "--fixture", arg(&ws.path("fixture.yml"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("Team Fortress 2"))
        .stdout(predicate::str::contains("Dota 2"))
        .stdout(predicate::str::contains("No cards left"))
        .stdout(predicate::str::contains("Counter-Strike").not())
        .stdout(predicate::str::contains("2 units finished"));
}

#[test]
fn test_cards_json_lines() {
    let ws = Workspace::new();
    let output = ws
        .fh_with_config()
        .args(["cards", "-x", arg(&ws.path("fixture.yml")), "-n", "1", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert!(!lines.is_empty());

    // Capacity 1 farms one badge after the other
    let units: Vec<u64> = lines.iter().map(|v| v["unit"].as_u64().unwrap()).collect();
    let first_570 = units.iter().position(|u| *u == 570).unwrap();
    assert!(units[first_570..].iter().all(|u| *u == 570));

    assert!(lines.iter().all(|v| v["counters"]["running_count"].as_u64().unwrap() <= 1));
    assert_eq!(lines.last().unwrap()["counters"]["total_outstanding_work"], 0);
    assert_eq!(lines.last().unwrap()["snapshot"]["action"], "clear");
}

#[test]
fn test_cards_reverse_starts_with_last_badge() {
    let ws = Workspace::new();
    let output = ws
        .fh_with_config()
        .args(["cards", "-x", arg(&ws.path("fixture.yml")), "-n", "1", "--reverse", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let first: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(first["unit"], 570);
}

#[test]
fn test_market_rounds() {
    let ws = Workspace::new();
    ws.fh_with_config()
        .args(["market", "-x", arg(&ws.path("fixture.yml")), "--rounds", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Buy orders"))
        .stdout(predicate::str::contains("best price 1.75, volume 3"))
        .stdout(predicate::str::contains("Sell orders"))
        .stdout(predicate::str::contains("best price 1.99, volume 4"));
}

#[test]
fn test_fatal_error_exits_non_zero() {
    let ws = Workspace::new();
    let fixture = ws.write(
        "fatal.yml",
        r#"
badges:
  - game-id: 1
    name: Broken
    cards: 3
    fail: { on: 1, kind: unauthorized }
"#,
    );

    ws.fh_with_config()
        .args(["cards", "-x", arg(&fixture)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to check drops for Broken"))
        .stderr(predicate::str::contains("not logged in"));
}

#[test]
fn test_fatal_error_stops_sibling_games() {
    let ws = Workspace::new();
    let fixture = ws.write(
        "fatal-sibling.yml",
        r#"
badges:
  - game-id: 1
    name: Slow
    cards: 5
  - game-id: 2
    name: Broken
    cards: 3
    fail: { on: 1, kind: unauthorized }
"#,
    );

    ws.fh_with_config()
        .args(["cards", "-x", arg(&fixture), "-n", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to check drops for Broken"));

    let log = ws.path("data-home").join("farmhand").join("logs").join("farmhand.log");
    let content = fs::read_to_string(log).unwrap();
    assert!(content.contains("Stopping games left running"));
    assert!(content.contains("Stopped game left running"));
}

#[test]
fn test_transient_error_is_shown_and_farming_continues() {
    let ws = Workspace::new();
    let fixture = ws.write(
        "flaky.yml",
        r#"
badges:
  - game-id: 1
    name: Flaky
    cards: 1
    fail: { on: 1, kind: network }
"#,
    );

    ws.fh_with_config()
        .args(["cards", "-x", arg(&fixture)])
        .assert()
        .success()
        .stdout(predicate::str::contains("error: Network error"))
        .stdout(predicate::str::contains("No cards left"));
}

#[test]
fn test_zero_concurrency_rejected() {
    let ws = Workspace::new();
    ws.fh_with_config()
        .args(["cards", "-x", arg(&ws.path("fixture.yml")), "-n", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max-concurrency"));
}

#[test]
fn test_missing_fixture() {
    let ws = Workspace::new();
    ws.fh_with_config()
        .args(["cards", "-x", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read fixture"));
}

#[test]
fn test_config_prints_effective_values() {
    let ws = Workspace::new();
    ws.fh_with_config()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-concurrency: 2"))
        .stdout(predicate::str::contains("max-rounds: 2"));
}

#[test]
fn test_config_picks_up_local_file() {
    let ws = Workspace::new();
    ws.write("farmhand.yml", "market:\n  max-rounds: 7\n");
    ws.fh()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-rounds: 7"));
}

#[test]
fn test_config_defaults_without_files() {
    let ws = Workspace::new();
    ws.fh()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("wait-interval-ms: 900000"));
}

#[test]
fn test_writes_log_file() {
    let ws = Workspace::new();
    ws.fh_with_config().args(["--log-level", "debug", "config"]).assert().success();

    let log = ws.path("data-home").join("farmhand").join("logs").join("farmhand.log");
    let content = fs::read_to_string(log).unwrap();
    assert!(content.contains("Logging initialized"));
}
