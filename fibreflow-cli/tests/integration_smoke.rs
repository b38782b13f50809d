//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

fn fibreflow() -> Command {
    let mut cmd = Command::cargo_bin("fibreflow").unwrap();
    cmd.env_remove("DATABASE_URL").env("FIBREFLOW_QUIET", "1");
    cmd
}

#[test]
fn test_top_level_help_lists_commands() {
    fibreflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("onemap"))
        .stdout(predicate::str::contains("sow"));
}

#[test]
fn test_sow_import_help() {
    fibreflow()
        .args(["sow", "import", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--kind"));
}

#[test]
fn test_rag_calculate_requires_target() {
    fibreflow()
        .args(["rag", "calculate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONTRACTOR_ID"));
}

#[test]
fn test_completions_bash() {
    fibreflow()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fibreflow"));
}

#[test]
fn test_config_path() {
    let home = tempfile::tempdir().unwrap();
    fibreflow()
        .env("HOME", home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".fibreflow/config.toml"));
}

#[test]
fn test_config_init_then_refuses_overwrite() {
    let home = tempfile::tempdir().unwrap();
    fibreflow()
        .env("HOME", home.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(home.path().join(".fibreflow/config.toml").exists());

    fibreflow()
        .env("HOME", home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

// === OneMap dry run ===

#[test]
fn test_onemap_dry_run_prints_report() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("lawley.csv");
    std::fs::write(
        &csv,
        "\u{feff}Property ID;Pole Number;Drop Number;Status;Latitude;Longitude\n\
         1001;LAW.P.A001;DR001;Pole Permission: Approved;-26.25;28.30\n\
         1002;LAW.P.A001;DR002;Pole Permission: Approved;-26.25;28.30\n",
    )
    .unwrap();

    fibreflow()
        .args(["onemap", "import", "--dry-run"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("File: lawley.csv"))
        .stdout(predicate::str::contains("Total records: 2"))
        .stdout(predicate::str::contains("dry run"));
}

#[test]
fn test_onemap_missing_file_fails() {
    fibreflow()
        .args(["onemap", "import", "--dry-run", "/nonexistent/export.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

#[test]
fn test_migrate_without_database_url_explains() {
    let home = tempfile::tempdir().unwrap();
    fibreflow()
        .env("HOME", home.path())
        .current_dir(home.path())
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}
