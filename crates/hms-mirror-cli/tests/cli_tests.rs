//! CLI integration tests for hms-mirror.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes and the files an end-to-end run leaves behind.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the hms-mirror binary.
fn cmd() -> Command {
    Command::cargo_bin("hms-mirror").unwrap()
}

const CONFIG: &str = r#"
data_strategy: SCHEMA_ONLY
databases: [sales]
clusters:
  left:
    legacy_hive: true
    hcfs_namespace: hdfs://LEFT
  right:
    hcfs_namespace: hdfs://RIGHT
"#;

const SNAPSHOT: &str = r#"
left:
  databases:
    sales:
      properties:
        location: hdfs://LEFT/apps/hive/warehouse/sales.db
      tables:
        customers:
          owner: etl
          ddl: |
            CREATE EXTERNAL TABLE `customers`(
              `id` string,
              `name` string)
            ROW FORMAT SERDE
              'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
            STORED AS INPUTFORMAT
              'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
            OUTPUTFORMAT
              'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
            LOCATION
              'hdfs://LEFT/apps/hive/warehouse/sales.db/customers'
            TBLPROPERTIES (
              'transient_lastDdlTime'='1614637339')
right:
  databases: {}
"#;

/// Write the config and snapshot fixtures into `dir`.
fn fixtures(dir: &Path) -> (String, String) {
    let config = dir.join("config.yaml");
    let snapshot = dir.join("metadata.yaml");
    std::fs::write(&config, CONFIG).unwrap();
    std::fs::write(&snapshot, SNAPSHOT).unwrap();
    (
        config.to_str().unwrap().to_string(),
        snapshot.to_str().unwrap().to_string(),
    )
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--data-strategy"))
        .stdout(predicate::str::contains("--databases"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--execute"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hms-mirror"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--shutdown-timeout"))
        .stdout(predicate::str::contains("[default: 60]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: metadata.yaml]"));
}

#[test]
fn test_state_and_output_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--state-file"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_unknown_strategy_rejected() {
    cmd()
        .args(["run", "--data-strategy", "TELEPORT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown data strategy"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // Missing file is an IO error, not a config error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_incompatible_config_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "data_strategy: STORAGE_MIGRATION").unwrap();
    writeln!(file, "databases: [sales]").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("STORAGE_MIGRATION_REQUIRED_NAMESPACE"));
}

#[test]
fn test_resume_requires_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());

    cmd()
        .args(["--config", &config, "--snapshot", &snapshot, "resume"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--state-file is required"));
}

#[test]
fn test_resume_missing_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());

    cmd()
        .args([
            "--config",
            &config,
            "--snapshot",
            &snapshot,
            "--state-file",
            "missing-state.json",
            "resume",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("State file not found"));
}

#[test]
fn test_missing_snapshot_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = fixtures(dir.path());

    cmd()
        .args(["--config", &config, "--snapshot", "missing.yaml", "run"])
        .assert()
        .code(1);
}

// =============================================================================
// Validate Tests
// =============================================================================

#[test]
fn test_validate_reports_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = fixtures(dir.path());

    cmd()
        .args(["--config", &config, "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("SCHEMA_ONLY"));
}

#[test]
fn test_validate_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = fixtures(dir.path());

    cmd()
        .args(["--config", &config, "--output-json", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\":true"))
        .stdout(predicate::str::contains("config_hash"));
}

// =============================================================================
// End-to-End Run Tests
// =============================================================================

#[test]
fn test_dry_run_writes_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());
    let output = dir.path().join("out");

    cmd()
        .args([
            "--config",
            &config,
            "--snapshot",
            &snapshot,
            "--output-dir",
            output.to_str().unwrap(),
            "run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run completed (dry run)"))
        .stdout(predicate::str::contains("Tables: 1/1"));

    let right = std::fs::read_to_string(output.join("sales_RIGHT_execute.sql")).unwrap();
    assert!(right.contains("CREATE DATABASE IF NOT EXISTS sales"));
    assert!(right.contains("CREATE EXTERNAL TABLE `customers`("));
    assert!(output.join("sales_hms-mirror.md").exists());
    assert!(output.join("run-result.json").exists());
    assert!(!output.join("hms-mirror_RIGHT_executed.sql").exists());
}

#[test]
fn test_run_overrides_and_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());
    let output = dir.path().join("out");

    cmd()
        .args([
            "--config",
            &config,
            "--snapshot",
            &snapshot,
            "--output-dir",
            output.to_str().unwrap(),
            "--output-json",
            "run",
            "--data-strategy",
            "LINKED",
            "--concurrency",
            "2",
            "--execute",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"data_strategy\": \"LINKED\""))
        .stdout(predicate::str::contains("\"dry_run\": false"));

    let executed = std::fs::read_to_string(output.join("hms-mirror_RIGHT_executed.sql")).unwrap();
    assert!(executed.contains("CREATE DATABASE IF NOT EXISTS sales"));
}

#[test]
fn test_run_unknown_database_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());
    let output = dir.path().join("out");

    cmd()
        .args([
            "--config",
            &config,
            "--snapshot",
            &snapshot,
            "--output-dir",
            output.to_str().unwrap(),
            "run",
            "--databases",
            "hr",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tables: 0/0"));

    let report = std::fs::read_to_string(output.join("hr_hms-mirror.md")).unwrap();
    assert!(report.contains("Database hr does not exist on LEFT"));
}

#[test]
fn test_resume_carries_over_completed_tables() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());
    let output = dir.path().join("out");
    let state = dir.path().join("state.json");
    let args = [
        "--config",
        &config,
        "--snapshot",
        &snapshot,
        "--output-dir",
        output.to_str().unwrap(),
        "--state-file",
        state.to_str().unwrap(),
    ];

    cmd().args(args).arg("run").assert().success();
    assert!(state.exists());

    cmd()
        .args(args)
        .arg("resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resumed run completed"))
        .stdout(predicate::str::contains("1 carried over"));
}

#[test]
fn test_resume_with_changed_config_exits_with_code_3() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = fixtures(dir.path());
    let output = dir.path().join("out");
    let state = dir.path().join("state.json");
    let args = [
        "--config",
        &config,
        "--snapshot",
        &snapshot,
        "--output-dir",
        output.to_str().unwrap(),
        "--state-file",
        state.to_str().unwrap(),
    ];

    cmd().args(args).arg("run").assert().success();
    cmd()
        .args(args)
        .args(["resume", "--concurrency", "8"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Config has changed"));
}
