#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

#[test]
fn test_help_lists_options() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--channels"))
        .stdout(predicate::str::contains("--concurrency"));
}

#[test]
fn test_missing_channel_file_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.current_dir(dir.path())
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .args(["--channels", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read nope.json"));
}

#[test]
fn test_invalid_timezone_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("channels.json"), "[]").unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.current_dir(dir.path())
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .args(["--timezone", "Mars/Olympus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid timezone"));
}

#[test]
fn test_zero_days_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("channels.json"), "[]").unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.current_dir(dir.path())
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .args(["--days", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("days must be at least 1"));
}

#[test]
fn test_invalid_config_file_fails() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("freeview-epg.toml"), "[guide\n").unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.current_dir(dir.path())
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn test_empty_channel_list_writes_empty_guide() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("channels.json"), r#"{"channels": []}"#).unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.current_dir(dir.path())
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .args(["--output", "guide.xml", "--timezone", "UTC", "--days", "1"])
        .assert()
        .success();

    // Assert
    let document = std::fs::read_to_string(dir.path().join("guide.xml")).unwrap();
    assert!(document.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(document.contains("generator-info-name=\"freeview-epg\""));
    assert!(!document.contains("<programme"));
}

#[test]
fn test_config_file_values_are_used() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("list.json"), "[]").unwrap();
    std::fs::write(
        dir.path().join("settings.toml"),
        "[guide]\nchannels = \"list.json\"\noutput = \"out.xml\"\ntimezone = \"UTC\"\n",
    )
    .unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("freeview-epg");
    cmd.current_dir(dir.path())
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .args(["--config", "settings.toml"])
        .assert()
        .success();

    // Assert
    assert!(dir.path().join("out.xml").exists());
}
