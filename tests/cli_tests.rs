//! Smoke tests for the bookwatch binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_shows_usage() {
    Command::cargo_bin("bookwatch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--symbol"));
}

#[test]
fn missing_config_file_fails_with_a_message() {
    Command::cargo_bin("bookwatch")
        .unwrap()
        .args(["--config", "/definitely/not/here.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn config_without_symbols_is_rejected() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [network]
        ws_url = "wss://feed.example.com/ws"
        "#
    )
    .unwrap();

    Command::cargo_bin("bookwatch")
        .unwrap()
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No symbols to watch"));
}
