//! Integration tests for the ipwhois and ipwhois-utils CLIs

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn ipwhois() -> Command {
    Command::cargo_bin("ipwhois").expect("Failed to find ipwhois binary")
}

fn utils() -> Command {
    Command::cargo_bin("ipwhois-utils").expect("Failed to find ipwhois-utils binary")
}

#[test]
fn test_help_output() {
    ipwhois()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IP address ownership lookups"))
        .stdout(predicate::str::contains("--addr"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--asn-methods"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_version_output() {
    let output = ipwhois().arg("--version").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ipwhois "));
    if cfg!(debug_assertions) {
        assert!(stdout.contains("-UNRELEASED"));
    }
}

#[test]
fn test_missing_addr_is_usage_error() {
    ipwhois()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--addr"));
}

#[test]
fn test_defined_address_fails_with_ietf_name() {
    ipwhois()
        .args(["--addr", "127.0.0.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Loopback"))
        .stderr(predicate::str::contains("RFC 1122"));

    ipwhois()
        .args(["--addr", "192.168.1.1", "--whois"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Private-Use Networks"));
}

#[test]
fn test_invalid_address_fails() {
    ipwhois()
        .args(["--addr", "not-an-ip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid IP address"));
}

#[test]
fn test_utils_help_lists_subcommands() {
    utils()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lstrip-zeros"))
        .stdout(predicate::str::contains("calculate-cidr"))
        .stdout(predicate::str::contains("unique-addresses"));
}

#[test]
fn test_utils_lstrip_zeros() {
    utils()
        .args(["lstrip-zeros", "074.125.025.229"])
        .assert()
        .success()
        .stdout("74.125.25.229\n");
}

#[test]
fn test_utils_calculate_cidr() {
    utils()
        .args(["calculate-cidr", "192.168.0.9", "192.168.5.4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("192.168.0.9/32"))
        .stdout(predicate::str::contains("192.168.4.0/24"))
        .stdout(predicate::str::contains("192.168.5.4/32"));
}

#[test]
fn test_utils_calculate_cidr_json() {
    let output = utils()
        .args(["--json", "calculate-cidr", "10.0.0.0", "10.0.0.255"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed, serde_json::json!(["10.0.0.0/24"]));
}

#[test]
fn test_utils_country() {
    utils()
        .args(["country", "US"])
        .assert()
        .success()
        .stdout(predicate::str::contains("United States"));

    utils().args(["country", "QQ"]).assert().failure();
}

#[test]
fn test_utils_is_defined() {
    utils()
        .args(["ipv4-is-defined", "74.125.225.229"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is not defined"));

    utils()
        .args(["ipv6-is-defined", "fe80::1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Link-Local"));

    let output = utils()
        .args(["--json", "ipv4-is-defined", "10.0.0.1"])
        .output()
        .unwrap();
    let parsed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["defined"], true);
    assert_eq!(parsed["rfc"], "RFC 1918");
}

#[test]
fn test_utils_generate_random() {
    let output = utils()
        .args(["ipv4-generate-random", "5"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    for line in lines {
        assert!(line.parse::<std::net::Ipv4Addr>().is_ok());
    }
}

#[test]
fn test_utils_unique_everseen() {
    utils()
        .args(["unique-everseen", "AAAABBBCCDAABBB"])
        .assert()
        .success()
        .stdout("A\nB\nC\nD\n");
}

#[test]
fn test_utils_unique_addresses() {
    let path = std::env::temp_dir().join(format!(
        "ipwhois-unique-addresses-{}.txt",
        std::process::id()
    ));
    std::fs::write(&path, "1.2.3.4 and 1.2.3.4:80 and 10.0.0.0/8\n").unwrap();

    let output = utils()
        .args(["--json", "unique-addresses"])
        .arg(&path)
        .output()
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["1.2.3.4"]["count"], 2);
    assert_eq!(parsed["1.2.3.4"]["ports"]["80"], 1);
    assert_eq!(parsed["10.0.0.0/8"]["count"], 1);
}
