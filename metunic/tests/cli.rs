// metunic/tests/cli.rs

use assert_cmd::Command;
use metunic_lib::{CookieJar, Credentials, FileSessionStore, SessionStore};
use predicates::prelude::*;
use tempfile::TempDir;

/// A `metunic` command isolated from the developer's own config and session.
fn isolated_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("metunic").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("METUNIC_SESSION_DIR", home.path())
        .env_remove("METUNIC_USERNAME")
        .env_remove("METUNIC_PASSWORD")
        .env_remove("METUNIC_BASE_URL")
        .env_remove("METUNIC_TEST_MODE")
        .env_remove("METUNIC_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands_and_flags() {
    let mut cmd = Command::cargo_bin("metunic").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("check-session"))
        .stdout(predicate::str::contains("set-nameservers"))
        .stdout(predicate::str::contains("--test-mode"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_phone_formatting_is_offline() {
    let home = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(&home);
    cmd.args(["phone", "+90 555 123 45 67"]);

    cmd.assert().success().stdout("+905551234567\n");
}

#[test]
fn test_phone_formatting_json() {
    let home = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(&home);
    cmd.args(["--json", "phone", "1-555-123-4567"]);

    cmd.assert().success().stdout("\"+15551234567\"\n");
}

#[test]
fn test_missing_credentials_fail_cleanly() {
    let home = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(&home);
    cmd.arg("check-session");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No username configured"));
}

#[test]
fn test_invalid_domain_is_rejected_before_any_request() {
    let home = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(&home);
    cmd.env("METUNIC_USERNAME", "bayi")
        .env("METUNIC_PASSWORD", "secret")
        .args(["--base-url", "http://127.0.0.1:1", "sync", "not a domain"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid domain"));
}

#[test]
fn test_invalid_timeout_is_config_error() {
    let home = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(&home);
    cmd.args(["--timeout", "soon", "check-session"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timeout format"));
}

#[test]
fn test_explicit_config_file_supplies_credentials() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    std::fs::write(
        &config,
        "[account]\nusername = \"bayi\"\npassword = \"secret\"\n\n[api]\nbase_url = \"http://127.0.0.1:1\"\n",
    )
    .unwrap();

    let mut cmd = isolated_cmd(&home);
    cmd.arg("--config")
        .arg(&config)
        .args(["lock", "bad_domain!.com"]);

    // Credentials resolve, so the failure is the domain check, not config.
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid domain"))
        .stderr(predicate::str::contains("No username").not());
}

#[test]
fn test_too_many_nameservers_is_usage_error() {
    let home = TempDir::new().unwrap();
    let mut cmd = isolated_cmd(&home);
    cmd.args([
        "set-nameservers",
        "example.com",
        "ns1.a.net",
        "ns2.a.net",
        "ns3.a.net",
        "ns4.a.net",
        "ns5.a.net",
        "ns6.a.net",
    ]);

    cmd.assert().failure().code(2);
}

#[test]
fn test_logout_removes_the_stored_session() {
    let home = TempDir::new().unwrap();
    let store = FileSessionStore::new(home.path());
    let key = Credentials::new("bayi", "secret").session_key("http://127.0.0.1:1");
    store.save(&key, &CookieJar::new()).unwrap();
    assert!(store.path_for(&key).exists());

    let mut cmd = isolated_cmd(&home);
    cmd.env("METUNIC_USERNAME", "bayi")
        .env("METUNIC_PASSWORD", "secret")
        .args(["--base-url", "http://127.0.0.1:1", "logout"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Session for bayi discarded"));
    assert!(!store.path_for(&key).exists());
}
