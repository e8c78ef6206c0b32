//! Tests for `fieldvault status`.

use predicates::prelude::*;

use crate::support::*;

#[test]
fn test_status_lists_encryptor_keys_and_tables() {
    let t = Test::with_tables();
    t.seed("users", &[&[("secret", "a")], &[("secret", "b")]]);

    let output = t.status();
    assert_success(&output);
    assert_stdout_contains(&output, "encryptor  age");
    assert_stdout_contains(&output, "default");
    assert_stdout_contains(&output, "users (2 rows): secret, address.street");
    assert_stdout_excludes(&output, "logs");
}

#[test]
fn test_status_reports_missing_key_file() {
    let t = Test::init();
    std::fs::remove_file(t.path(".fieldvault/keys/default.key")).unwrap();

    t.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("default").and(predicate::str::contains("unavailable")));
}

#[test]
fn test_status_without_encrypted_tables() {
    let t = Test::init();
    t.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no tables with encrypted fields"));
}
