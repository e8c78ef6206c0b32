//! Tests for `fieldvault create-key`.

use std::fs;

use crate::support::*;

#[test]
fn test_create_key_writes_timestamped_file() {
    let t = Test::init();
    let output = t.create_key(None);
    assert_success(&output);
    assert_stdout_contains(&output, "created");

    let keys: Vec<_> = fs::read_dir(t.path(".fieldvault/keys"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(keys.len(), 2);
    assert!(keys
        .iter()
        .filter(|k| k.as_str() != "default.key")
        .all(|k| k.trim_end_matches(".key").parse::<i64>().is_ok()));
}

#[test]
fn test_create_key_with_name_registers_it() {
    let t = Test::init();
    assert_success(&t.create_key(Some("pii")));

    let config = t.config();
    let path = &config.keys["pii"];
    assert!(t.path(path).exists());
}

#[test]
fn test_create_key_rejects_registered_name() {
    let t = Test::init();
    let output = t.create_key(Some("default"));
    assert_failure(&output);
    assert_stderr_contains(&output, "already registered");
}

#[test]
fn test_create_key_rejects_malformed_name() {
    let t = Test::init();
    let output = t.create_key(Some("bad name"));
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid value for name");
}

#[test]
fn test_create_key_requires_init() {
    let t = Test::new();
    let output = t.create_key(None);
    assert_failure(&output);
    assert_stderr_contains(&output, "fieldvault init");
}
