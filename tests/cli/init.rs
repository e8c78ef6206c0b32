//! Tests for `fieldvault init`.

use std::fs;

use crate::support::*;

#[test]
fn test_init_creates_config_and_key() {
    let t = Test::new();

    let output = t.init_cmd();
    assert_success(&output);
    assert_stdout_contains(&output, "initialized .fieldvault.toml");
    assert_stdout_contains(&output, "public key");

    let config = fs::read_to_string(t.path(".fieldvault.toml")).unwrap();
    assert!(config.contains("[fieldvault]"));
    assert!(config.contains("default = \".fieldvault/keys/default.key\""));

    let key = fs::read_to_string(t.path(".fieldvault/keys/default.key")).unwrap();
    assert!(key.starts_with("# public key: age1"));
    assert!(key.contains("AGE-SECRET-KEY-"));
}

#[test]
fn test_init_ignores_key_directory() {
    let t = Test::init();
    let gitignore = fs::read_to_string(t.path(".gitignore")).unwrap();
    assert!(gitignore.lines().any(|l| l == ".fieldvault/keys/"));
}

#[test]
fn test_init_keeps_existing_gitignore_entries() {
    let t = Test::new();
    fs::write(t.path(".gitignore"), "target/\n").unwrap();
    assert_success(&t.init_cmd());

    let gitignore = fs::read_to_string(t.path(".gitignore")).unwrap();
    assert!(gitignore.starts_with("target/\n"));
    assert!(gitignore.contains(".fieldvault/keys/"));
}

#[test]
fn test_init_twice_fails() {
    let t = Test::init();
    let output = t.init_cmd();
    assert_failure(&output);
    assert_stderr_contains(&output, "already initialized");
}

#[cfg(unix)]
#[test]
fn test_init_key_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let t = Test::init();
    let mode = fs::metadata(t.path(".fieldvault/keys/default.key"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
