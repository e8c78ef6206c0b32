//! Error output and hints.

use predicates::prelude::*;

use crate::support::*;

#[test]
fn test_uninitialized_project_hints_init() {
    let t = Test::new();
    t.cmd()
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("✗ not initialized"))
        .stderr(predicate::str::contains("→ run: fieldvault init"));
}

#[test]
fn test_malformed_config_is_reported() {
    let t = Test::init();
    t.append_config("[tables.users\n");
    let output = t.status();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to parse config");
}

#[test]
fn test_embedding_non_embeddable_table_is_rejected() {
    let t = Test::init();
    t.append_config(
        r#"
[tables.users]
embedded = { profile = "profiles" }

[tables.profiles]
encrypted = { bio = "default" }
"#,
    );
    let output = t.status();
    assert_failure(&output);
    assert_stderr_contains(&output, "embeddable");
}

#[test]
fn test_tampered_ciphertext_names_the_field() {
    let t = Test::with_tables();
    t.seed("users", &[&[("secret", "tampered<ENC>")]]);
    let output = t.show("users");
    assert_failure(&output);
    assert_stderr_contains(&output, "cannot decrypt users.secret");
}

#[test]
fn test_verbose_flag_is_global() {
    let t = Test::init();
    t.cmd().args(["status", "--verbose"]).assert().success();
}

#[test]
fn test_unknown_table_hints_declaration() {
    let t = Test::init();
    t.cmd()
        .args(["show", "users"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("declare the table under [tables]"))
        .stdout(predicate::str::is_empty());
}
