//! Tests for `fieldvault show`.

use crate::support::*;

fn encrypted() -> Test {
    let t = Test::with_tables();
    t.seed(
        "users",
        &[&[("name", "ada"), ("secret", "hunter2"), ("address.zip", "12345")]],
    );
    assert_success(&t.encrypt(&[]));
    t
}

#[test]
fn test_show_prints_decrypted_values() {
    let t = encrypted();
    let output = t.show("users");
    assert_success(&output);
    assert_stdout_contains(&output, "hunter2");
    assert_stdout_contains(&output, "12345");
    assert_stdout_excludes(&output, "<ENC>");
}

#[test]
fn test_show_json() {
    let t = encrypted();
    let output = t.show_json("users");
    assert_success(&output);

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed[0]["id"], 1);
    assert_eq!(parsed[0]["values"]["secret"], "hunter2");
}

#[test]
fn test_show_does_not_rewrite_store() {
    let t = encrypted();
    let before = t.stored("users", 1, "secret");
    assert_success(&t.show("users"));
    assert_eq!(t.stored("users", 1, "secret"), before);
}

#[test]
fn test_show_empty_table() {
    let t = Test::with_tables();
    let output = t.show("logs");
    assert_success(&output);
    assert_stdout_contains(&output, "no rows");
}
