//! Tests for `fieldvault encrypt-database`.

use crate::support::*;

fn seeded() -> Test {
    let t = Test::with_tables();
    t.seed(
        "users",
        &[
            &[("name", "ada"), ("secret", "one"), ("address.street", "Main St")],
            &[("name", "grace"), ("secret", "two")],
            &[("name", "linus"), ("secret", "")],
        ],
    );
    t
}

#[test]
fn test_encrypt_database_seals_rows() {
    let t = seeded();
    let output = t.encrypt(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "values encrypted: 3");

    assert_sealed(t.stored("users", 1, "secret").as_deref());
    assert_sealed(t.stored("users", 1, "address.street").as_deref());
    assert_sealed(t.stored("users", 2, "secret").as_deref());
    assert_eq!(t.stored("users", 3, "secret").as_deref(), Some(""));
    assert_eq!(t.stored("users", 2, "name").as_deref(), Some("grace"));
}

#[test]
fn test_encrypt_database_twice_encrypts_nothing_new() {
    let t = seeded();
    assert_success(&t.encrypt(&[]));
    let first = t.stored("users", 1, "secret");

    let output = t.encrypt(&[]);
    assert_success(&output);
    assert_stdout_contains(&output, "values encrypted: 0");
    assert_eq!(t.stored("users", 1, "secret"), first);
}

#[test]
fn test_encrypt_database_with_batch_size_and_table() {
    let t = seeded();
    let output = t.encrypt(&["1", "--table", "users"]);
    assert_success(&output);
    assert_stdout_contains(&output, "3 rows");
}

#[test]
fn test_encrypt_database_fails_on_unknown_table() {
    let t = seeded();
    let output = t.encrypt(&["--table", "nope"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "unknown table: nope");
    assert_stdout_contains(&output, "values encrypted: 0");
}

#[test]
fn test_encrypt_database_rejects_zero_batch() {
    let t = seeded();
    let output = t.encrypt(&["0"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "batch_size");
}

#[test]
fn test_encrypt_database_without_encryptor() {
    let t = seeded();
    let config = std::fs::read_to_string(t.path(".fieldvault.toml")).unwrap();
    std::fs::write(
        t.path(".fieldvault.toml"),
        config.replace("encryptor = \"age\"", "encryptor = \"none\""),
    )
    .unwrap();

    let output = t.encrypt(&[]);
    assert_failure(&output);
    assert_stderr_contains(&output, "no encryptor configured");
}
