use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    Command::cargo_bin("comment-section").expect("binary built")
}

#[test]
fn prints_version() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("comment-section"))
        .stdout(predicate::str::contains("--version"))
        .stdout(predicate::str::contains("feed <entity-id>"));
}

#[test]
fn no_arguments_prints_usage() {
    bin()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn feed_without_entity_is_rejected() {
    bin()
        .arg("feed")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("feed needs an entity id"));
}

#[test]
fn unknown_sort_is_rejected() {
    bin()
        .args(["feed", "post-1", "--sort", "best"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown sort"));
}
