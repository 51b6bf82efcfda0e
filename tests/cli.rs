// The `declaratest` binary: patching documents, inspecting selectors, rendering values.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

const SOURCE: &str = include_str!("fixtures/arith.rs");

fn declaratest() -> Command {
    let mut cmd = Command::cargo_bin("declaratest").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn patch_rewrites_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("arith.rs");
    fs::write(&file, SOURCE).unwrap();

    declaratest()
        .args(["patch", file.to_str().unwrap(), "--path", "sum", "--results", "[3, 7]"])
        .assert()
        .success()
        .stdout(contains("Patched sum"));

    let patched = fs::read_to_string(&file).unwrap();
    assert!(patched.contains("        output: [\n            3,\n            7\n        ],"));
}

#[test]
fn dry_run_prints_a_diff_and_keeps_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("arith.rs");
    fs::write(&file, SOURCE).unwrap();

    declaratest()
        .args(["patch", file.to_str().unwrap(), "--path", "doubled.words"])
        .args(["--results", r#"[null, "b c"]"#, "--dry-run"])
        .assert()
        .success()
        .stdout(contains("-                \"stale\",").and(contains("+                \"b c\"")));

    assert_eq!(fs::read_to_string(&file).unwrap(), SOURCE);
}

#[test]
fn patch_reports_structural_errors() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("arith.rs");
    fs::write(&file, SOURCE).unwrap();

    declaratest()
        .args(["patch", file.to_str().unwrap(), "--path", "nope", "--results", "[1]"])
        .assert()
        .failure()
        .stderr(contains("declaratest::fix").and(contains("no 'nope' key found")));
}

#[test]
fn patch_requires_an_array_of_results() {
    declaratest()
        .args(["patch", "missing.rs", "--path", "sum", "--results", "{}"])
        .assert()
        .failure()
        .stderr(contains("--results must be a JSON array"));
}

#[test]
fn selectors_are_printed_as_json() {
    declaratest()
        .args(["selectors", "g1.sub#2-3, !g2"])
        .assert()
        .success()
        .stdout(contains("\"negated\": true").and(contains("\"start\": 2")).and(contains("\"end\": 3")));
}

#[test]
fn bad_selectors_fail() {
    declaratest()
        .args(["selectors", "g1#0"])
        .assert()
        .failure()
        .stderr(contains("declaratest::configuration"));
}

#[test]
fn render_honours_limits() {
    declaratest()
        .args(["render", r#"{"a": {"b": [1, 2, 3]}}"#, "--depth", "0"])
        .assert()
        .success()
        .stdout("{\"a\": [Object]}\n");
}
