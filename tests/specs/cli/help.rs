// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Help and version specs.

#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use yare::parameterized;

fn runq() -> Command {
    cargo_bin_cmd!("runq")
}

#[test]
fn help_lists_commands() {
    runq()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("clear"))
        .stdout(predicate::str::contains("Get started:"));
}

#[parameterized(
    status = { "status" },
    sync = { "sync" },
    clear = { "clear" },
)]
fn subcommand_help_has_examples(cmd: &str) {
    runq()
        .args([cmd, "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Examples:"));
}

#[test]
fn version_flag_outputs_version() {
    runq()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("runq"))
        .stdout(predicate::str::is_match(r"[0-9]+\.[0-9]+\.[0-9]+").unwrap());
}

#[test]
fn missing_subcommand_fails() {
    runq().assert().failure();
}

#[test]
fn unknown_subcommand_fails() {
    runq()
        .arg("push")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
