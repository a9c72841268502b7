// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests for the ballotwerk binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use ballotwerk_core::types::PaperSize;
use ballotwerk_fixtures::{DEFAULT_PPI, HmpbPage, blank_page, sample_fingerprint, sample_layout};
use predicates::str::contains;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("ballotwerk").expect("binary built")
}

/// Layout JSON plus a voted two-page sheet, written into a fresh directory.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let layout = sample_layout();
        let fingerprint = sample_fingerprint().expect("fingerprint");
        std::fs::write(
            dir.path().join("layout.json"),
            serde_json::to_string_pretty(&layout).expect("layout json"),
        )
        .expect("write layout");

        HmpbPage::new(&layout, &fingerprint, "style-1", "precinct-1", 1)
            .fill("mayor", "alice")
            .render()
            .expect("render front")
            .save(dir.path().join("front.png"))
            .expect("save front");
        HmpbPage::new(&layout, &fingerprint, "style-1", "precinct-1", 2)
            .fill("measure-1", "yes")
            .render()
            .expect("render back")
            .save(dir.path().join("back.png"))
            .expect("save back");
        blank_page(PaperSize::Letter, DEFAULT_PPI)
            .save(dir.path().join("blank.png"))
            .expect("save blank");

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("write file");
        path
    }
}

fn interpret(ws: &Workspace, front: &str, back: &str) -> Command {
    let mut cmd = cmd();
    cmd.arg("interpret")
        .arg("--layout")
        .arg(ws.path("layout.json"))
        .arg("--front")
        .arg(ws.path(front))
        .arg("--back")
        .arg(ws.path(back));
    cmd
}

fn stdout_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout is JSON")
}

#[test]
fn fingerprint_matches_library() {
    let ws = Workspace::new();
    let expected = sample_fingerprint().expect("fingerprint");

    cmd()
        .arg("fingerprint")
        .arg("--layout")
        .arg(ws.path("layout.json"))
        .assert()
        .success()
        .stdout(contains(expected));
}

#[test]
fn interpret_prints_votes_as_json() {
    let ws = Workspace::new();

    let output = interpret(&ws, "front.png", "back.png")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["castability"], "castable_without_review");
    assert_eq!(json["votes"]["mayor"], serde_json::json!(["alice"]));
    assert_eq!(json["votes"]["measure-1"], serde_json::json!(["yes"]));
    assert_eq!(json["sheet"]["front"]["type"], "InterpretedHmpbPage");
}

/// Pages swapped in the scanner come out in page order.
#[test]
fn interpret_reorders_swapped_pages() {
    let ws = Workspace::new();

    let output = interpret(&ws, "back.png", "front.png")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["sheet"]["front"]["metadata"]["page_number"], 1);
    assert_eq!(json["sheet"]["back"]["metadata"]["page_number"], 2);
}

#[test]
fn precinct_override_rejects_other_precincts() {
    let ws = Workspace::new();

    let output = interpret(&ws, "front.png", "back.png")
        .args(["--precinct", "precinct-2"])
        .assert()
        .success()
        .stderr(contains("precinct"))
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["castability"], "uncastable");
    assert_eq!(json["sheet"]["front"]["type"], "UnreadablePage");
}

#[test]
fn blank_sheet_is_uncastable() {
    let ws = Workspace::new();

    interpret(&ws, "blank.png", "blank.png")
        .arg("--pretty")
        .assert()
        .success()
        .stdout(contains("\"castability\": \"uncastable\""));
}

#[test]
fn config_file_with_inverted_thresholds_fails() {
    let ws = Workspace::new();
    let config = ws.write(
        "config.json",
        r#"{"mark_thresholds": {"definite": 0.05, "marginal": 0.3}}"#,
    );

    interpret(&ws, "front.png", "back.png")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("error"));
}

#[test]
fn missing_scan_fails() {
    let ws = Workspace::new();

    interpret(&ws, "front.png", "does-not-exist.png")
        .assert()
        .failure()
        .stderr(contains("error"));
}

#[test]
fn malformed_layout_fails() {
    let ws = Workspace::new();
    let layout = ws.write("broken.json", "{ not json");

    cmd()
        .arg("fingerprint")
        .arg("--layout")
        .arg(Path::new(&layout))
        .assert()
        .failure();
}
