//! CLI-level tests for workflow validation

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const VALID_WORKFLOW: &str = r#"{
    "name": "intake",
    "tree": {
        "id": "root", "type": "Trigger",
        "childs": [{
            "id": "q1", "type": "QuestionStep",
            "data": { "question": { "type": "text", "text": "How can we help?" } },
            "childs": []
        }]
    }
}"#;

const DUPLICATE_ID_WORKFLOW: &str = r#"{
    "tree": {
        "id": "root", "type": "Trigger",
        "childs": [
            { "id": "a", "type": "BranchStep" },
            { "id": "a", "type": "BranchStep" }
        ]
    }
}"#;

fn workflow_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn validate_reports_step_count() {
    let file = workflow_file(VALID_WORKFLOW);

    Command::cargo_bin("chatflow")
        .unwrap()
        .arg("validate")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("intake"))
        .stdout(predicate::str::contains("2 steps"))
        .stdout(predicate::str::contains("entry q1"));
}

#[test]
fn validate_rejects_duplicate_ids() {
    let file = workflow_file(DUPLICATE_ID_WORKFLOW);

    Command::cargo_bin("chatflow")
        .unwrap()
        .arg("validate")
        .arg(file.path())
        .assert()
        .failure();
}

#[test]
fn validate_rejects_missing_file() {
    Command::cargo_bin("chatflow")
        .unwrap()
        .arg("validate")
        .arg("does-not-exist.json")
        .assert()
        .failure();
}

#[test]
fn show_prints_the_tree() {
    let file = workflow_file(VALID_WORKFLOW);

    Command::cargo_bin("chatflow")
        .unwrap()
        .arg("show")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("root [Trigger]"))
        .stdout(predicate::str::contains("q1 [QuestionStep]"));
}
