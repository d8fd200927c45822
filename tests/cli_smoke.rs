//! End-to-end CLI checks: init, the full task lifecycle, status output,
//! log filtering, and error exit codes.

mod support;

use predicates::prelude::*;
use serde_json::Value;

use support::{tempo_cmd, TestDir};

fn json_output(dir: &TestDir, args: &[&str]) -> Value {
    let output = tempo_cmd(dir)
        .args(args)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json output")
}

fn id_of(value: &Value) -> String {
    value["data"]["id"].as_str().expect("id in output").to_string()
}

#[test]
fn init_then_full_lifecycle() {
    let dir = TestDir::new();

    tempo_cmd(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("tempo init"));

    let project = json_output(&dir, &["project", "add", "Rewrite", "--description", "demo"]);
    let project_id = id_of(&project);
    assert!(project_id.starts_with("prj-"));
    assert_eq!(project["data"]["status"], "not_started");

    let milestone = json_output(&dir, &["milestone", "add", &project_id, "Phase 1"]);
    let milestone_id = id_of(&milestone);

    let task = json_output(
        &dir,
        &[
            "task",
            "add",
            &milestone_id,
            "Wire the parser",
            "--points",
            "3",
            "--priority",
            "enhance",
            "--tag",
            "deep-work",
        ],
    );
    let task_id = id_of(&task);
    assert_eq!(task["data"]["priority"], "enhance");

    let started = json_output(&dir, &["task", "start", &task_id]);
    assert_eq!(started["data"]["status"], "in_progress");

    let done = json_output(&dir, &["task", "done", &task_id]);
    assert_eq!(done["data"]["status"], "completed");
    assert_eq!(done["data"]["actual_points"], 3.0);

    let status = json_output(&dir, &["status"]);
    assert_eq!(status["data"]["statistics"]["completed_tasks"], 1);
    assert_eq!(status["data"]["statistics"]["earned_points"], 3.0);
    assert_eq!(status["data"]["projects"], 1);

    // Cascade reached the project level.
    let shown = json_output(&dir, &["project", "show", &project_id]);
    assert_eq!(shown["data"]["project"]["status"], "completed");
}

#[test]
fn log_lists_and_filters_events() {
    let dir = TestDir::new();
    tempo_cmd(&dir).arg("init").assert().success();

    let project = json_output(&dir, &["project", "add", "P"]);
    let project_id = id_of(&project);
    let milestone = json_output(&dir, &["milestone", "add", &project_id, "M"]);
    let milestone_id = id_of(&milestone);
    let task = json_output(&dir, &["task", "add", &milestone_id, "T"]);
    let task_id = id_of(&task);
    json_output(&dir, &["task", "start", &task_id]);

    let log = json_output(&dir, &["log"]);
    assert_eq!(log["data"]["total"], 6);

    let starts = json_output(&dir, &["log", "--kind", "task_started"]);
    assert_eq!(starts["data"]["total"], 1);
    assert_eq!(starts["data"]["events"][0]["type"], "task_started");

    let for_task = json_output(&dir, &["log", "--entity", &task_id]);
    assert_eq!(for_task["data"]["total"], 2);
}

#[test]
fn illegal_transition_is_a_user_error() {
    let dir = TestDir::new();
    tempo_cmd(&dir).arg("init").assert().success();

    let project = json_output(&dir, &["project", "add", "P"]);
    let milestone = json_output(&dir, &["milestone", "add", &id_of(&project), "M"]);
    let task = json_output(&dir, &["task", "add", &id_of(&milestone), "T"]);
    let task_id = id_of(&task);

    tempo_cmd(&dir)
        .args(["task", "done", task_id.as_str()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Illegal status transition"));

    tempo_cmd(&dir)
        .args(["task", "block", task_id.as_str(), "--reason", "x"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn dependency_cycle_is_policy_blocked() {
    let dir = TestDir::new();
    tempo_cmd(&dir).arg("init").assert().success();

    let project = json_output(&dir, &["project", "add", "P"]);
    let milestone = json_output(&dir, &["milestone", "add", &id_of(&project), "M"]);
    let milestone_id = id_of(&milestone);
    let t1 = id_of(&json_output(&dir, &["task", "add", &milestone_id, "T1"]));
    let t2 = id_of(&json_output(&dir, &["task", "add", &milestone_id, "T2"]));
    let t3 = id_of(&json_output(&dir, &["task", "add", &milestone_id, "T3"]));

    tempo_cmd(&dir)
        .args(["task", "dep", "add", t1.as_str(), t2.as_str()])
        .assert()
        .success();
    tempo_cmd(&dir)
        .args(["task", "dep", "add", t2.as_str(), t3.as_str()])
        .assert()
        .success();

    tempo_cmd(&dir)
        .args(["task", "dep", "add", t3.as_str(), t1.as_str()])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn uninitialized_directory_is_a_user_error() {
    let dir = TestDir::new();
    // Remove the data dir created by the harness.
    std::fs::remove_dir_all(dir.path().join(".tempo")).unwrap();

    tempo_cmd(&dir)
        .args(["project", "list"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("tempo init"));
}

#[test]
fn events_mirror_writes_jsonl() {
    let dir = TestDir::new();
    tempo_cmd(&dir).arg("init").assert().success();

    let mirror = dir.path().join("mirror.jsonl");
    tempo_cmd(&dir)
        .args(["project", "add", "P", "--events"])
        .arg(&mirror)
        .assert()
        .success();

    let content = std::fs::read_to_string(&mirror).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let event: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(event["type"], "project_created");
}
