//! E2E tests for `eyegraph build`, `visualize`, and `health`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn eyegraph_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("eyegraph"));
    cmd.current_dir(dir);
    cmd.env("EYEGRAPH_LOG", "error");
    cmd.env_remove("DEBUG");
    cmd
}

fn write_records(dir: &Path, patients: &str, diagnoses: &str) {
    let data = dir.join("data");
    fs::create_dir_all(&data).expect("create data dir");
    fs::write(data.join("patients.json"), patients).expect("write patients");
    fs::write(data.join("diagnosis.json"), diagnoses).expect("write diagnoses");
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command should not crash");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

#[test]
fn build_then_visualize_single_patient() {
    let dir = TempDir::new().expect("tempdir");
    write_records(
        dir.path(),
        r#"[{"_id":"P1","name":"Zhao","location":"Kunming"}]"#,
        "[]",
    );

    let outcome = stdout_json(eyegraph_cmd(dir.path()).args(["build", "--json"]));
    assert_eq!(outcome, json!({"status": "success", "nodes_created": 1}));
    assert!(dir.path().join(".eyegraph/graph.db").exists());

    let payload = stdout_json(eyegraph_cmd(dir.path()).args(["visualize"]));
    let nodes = payload["nodes"].as_array().expect("nodes");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["name"], "Zhao");
    assert_eq!(nodes[0]["category"], 0);
    assert_eq!(nodes[1]["name"], "Kunming");
    assert_eq!(nodes[1]["category"], 1);
    assert_eq!(payload["links"], json!([{
        "source": nodes[0]["id"],
        "target": nodes[1]["id"],
        "name": "LIVES_IN",
    }]));
    assert_eq!(payload["categories"].as_array().map(Vec::len), Some(3));
}

#[test]
fn build_human_output_summarizes_report() {
    let dir = TempDir::new().expect("tempdir");
    write_records(
        dir.path(),
        "{\"_id\":{\"$oid\":\"a1\"},\"location\":\"Mars\"}\n{\"_id\":{\"$oid\":\"a2\"}}\n",
        "{\"patient_id\":\"a1\",\"ai_analysis\":{\"severity\":\"Mild\"}}\n",
    );

    eyegraph_cmd(dir.path())
        .args(["build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Graph rebuilt"))
        .stdout(predicate::str::contains("region fallbacks:"));
}

#[test]
fn unreachable_store_reports_error_outcome_and_empty_export() {
    let dir = TempDir::new().expect("tempdir");
    write_records(dir.path(), r#"[{"_id":"P1"}]"#, "[]");
    fs::write(dir.path().join("blocker"), "not a directory").expect("write blocker");
    let graph = dir.path().join("blocker/graph.db");
    let graph = graph.to_str().expect("utf8 path");

    let output = eyegraph_cmd(dir.path())
        .args(["--graph", graph, "build", "--json"])
        .output()
        .expect("build should not crash");
    assert!(!output.status.success());
    let outcome: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(outcome, json!({"status": "error", "message": "Neo4j not connected"}));

    eyegraph_cmd(dir.path())
        .args(["--graph", graph, "visualize"])
        .assert()
        .success()
        .stdout("{\"nodes\":[],\"links\":[]}\n");
}

#[test]
fn visualize_without_store_exports_empty_graph_and_creates_nothing() {
    let dir = TempDir::new().expect("tempdir");

    eyegraph_cmd(dir.path())
        .args(["visualize"])
        .assert()
        .success()
        .stdout("{\"nodes\":[],\"links\":[]}\n");
    assert!(!dir.path().join(".eyegraph").exists());
}

#[test]
fn visualize_respects_limit_and_pretty() {
    let dir = TempDir::new().expect("tempdir");
    let patients: Vec<Value> = (0..10)
        .map(|i| json!({"_id": format!("P{i}"), "location": "Dali"}))
        .collect();
    write_records(dir.path(), &Value::Array(patients).to_string(), "[]");
    eyegraph_cmd(dir.path()).args(["build"]).assert().success();

    let output = eyegraph_cmd(dir.path())
        .args(["visualize", "--pretty", "--limit", "4"])
        .output()
        .expect("visualize should not crash");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.contains("\n  \"nodes\""));
    let payload: Value = serde_json::from_str(&text).expect("valid JSON");
    assert_eq!(payload["links"].as_array().map(Vec::len), Some(4));
    // 4 patients + Dali
    assert_eq!(payload["nodes"].as_array().map(Vec::len), Some(5));
}

#[test]
fn missing_records_fail_without_touching_graph() {
    let dir = TempDir::new().expect("tempdir");

    eyegraph_cmd(dir.path())
        .args(["build", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));
}

#[test]
fn health_reports_components() {
    let dir = TempDir::new().expect("tempdir");
    write_records(dir.path(), r#"[{"_id":"P1","location":"Qujing"}]"#, "[]");

    let before = stdout_json(eyegraph_cmd(dir.path()).args(["health", "--json"]));
    assert_eq!(before["status"], "degraded");
    assert_eq!(before["records"]["ok"], true);
    assert_eq!(before["graph"]["ok"], false);
    assert!(!dir.path().join(".eyegraph/graph.db").exists());

    eyegraph_cmd(dir.path()).args(["build"]).assert().success();

    let after = stdout_json(eyegraph_cmd(dir.path()).args(["health", "--json"]));
    assert_eq!(after["status"], "ok");
    assert_eq!(after["stats"]["nodes"]["Region"], 16);
    assert_eq!(after["stats"]["nodes"]["DiseaseLevel"], 4);
    assert_eq!(after["stats"]["nodes"]["Patient"], 1);
    assert_eq!(after["stats"]["last_rebuild_patients"], 1);
}

#[test]
fn project_config_sets_record_dir() {
    let dir = TempDir::new().expect("tempdir");
    let exports = dir.path().join("exports");
    fs::create_dir_all(&exports).expect("create exports");
    fs::write(exports.join("patients.json"), r#"[{"_id":"P1"},{"_id":"P2"}]"#)
        .expect("write patients");
    fs::write(exports.join("diagnosis.json"), "").expect("write diagnoses");
    fs::create_dir_all(dir.path().join(".eyegraph")).expect("create config dir");
    fs::write(
        dir.path().join(".eyegraph/config.toml"),
        "[records]\ndir = \"exports\"\npatient_limit = 1\n",
    )
    .expect("write config");

    let outcome = stdout_json(eyegraph_cmd(dir.path()).args(["build", "--json"]));
    assert_eq!(outcome["nodes_created"], 1);
}
