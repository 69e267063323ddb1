//! End-to-end CLI tests: discovery, runs, stats and failure modes
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build `<root>/benchmarks/<id>` with a benchmark.json and preset files
fn write_benchmark(
    root: &Path,
    id: &str,
    definition: &serde_json::Value,
    presets: &[(&str, serde_json::Value)],
) {
    let dir = root.join("benchmarks").join(id);
    fs::create_dir_all(dir.join("presets")).unwrap();
    fs::write(
        dir.join("benchmark.json"),
        serde_json::to_string_pretty(definition).unwrap(),
    )
    .unwrap();
    for (name, preset) in presets {
        fs::write(
            dir.join("presets").join(format!("{name}.json")),
            serde_json::to_string(preset).unwrap(),
        )
        .unwrap();
    }
}

fn echo_definition() -> serde_json::Value {
    json!({
        "name": "Dummy",
        "description": "a dummy benchmark that echoes a number",
        "default_preset": "default",
        "run_command": "echo data: 135246",
        "test_command": "true",
        "stats": {"data_1": {"regex": "data: (\\d+)"}}
    })
}

/// A workspace with one echo benchmark; returns (workdir, search root)
fn echo_workspace() -> (TempDir, PathBuf) {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    write_benchmark(
        &root,
        "dummy_benchmark",
        &echo_definition(),
        &[("default", json!({"args": []}))],
    );
    (workdir, root)
}

fn medir(workdir: &TempDir, root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("medir").unwrap();
    cmd.current_dir(workdir.path())
        .arg("-s")
        .arg(root.display().to_string());
    cmd
}

#[test]
fn test_run_end_to_end_json_stats() {
    let (workdir, root) = echo_workspace();
    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"default":{"data_1":135246}}"#));
}

#[test]
fn test_run_prints_stat_table_by_default() {
    let (workdir, root) = echo_workspace();
    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Preset"))
        .stdout(predicate::str::contains("data_1"))
        .stdout(predicate::str::contains("135246"));
}

#[test]
fn test_failing_run_command_aborts_with_diagnostic() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    let mut definition = echo_definition();
    definition["run_command"] = json!("false");
    write_benchmark(
        &root,
        "dummy_benchmark",
        &definition,
        &[("default", json!({"args": []}))],
    );

    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed with return code 1"))
        .stdout(predicate::str::contains("data_1").not());
}

#[test]
fn test_unknown_benchmark_is_named_error() {
    let (workdir, root) = echo_workspace();
    medir(&workdir, &root)
        .args(["benchmark", "run", "no_such_benchmark"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "\"no_such_benchmark\" not found in search path",
        ));
}

#[test]
fn test_unknown_preset_fails_before_running() {
    let (workdir, root) = echo_workspace();
    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark", "no_such_preset"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"no_such_preset\" not found"));
    // resolution failed before any task ran, so no logs were written
    assert!(!workdir.path().join("logs").exists());
}

#[test]
fn test_list_ignores_directories_without_definition() {
    let (workdir, root) = echo_workspace();
    fs::create_dir_all(root.join("benchmarks").join("scratch")).unwrap();

    medir(&workdir, &root)
        .args(["benchmark", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dummy_benchmark"))
        .stdout(predicate::str::contains("scratch").not());
}

#[test]
fn test_list_presets_prints_names() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    write_benchmark(
        &root,
        "dummy_benchmark",
        &echo_definition(),
        &[
            ("default", json!({"args": []})),
            ("big", json!({"args": "--size big"})),
        ],
    );

    medir(&workdir, &root)
        .args(["benchmark", "list-presets", "dummy_benchmark"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("big"));
}

#[test]
fn test_get_prints_schema_valid_definition() {
    let (workdir, root) = echo_workspace();
    let assert = medir(&workdir, &root)
        .args(["benchmark", "get", "dummy_benchmark"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["name"], json!("Dummy"));
    assert_eq!(value["default_preset"], json!("default"));
}

#[test]
fn test_preset_args_splice_onto_last_run_command_only() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    let mut definition = echo_definition();
    definition["run_command"] = json!(["echo setup.sh", "echo data: 135246"]);
    write_benchmark(
        &root,
        "dummy_benchmark",
        &definition,
        &[("preset1", json!({"args": "--config=preset1.conf"}))],
    );

    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark", "preset1", "--json"])
        .assert()
        .success();

    // the timestamped log dir holds one out-log per task
    let log_root = workdir.path().join("logs").join("dummy_benchmark");
    let run_dir = fs::read_dir(&log_root).unwrap().next().unwrap().unwrap().path();

    let first = fs::read_to_string(run_dir.join("run_preset1.0.out.log")).unwrap();
    assert!(first.starts_with("$ echo setup.sh\n"));
    assert!(!first.contains("--config"));

    let second = fs::read_to_string(run_dir.join("run_preset1.1.out.log")).unwrap();
    assert!(second.starts_with("$ echo data: 135246 --config=preset1.conf\n"));
    assert!(second.contains("data: 135246 --config=preset1.conf"));
}

#[test]
fn test_stats_script_filters_non_numeric_values() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    let mut definition = echo_definition();
    definition["stats"] = json!({
        "command": ["sh", "-c", r#"echo '{"data1": 123, "label": "x"}'"#]
    });
    write_benchmark(
        &root,
        "dummy_benchmark",
        &definition,
        &[("default", json!({"args": []}))],
    );

    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"default":{"data1":123}}"#));
}

#[test]
fn test_missing_stat_match_is_fatal() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    let mut definition = echo_definition();
    definition["stats"] = json!({"memory": {"regex": "memory: (\\d+)"}});
    write_benchmark(
        &root,
        "dummy_benchmark",
        &definition,
        &[("default", json!({"args": []}))],
    );

    medir(&workdir, &root)
        .args(["benchmark", "run", "dummy_benchmark", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No match for stat \"memory\""));
}

#[test]
fn test_invalid_definition_is_schema_error() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    let mut definition = echo_definition();
    definition.as_object_mut().unwrap().remove("stats");
    write_benchmark(
        &root,
        "dummy_benchmark",
        &definition,
        &[("default", json!({"args": []}))],
    );

    medir(&workdir, &root)
        .args(["benchmark", "get", "dummy_benchmark"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid benchmark definition"));
}

#[test]
fn test_benchmark_test_pipeline_passes() {
    let (workdir, root) = echo_workspace();
    medir(&workdir, &root)
        .args(["benchmark", "test", "dummy_benchmark"])
        .assert()
        .success()
        .stderr(predicate::str::contains("test passed"));
}

#[test]
fn test_benchmark_test_pipeline_failure() {
    let workdir = TempDir::new().unwrap();
    let root = workdir.path().join("pool");
    let mut definition = echo_definition();
    definition["test_command"] = json!("false");
    write_benchmark(
        &root,
        "dummy_benchmark",
        &definition,
        &[("default", json!({"args": []}))],
    );

    medir(&workdir, &root)
        .args(["benchmark", "test", "dummy_benchmark"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed with return code"));
}

#[test]
fn test_search_path_from_environment() {
    let (workdir, root) = echo_workspace();
    let mut cmd = Command::cargo_bin("medir").unwrap();
    cmd.current_dir(workdir.path())
        .env("MEDIR_PATH", root.display().to_string())
        .args(["benchmark", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dummy_benchmark"));
}

fn write_suite(root: &Path, file: &str, definition: &serde_json::Value) {
    fs::create_dir_all(root.join("suites")).unwrap();
    fs::write(
        root.join("suites").join(file),
        serde_json::to_string(definition).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_suite_run_collects_stats_per_run() {
    let (workdir, root) = echo_workspace();
    write_suite(
        &root,
        "nightly.json",
        &json!({
            "name": "nightly",
            "description": "nightly sweep",
            "benchmark_runs": [
                {"benchmark_folder": "dummy_benchmark", "presets": ["default"]}
            ]
        }),
    );

    medir(&workdir, &root)
        .args(["suite", "run", "nightly", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"[{"default":{"data_1":135246}}]"#));
}

#[test]
fn test_suite_with_missing_benchmark_fails_before_running() {
    let (workdir, root) = echo_workspace();
    write_suite(
        &root,
        "broken.json",
        &json!({
            "name": "broken",
            "description": "",
            "benchmark_runs": [
                {"benchmark_folder": "no_such_benchmark", "presets": ["default"]}
            ]
        }),
    );

    medir(&workdir, &root)
        .args(["suite", "run", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"no_such_benchmark\" not found"));
    assert!(!workdir.path().join("logs").exists());
}

#[test]
fn test_suite_list_and_get() {
    let (workdir, root) = echo_workspace();
    write_suite(
        &root,
        "nightly.json",
        &json!({
            "name": "nightly",
            "description": "nightly sweep",
            "benchmark_runs": [
                {"benchmark_folder": "dummy_benchmark", "presets": ["default"]}
            ]
        }),
    );

    medir(&workdir, &root)
        .args(["suite", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nightly"));

    medir(&workdir, &root)
        .args(["suite", "get", "nightly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("benchmark_runs"));

    medir(&workdir, &root)
        .args(["suite", "get", "weekly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"weekly\" not found"));
}
