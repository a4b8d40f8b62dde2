//! End-to-end run of the `transient-analysis` binary against a file-backed
//! SQLite database and an unreachable predictor.

mod test_utils;

use assert_cmd::Command;
use portpicker::pick_unused_port;
use serde_json::Value;
use tempfile::TempDir;

use test_utils::{step_response_csv, write_csv};

fn command(workdir: &TempDir, predictor_port: u16) -> Command {
    let db_path = workdir.path().join("analysis.sqlite");
    let mut cmd = Command::cargo_bin("transient-analysis").unwrap();
    cmd.current_dir(workdir.path())
        .env(
            "TRANSIENT_DATABASE_URL",
            format!("sqlite://{}?mode=rwc", db_path.display()),
        )
        .env(
            "TRANSIENT_PREDICTOR_BASE_URL",
            format!("http://127.0.0.1:{predictor_port}"),
        )
        .env("TRANSIENT_PREDICTOR_TIMEOUT_SECONDS", "2")
        .env("TRANSIENT_LOG_LEVEL", "warn")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[test]
fn analyze_status_and_results_round() {
    let workdir = TempDir::new().unwrap();
    let csv = write_csv(workdir.path(), "step.csv", &step_response_csv());
    let port = pick_unused_port().expect("free port");

    let output = command(&workdir, port)
        .args(["analyze", "step.csv", "--input-voltage", "5", "--comment", "smoke"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "analyze failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let view = stdout_json(&output);
    assert_eq!(view["request"]["status"], "completed");
    assert_eq!(view["request"]["comment"], "smoke");
    assert_eq!(view["analysis_count"], 1);
    assert_eq!(view["latest"]["state"], "available");
    assert_eq!(view["latest"]["result"]["system_type"], "underdamped");
    assert_eq!(view["latest"]["result"]["poles"][0]["real"], -0.5);
    assert_eq!(
        view["document"]["file_path"],
        csv.canonicalize().unwrap().to_string_lossy().as_ref()
    );

    let request_id = view["request"]["id"].as_str().unwrap().to_string();
    let document_id = view["document"]["id"].as_str().unwrap().to_string();

    let output = command(&workdir, port)
        .args(["status", &request_id])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["latest"]["result"]["version"], 1);

    let output = command(&workdir, port)
        .args(["results", &document_id])
        .output()
        .unwrap();
    assert!(output.status.success());
    let history = stdout_json(&output);
    assert_eq!(history["results"].as_array().unwrap().len(), 1);

    let output = command(&workdir, port).arg("retry").output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), Value::Array(Vec::new()));
}

#[test]
fn unknown_request_exits_with_error() {
    let workdir = TempDir::new().unwrap();
    let port = pick_unused_port().expect("free port");

    command(&workdir, port)
        .args(["status", "00000000-0000-4000-8000-000000000000"])
        .assert()
        .failure();
}
