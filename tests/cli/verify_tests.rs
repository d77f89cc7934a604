use super::common::{recorded_response, socket_test, FIXTURE_DIR};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn verify_accepts_matching_response() {
    let dir = TempDir::new().unwrap();
    let response = recorded_response(
        &dir,
        "success.json",
        json!({"code": 200, "mimetype": "application/json", "data": {"result": []}}),
    );

    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "verify", "search", "success", "--response"])
        .arg(&response)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS search/success"));
}

#[test]
fn verify_decodes_string_payloads() {
    let dir = TempDir::new().unwrap();
    let response = recorded_response(
        &dir,
        "raw.json",
        json!({"code": 404, "data": "{\"message\": \"Nothing here\"}"}),
    );

    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "verify", "search", "not_found", "-r"])
        .arg(&response)
        .assert()
        .success();
}

#[test]
fn verify_reports_each_undeclared_field() {
    let dir = TempDir::new().unwrap();
    let response = recorded_response(
        &dir,
        "extra.json",
        json!({"code": 200, "data": {"result": [], "debug": true}}),
    );

    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "verify", "search", "success", "--response"])
        .arg(&response)
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL search/success"))
        .stderr(predicate::str::contains("Validation error"))
        .stderr(predicate::str::contains(r#"{"additionalProperty":"debug"}"#));
}

#[test]
fn verify_names_both_exit_codes() {
    let dir = TempDir::new().unwrap();
    let response = recorded_response(
        &dir,
        "not_found.json",
        json!({"code": 404, "data": {"message": "Nothing here"}}),
    );

    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "verify", "search", "success", "--response"])
        .arg(&response)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Wrong exit code! Desired code is 200, got: 404",
        ));
}

#[test]
fn verify_rejects_malformed_json_payload() {
    let dir = TempDir::new().unwrap();
    let response = recorded_response(&dir, "broken.json", json!({"code": 200, "data": "{result"}));

    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "verify", "search", "success", "--response"])
        .arg(&response)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed JSON payload"));
}
