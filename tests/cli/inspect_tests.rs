use super::common::{configured_socket, socket_test, FIXTURE_DIR};
use predicates::prelude::*;
use serde_json::Value;

#[test]
fn help_lists_subcommands() {
    socket_test()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("endpoints"))
        .stdout(predicate::str::contains("context"))
        .stdout(predicate::str::contains("schema"))
        .stdout(predicate::str::contains("verify"));
}

#[test]
fn endpoints_lists_variants_with_codes() {
    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "endpoints"])
        .assert()
        .success()
        .stdout(predicate::str::contains("norwegian-postcode"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("404 not_found [message]"))
        .stdout(predicate::str::contains("200 success [result]"))
        .stdout(predicate::str::contains("text/plain"));
}

#[test]
fn missing_manifest_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    socket_test()
        .args(["--socket-dir"])
        .arg(dir.path())
        .arg("endpoints")
        .assert()
        .failure()
        .stderr(predicate::str::contains("socket.yml"));
}

#[test]
fn context_prints_generated_metadata() {
    let output = socket_test()
        .env("SYNCANO_HOST", "api.syncano.test")
        .args(["--socket-dir", FIXTURE_DIR, "context", "search"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let context: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(context["executor"], "norwegian-postcode/search");
    assert_eq!(context["executed_by"], "socket_endpoint");
    assert_eq!(context["request"]["HTTP_HOST"], "api.syncano.test");
    assert_eq!(context["metadata"]["description"], "Search for a postcode or a place name");
}

#[test]
fn context_applies_meta_override() {
    let output = socket_test()
        .args([
            "--socket-dir",
            FIXTURE_DIR,
            "context",
            "search",
            "--meta",
            r#"{"request": {"HTTP_HOST": "override.test"}, "debug": true}"#,
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let context: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(context["request"]["HTTP_HOST"], "override.test");
    assert_eq!(context["request"]["REQUEST_METHOD"], "POST");
    assert_eq!(context["debug"], true);
}

#[test]
fn context_rejects_malformed_meta() {
    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "context", "search", "--meta", "{nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--meta must be a JSON object"));
}

#[test]
fn config_file_selects_manifest_and_environment() {
    let dir = configured_socket();
    let output = socket_test()
        .arg("--socket-dir")
        .arg(dir.path())
        .args(["context", "search"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let context: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(context["api_host"], "api.from-file.test");
    assert_eq!(
        context["request"]["PATH_INFO"],
        "/v2/instances/file-instance/endpoints/sockets/norwegian-postcode/search/"
    );
}

#[test]
fn schema_closes_declared_parameters() {
    let output = socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "schema", "search", "success"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["additionalProperties"], false);
    assert_eq!(schema["properties"]["result"]["type"], "array");
}

#[test]
fn schema_for_unknown_variant_fails() {
    socket_test()
        .args(["--socket-dir", FIXTURE_DIR, "schema", "search", "teapot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("declares no response named 'teapot'"));
}
