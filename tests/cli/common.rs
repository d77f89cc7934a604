use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

pub const FIXTURE_DIR: &str = "tests/fixtures";

/// The CLI binary with a clean platform environment and no colors.
pub fn socket_test() -> Command {
    let mut cmd = Command::cargo_bin("socket-test").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("SYNCANO_HOST")
        .env_remove("SYNCANO_AUTH_KEY")
        .env_remove("SYNCANO_INSTANCE_NAME")
        .env_remove("SYNCANO_PROJECT_INSTANCE")
        .env_remove("SOCKET_TEST_DIR")
        .env_remove("DEBUG")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a recorded response to a file inside `dir`.
pub fn recorded_response(dir: &TempDir, name: &str, response: Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(&response).unwrap()).unwrap();
    path
}

/// A socket directory whose manifest is named by socket-test.toml.
pub fn configured_socket() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::copy(
        Path::new(FIXTURE_DIR).join("socket.yml"),
        dir.path().join("contract.yml"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("socket-test.toml"),
        "[harness]\nmanifest = \"contract.yml\"\n\n[environment]\nhost = \"api.from-file.test\"\ninstance = \"file-instance\"\n",
    )
    .unwrap();
    dir
}
