//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Helper to get a tplm command isolated from the caller's environment
pub fn tplm() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("tplm"));
    cmd.env_remove("TPLM_USER")
        .env_remove("TPLM_FILTER")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("tplm-test-no-config"));
    cmd
}

/// tplm command run inside `tmp` as `user`
pub fn tplm_as(tmp: &TempDir, user: &str) -> Command {
    let mut cmd = tplm();
    cmd.current_dir(tmp.path()).env("TPLM_USER", user);
    cmd
}

/// Helper to create a test project in a temp directory
pub fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tplm().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Create a part as `alice` and check it in
pub fn create_part(tmp: &TempDir, number: &str) {
    tplm_as(tmp, "alice")
        .args(["part", "new", number, "--name", number, "--checkin"])
        .assert()
        .success();
}

/// ASM uses BOLT x4 (link u2) and PLATE x1 (link u3), all checked in at
/// A.1; product PRD is designed by ASM
pub fn setup_assembly() -> TempDir {
    let tmp = setup_test_project();
    create_part(&tmp, "BOLT");
    create_part(&tmp, "PLATE");
    tplm_as(&tmp, "alice")
        .args(["part", "new", "ASM", "--name", "Assembly"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "use", "ASM", "BOLT", "--amount", "4"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "use", "ASM", "PLATE"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "checkin", "ASM"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["product", "new", "PRD", "--part", "ASM"])
        .assert()
        .success();
    tmp
}
