//! CLI command tests

mod common;

use common::{create_part, setup_assembly, setup_test_project, tplm, tplm_as};
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Basics
// ============================================================================

#[test]
fn test_help_displays() {
    tplm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("product structures"));
}

#[test]
fn test_version_displays() {
    tplm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tplm"));
}

#[test]
fn test_completions_generate() {
    tplm()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tplm"));
}

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();
    tplm()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(tmp.path().join(".tplm/config.yaml").exists());
    for dir in ["parts", "products", "baselines", "instances"] {
        assert!(tmp.path().join(dir).is_dir(), "missing {}", dir);
    }
}

#[test]
fn test_init_twice_fails() {
    let tmp = setup_test_project();
    tplm()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already"));
}

#[test]
fn test_outside_project_fails() {
    let tmp = TempDir::new().unwrap();
    tplm_as(&tmp, "alice")
        .args(["part", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not inside"));
}

// ============================================================================
// Parts and lifecycle
// ============================================================================

#[test]
fn test_part_new_writes_file() {
    let tmp = setup_test_project();
    create_part(&tmp, "BOLT");
    assert!(tmp.path().join("parts/BOLT.tplm.yaml").exists());

    tplm_as(&tmp, "alice")
        .args(["part", "list", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NUMBER\tNAME"))
        .stdout(predicate::str::contains("BOLT\tBOLT\tA\t1\tdraft\talice"));
}

#[test]
fn test_checkout_is_exclusive() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["part", "checkout", "ASM"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A.2"));
    tplm_as(&tmp, "bob")
        .args(["part", "checkout", "ASM"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::not_allowed"));
}

#[test]
fn test_undo_first_iteration_fails() {
    let tmp = setup_test_project();
    tplm_as(&tmp, "alice")
        .args(["part", "new", "NEW", "--name", "Fresh"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "undo", "NEW"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::not_allowed"));
}

#[test]
fn test_undo_releases_attachment_files() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["part", "checkout", "PLATE"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "set", "PLATE", "--attach", "drawing.pdf"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "undo", "PLATE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PLATE/A/2/drawing.pdf"));
}

#[test]
fn test_cyclic_use_is_rejected() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["part", "checkout", "BOLT"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "use", "BOLT", "ASM"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cyclic"));
}

#[test]
fn test_use_with_placements() {
    let tmp = setup_assembly();
    create_part(&tmp, "NUT");
    tplm_as(&tmp, "alice")
        .args(["part", "checkout", "ASM"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args([
            "part",
            "use",
            "ASM",
            "NUT",
            "--amount",
            "2",
            "--at",
            "1,2,3",
            "--at=-5,0,0,0,0,1.5",
        ])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "show", "ASM"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(1, 2, 3) rot (0, 0, 0)"))
        .stdout(predicate::str::contains("(-5, 0, 0) rot (0, 0, 1.5)"));
    tplm_as(&tmp, "alice")
        .args(["part", "use", "ASM", "NUT", "--at", "1,2"])
        .assert()
        .failure();
}

#[test]
fn test_release_and_obsolete() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "bob")
        .args(["part", "obsolete", "BOLT"])
        .assert()
        .failure();
    tplm_as(&tmp, "bob")
        .args(["part", "release", "BOLT"])
        .assert()
        .success();
    tplm_as(&tmp, "bob")
        .args(["part", "obsolete", "BOLT"])
        .assert()
        .success();
    tplm_as(&tmp, "bob")
        .args(["part", "list", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("obsolete"));
}

#[test]
fn test_delete_blocked_by_usage() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["part", "delete", "BOLT", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::entity_constraint"));

    create_part(&tmp, "SPARE");
    tplm_as(&tmp, "alice")
        .args(["part", "delete", "SPARE", "--yes"])
        .assert()
        .success();
    assert!(!tmp.path().join("parts/SPARE.tplm.yaml").exists());
}

// ============================================================================
// Structure queries
// ============================================================================

#[test]
fn test_tree_renders_structure() {
    let tmp = setup_assembly();
    let output = tplm_as(&tmp, "alice")
        .args(["tree", "PRD"])
        .output()
        .unwrap();
    assert!(output.status.success());
    insta::assert_snapshot!(String::from_utf8_lossy(&output.stdout).trim_end(), @r"
    ASM A.1 [-1]
      BOLT A.1 x4 [-1-u2]
      PLATE A.1 x1 [-1-u3]
    ");
}

#[test]
fn test_tree_hides_foreign_working_copy() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["part", "checkout", "PLATE"])
        .assert()
        .success();

    tplm_as(&tmp, "alice")
        .args(["tree", "PRD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PLATE A.2"));
    tplm_as(&tmp, "bob")
        .args(["tree", "PRD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PLATE A.1"))
        .stdout(predicate::str::contains("A.2").not());
}

#[test]
fn test_tree_hides_unreadable_part_under_every_filter() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["part", "readers", "BOLT", "alice"])
        .assert()
        .success();

    for filter in ["wip", "latest"] {
        tplm_as(&tmp, "bob")
            .args(["tree", "PRD", "--filter", filter])
            .assert()
            .success()
            .stdout(predicate::str::contains("PLATE A.1"))
            .stdout(predicate::str::contains("BOLT").not());
        tplm_as(&tmp, "alice")
            .args(["tree", "PRD", "--filter", filter])
            .assert()
            .success()
            .stdout(predicate::str::contains("BOLT A.1 x4 [-1-u2]"));
    }
    tplm_as(&tmp, "bob")
        .args(["rollup", "PRD", "--filter", "latest", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BOLT").not());
}

#[test]
fn test_tree_json_and_depth() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"part\": \"BOLT\""))
        .stdout(predicate::str::contains("\"path\": \"-1-u2\""));
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--depth", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ASM A.1"))
        .stdout(predicate::str::contains("BOLT").not());
}

#[test]
fn test_tree_from_path() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--path=-1-u3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PLATE A.1"))
        .stdout(predicate::str::contains("ASM").not());
}

#[test]
fn test_unknown_filter_is_rejected() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--filter", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::invalid_filter_type"));
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--filter", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::baseline_not_found"));
}

#[test]
fn test_paths_and_rollup() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["paths", "PRD", "--part", "BOLT"])
        .assert()
        .success()
        .stdout(predicate::eq("-1-u2\n"));
    tplm_as(&tmp, "alice")
        .args(["rollup", "PRD", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PART\tQUANTITY\tUNIT\tOCCURRENCES"))
        .stdout(predicate::str::contains("BOLT\t4\t-\t1"));
}

// ============================================================================
// Baselines and instances
// ============================================================================

#[test]
fn test_baseline_and_instance_freeze_structure() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["baseline", "new", "PRD", "--name", "proto"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 parts"));
    tplm_as(&tmp, "alice")
        .args(["instance", "new", "PRD", "SN-1", "--baseline", "1"])
        .assert()
        .success();

    // move the latest structure on
    tplm_as(&tmp, "alice")
        .args(["part", "checkout", "ASM"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "unuse", "ASM", "4"])
        .assert()
        .success();
    tplm_as(&tmp, "alice")
        .args(["part", "checkin", "ASM"])
        .assert()
        .success();

    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--filter", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ASM A.2"))
        .stdout(predicate::str::contains("BOLT").not());
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--filter", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ASM A.1"))
        .stdout(predicate::str::contains("BOLT A.1 x4 [-1-u2]"));
    tplm_as(&tmp, "alice")
        .args(["tree", "PRD", "--filter", "pi-SN-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BOLT A.1 x4 [-1-u2]"));

    tplm_as(&tmp, "alice")
        .args(["instance", "list", "PRD", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SN-1\t1\t1\t3\talice"));
}

#[test]
fn test_released_baseline_needs_released_parts() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["baseline", "new", "PRD", "--name", "rel", "--type", "released"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::not_allowed"));
}

// ============================================================================
// Path-to-path links
// ============================================================================

#[test]
fn test_link_add_list_and_cycle() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["link", "add", "PRD", "-t", "wired_to", "--", "-1-u2", "-1-u3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wired_to"));
    tplm_as(&tmp, "alice")
        .args(["link", "add", "PRD", "-t", "wired_to", "--", "-1-u3", "-1-u2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tplm::path_to_path_cyclic"));
    tplm_as(&tmp, "alice")
        .args(["link", "add", "PRD", "-t", "wired_to", "--", "-1-u2", "-1-u2"])
        .assert()
        .failure();

    tplm_as(&tmp, "alice")
        .args(["link", "types", "PRD"])
        .assert()
        .success()
        .stdout(predicate::eq("wired_to\n"));

    let output = tplm_as(&tmp, "alice")
        .args(["link", "roots", "PRD", "-t", "wired_to"])
        .output()
        .unwrap();
    assert!(output.status.success());
    insta::assert_snapshot!(String::from_utf8_lossy(&output.stdout).trim_end(), @r"
    <wired_to>
      BOLT A.1 x4 [-1-u2]
    ");
}

#[test]
fn test_link_remove() {
    let tmp = setup_assembly();
    tplm_as(&tmp, "alice")
        .args(["link", "add", "PRD", "-t", "mates", "--", "-1-u2", "-1-u3"])
        .assert()
        .success();
    let output = tplm_as(&tmp, "alice")
        .args(["link", "list", "PRD", "--format", "tsv"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let id = stdout
        .lines()
        .nth(1)
        .and_then(|line| line.split('\t').next())
        .unwrap()
        .to_string();

    tplm_as(&tmp, "alice")
        .args(["link", "rm", "PRD", &id, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));
    tplm_as(&tmp, "alice")
        .args(["link", "list", "PRD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No links found"));
}
