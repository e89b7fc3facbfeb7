//! Structure resolution tests against the public library API

use tplm::core::identity::{IterationRef, LinkId, PartKey};
use tplm::core::{PlmError, Workspace};
use tplm::entities::{BaselineChoices, BaselineKind, NewSubstitute, NewUsage};
use tplm::structure::{
    ConfigSpec, FilterSelector, Path, PartLoader, Start, StructureResolver,
};

fn key(s: &str) -> PartKey {
    PartKey::new(s).unwrap()
}

/// ASM uses SUB1 (u6) and SUB2 (u7); both use BOLT (u2, u3), the second
/// one offering NUT (s4) and WASHER (s5) as substitutes. Everything is
/// checked in at A.1.
fn diamond() -> Workspace {
    let mut ws = Workspace::new();
    for name in ["ASM", "SUB1", "SUB2", "BOLT", "NUT", "WASHER"] {
        ws.create_master(name, name, "alice").unwrap();
    }
    ws.add_component(&key("SUB1"), "alice", NewUsage::of(key("BOLT")).amount(2.0))
        .unwrap();
    ws.add_component(
        &key("SUB2"),
        "alice",
        NewUsage::of(key("BOLT"))
            .amount(3.0)
            .substitute(NewSubstitute::of(key("NUT")))
            .substitute(NewSubstitute::of(key("WASHER"))),
    )
    .unwrap();
    ws.add_component(&key("ASM"), "alice", NewUsage::of(key("SUB1")))
        .unwrap();
    ws.add_component(&key("ASM"), "alice", NewUsage::of(key("SUB2")))
        .unwrap();
    for name in ["BOLT", "NUT", "WASHER", "SUB1", "SUB2", "ASM"] {
        ws.check_in(&key(name), "A", "alice").unwrap();
    }
    ws
}

fn render(ws: &Workspace, spec: &ConfigSpec) -> String {
    StructureResolver::new(ws)
        .resolve_tree(spec, Start::Part(key("ASM")), None)
        .unwrap()
        .unwrap()
        .render()
}

#[test]
fn test_diamond_tree_with_substitutes() {
    let ws = diamond();
    let spec = ConfigSpec::LatestCheckedIn { diverge: true };
    insta::assert_snapshot!(render(&ws, &spec).trim_end(), @r"
    ASM A.1 [-1]
      SUB1 A.1 x1 [-1-u6]
        BOLT A.1 x2 [-1-u6-u2]
      SUB2 A.1 x1 [-1-u7]
        BOLT A.1 x3 [-1-u7-u3]
        NUT A.1 x1 (substitute) [-1-u7-s4]
        WASHER A.1 x1 (substitute) [-1-u7-s5]
    ");
}

#[test]
fn test_resolution_is_deterministic() {
    let ws = diamond();
    let spec = ConfigSpec::wip("alice");
    assert_eq!(render(&ws, &spec), render(&ws, &spec));
}

#[test]
fn test_checkout_is_exclusive() {
    let mut ws = diamond();
    ws.check_out(&key("SUB1"), "A", "alice").unwrap();
    let err = ws.check_out(&key("SUB1"), "A", "bob").unwrap_err();
    assert!(matches!(err, PlmError::NotAllowed(_)));
    assert!(err.to_string().contains("alice"));
}

#[test]
fn test_first_iteration_cannot_be_undone() {
    let mut ws = Workspace::new();
    ws.create_master("NEW", "Fresh part", "alice").unwrap();
    let err = ws.undo_check_out(&key("NEW"), "A", "alice").unwrap_err();
    assert!(matches!(err, PlmError::NotAllowed(_)));
}

#[test]
fn test_every_visited_path_decodes_back() {
    let ws = diamond();
    let spec = ConfigSpec::LatestCheckedIn { diverge: true };
    let resolver = StructureResolver::new(&ws);
    let mut count = 0;
    for node in resolver.walk(&spec, Start::Part(key("ASM")), None).unwrap() {
        let node = node.unwrap();
        let decoded = ws.decode_path(&node.path.to_string()).unwrap();
        assert_eq!(decoded, node.path);
        count += 1;
    }
    assert_eq!(count, 7);
}

#[test]
fn test_cycles_rejected_diamonds_accepted() {
    let mut ws = diamond();
    ws.check_out(&key("BOLT"), "A", "alice").unwrap();
    let err = ws
        .add_component(&key("BOLT"), "alice", NewUsage::of(key("ASM")))
        .unwrap_err();
    assert!(matches!(err, PlmError::NotAllowed(_)));

    // the rejected edit left the working iteration untouched
    let bolt = ws.master(&key("BOLT")).unwrap();
    let working = bolt.iteration(&IterationRef::new("A", 2)).unwrap();
    assert!(working.components.is_empty());
    ws.check_in(&key("BOLT"), "A", "alice").unwrap();

    // BOLT appears twice through distinct paths
    let paths = StructureResolver::new(&ws)
        .find_paths(
            &ConfigSpec::LatestCheckedIn { diverge: false },
            key("ASM"),
            |n| n.part == key("BOLT"),
        )
        .unwrap();
    let paths: Vec<String> = paths.iter().map(ToString::to_string).collect();
    assert_eq!(paths, vec!["-1-u6-u2", "-1-u7-u3"]);
}

#[test]
fn test_filter_content_across_revisions() {
    let mut ws = Workspace::new();
    let m = key("M");
    ws.create_master("M", "Widget", "alice").unwrap();
    ws.check_in(&m, "A", "alice").unwrap();
    ws.release(&m, "A", "alice").unwrap();
    assert_eq!(ws.new_version(&m, "alice").unwrap(), "B");
    ws.check_in(&m, "B", "alice").unwrap();
    ws.release(&m, "B", "alice").unwrap();
    assert_eq!(ws.new_version(&m, "carol").unwrap(), "C");

    let master = ws.master(&m).unwrap();
    let ats = |spec: ConfigSpec| -> Vec<String> {
        spec.filter_master(master)
            .iter()
            .map(|s| s.at().to_string())
            .collect()
    };
    assert_eq!(ats(ConfigSpec::Released { diverge: false }), vec!["B.1", "A.1"]);
    assert_eq!(ats(ConfigSpec::LatestReleased { diverge: false }), vec!["B.1"]);
    assert_eq!(ats(ConfigSpec::wip("carol")), vec!["C.1"]);
    assert!(ats(ConfigSpec::wip("bob")).is_empty());
}

#[test]
fn test_wip_shows_others_their_last_checked_in_iteration() {
    let mut ws = Workspace::new();
    let m = key("M");
    ws.create_master("M", "Widget", "alice").unwrap();
    ws.check_in(&m, "A", "alice").unwrap();
    ws.release(&m, "A", "alice").unwrap();
    assert_eq!(ws.new_version(&m, "carol").unwrap(), "B");
    ws.check_in(&m, "B", "carol").unwrap();
    assert_eq!(ws.check_out(&m, "B", "carol").unwrap().to_string(), "B.2");

    let master = ws.master(&m).unwrap();
    let ats = |spec: ConfigSpec| -> Vec<String> {
        spec.filter_master(master)
            .iter()
            .map(|s| s.at().to_string())
            .collect()
    };
    assert_eq!(ats(ConfigSpec::wip("carol")), vec!["B.2"]);
    assert_eq!(ats(ConfigSpec::wip("bob")), vec!["B.1"]);
    assert_eq!(ats(ConfigSpec::LatestReleased { diverge: false }), vec!["A.1"]);
}

#[test]
fn test_cross_link_cycle_is_not_persisted() {
    let mut ws = diamond();
    ws.create_product("PRD", &key("ASM"), None).unwrap();
    ws.create_path_link("PRD", "wired_to", "-1-u6", "-1-u7", None)
        .unwrap();
    ws.create_path_link("PRD", "wired_to", "-1-u7", "-1-u6-u2", None)
        .unwrap();
    let err = ws
        .create_path_link("PRD", "wired_to", "-1-u6-u2", "-1-u6", None)
        .unwrap_err();
    assert!(matches!(err, PlmError::PathToPathCyclic { .. }));
    assert_eq!(ws.path_links_of_type("PRD", "wired_to").unwrap().len(), 2);
}

#[test]
fn test_diverge_expands_substitutes_in_order() {
    let ws = diamond();
    let spec = ConfigSpec::LatestCheckedIn { diverge: false };
    let parent: Path = "-1-u7".parse().unwrap();
    let ids = |diverge: bool| -> Vec<LinkId> {
        spec.filter_links(ws.links(), &parent, &[LinkId(3)], diverge)
            .unwrap()
            .iter()
            .map(|l| l.id())
            .collect()
    };
    assert_eq!(ids(false), vec![LinkId(3)]);
    assert_eq!(ids(true), vec![LinkId(3), LinkId(4), LinkId(5)]);
}

#[test]
fn test_baseline_stays_frozen_while_latest_moves() {
    let mut ws = diamond();
    ws.create_product("PRD", &key("ASM"), None).unwrap();
    let mut choices = BaselineChoices::default();
    choices.substitutes.insert("-1-u7-u3".to_string(), LinkId(4));
    let id = ws
        .create_baseline("PRD", "first", BaselineKind::Latest, None, "alice", choices)
        .unwrap()
        .id;

    ws.check_out(&key("SUB1"), "A", "alice").unwrap();
    let bolt = ws
        .master(&key("SUB1"))
        .unwrap()
        .iteration(&IterationRef::new("A", 2))
        .unwrap()
        .components[0];
    ws.remove_component(&key("SUB1"), "alice", bolt).unwrap();
    ws.check_in(&key("SUB1"), "A", "alice").unwrap();

    let frozen = ws
        .config_spec("PRD", &FilterSelector::Baseline(id), "alice", false)
        .unwrap();
    insta::assert_snapshot!(render(&ws, &frozen).trim_end(), @r"
    ASM A.1 [-1]
      SUB1 A.1 x1 [-1-u6]
        BOLT A.1 x2 [-1-u6-u2]
      SUB2 A.1 x1 [-1-u7]
        NUT A.1 x1 (substitute) [-1-u7-s4]
    ");

    let latest = ws
        .config_spec("PRD", &FilterSelector::Latest, "alice", false)
        .unwrap();
    insta::assert_snapshot!(render(&ws, &latest).trim_end(), @r"
    ASM A.1 [-1]
      SUB1 A.2 x1 [-1-u6]
      SUB2 A.1 x1 [-1-u7]
        BOLT A.1 x3 [-1-u7-u3]
    ");
}

#[test]
fn test_rollup_multiplies_down_the_tree() {
    let ws = diamond();
    let spec = ConfigSpec::LatestCheckedIn { diverge: false };
    let lines = StructureResolver::new(&ws).rollup(&spec, key("ASM")).unwrap();
    let bolt = lines.iter().find(|l| l.part == key("BOLT")).unwrap();
    assert_eq!(bolt.quantity, 5.0);
    assert_eq!(bolt.occurrences, 2);
}
