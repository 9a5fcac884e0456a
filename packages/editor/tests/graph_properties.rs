//! Whole-graph properties: tree integrity, reversible history, list
//! collapsing, history capacity and notification de-duplication.

use pageweave_editor::{
    DocumentGraph, EngineConfig, ModifyOptions, MoveDirection, Node, NodeKind, NodeStore, Placement,
    TemplateNode, TextRange, WrapKind,
};
use std::cell::Cell;
use std::rc::Rc;

fn node(id: &str, parent: Option<&str>, kind: NodeKind) -> Node {
    Node::new(id, parent.map(str::to_string), kind)
}

fn fixture_nodes() -> Vec<Node> {
    vec![
        node("doc", None, NodeKind::Document { title: "Site".to_string() }),
        node(
            "page",
            Some("doc"),
            NodeKind::Page {
                title: "Home".to_string(),
                slug: "home".to_string(),
                pane_ids: vec!["hero".to_string(), "footer".to_string()],
                is_context: false,
            },
        ),
        node("hero", Some("page"), NodeKind::pane("Hero")),
        node("md", Some("hero"), NodeKind::markdown()),
        node("p", Some("md"), NodeKind::tag("p")),
        node("p-text", Some("p"), NodeKind::text("0123456789")),
        node("ul", Some("md"), NodeKind::tag("ul")),
        node("li-1", Some("ul"), NodeKind::tag("li")),
        node("li-1-text", Some("li-1"), NodeKind::text("first")),
        node("li-2", Some("ul"), NodeKind::tag("li")),
        node("li-2-text", Some("li-2"), NodeKind::text("second")),
        node("ol", Some("md"), NodeKind::tag("ol")),
        node("solo", Some("ol"), NodeKind::tag("li")),
        node("solo-text", Some("solo"), NodeKind::text("only")),
        node("footer", Some("page"), NodeKind::pane("Footer")),
        node("footer-md", Some("footer"), NodeKind::markdown()),
    ]
}

fn fixture_with(config: EngineConfig) -> DocumentGraph {
    DocumentGraph::from_nodes(config, fixture_nodes())
}

fn fixture() -> DocumentGraph {
    fixture_with(EngineConfig::default())
}

fn assert_integrity(graph: &DocumentGraph) {
    let violations = graph.check_integrity();
    assert!(violations.is_empty(), "integrity violations: {:?}", violations);
}

/// Run `op`, then check that undo followed by redo lands on the same state
fn assert_undo_redo_round_trip(mut graph: DocumentGraph, op: impl FnOnce(&mut DocumentGraph)) {
    let before: NodeStore = graph.store().clone();
    op(&mut graph);
    let after: NodeStore = graph.store().clone();
    assert_ne!(before, after, "operation changed nothing");
    assert_integrity(&graph);

    assert!(graph.undo());
    assert_integrity(&graph);
    assert!(graph.redo());
    assert_eq!(graph.store(), &after);
    assert_integrity(&graph);
}

#[test]
fn test_fixture_is_consistent() {
    let graph = fixture();
    assert_integrity(&graph);
    assert_eq!(graph.to_flat_nodes().len(), fixture_nodes().len());
}

#[test]
fn test_every_child_appears_once_under_its_parent() {
    let mut graph = fixture();
    graph.move_node("li-2", MoveDirection::Up);
    graph.move_node_to("li-1-text", "li-2-text", Placement::After);
    graph.delete_node("solo-text");

    for (id, record) in graph.all_nodes() {
        let Some(parent_id) = record.parent_id else {
            continue;
        };
        let holders: Vec<String> = graph
            .all_nodes()
            .keys()
            .filter(|candidate| graph.get_child_node_ids(candidate).contains(&id))
            .cloned()
            .collect();
        assert_eq!(holders, vec![parent_id], "node {} is linked wrongly", id);
    }
}

#[test]
fn test_undo_redo_round_trip_add() {
    assert_undo_redo_round_trip(fixture(), |graph| {
        graph.add_node(node("new-text", Some("p"), NodeKind::text("more")));
    });
}

#[test]
fn test_undo_redo_round_trip_modify() {
    assert_undo_redo_round_trip(fixture(), |graph| {
        let mut edited = graph.get_node("p-text").cloned().unwrap();
        edited.set_text("edited".to_string());
        graph.modify_nodes(vec![edited], ModifyOptions::default());
    });
}

#[test]
fn test_undo_redo_round_trip_delete() {
    assert_undo_redo_round_trip(fixture(), |graph| {
        graph.delete_node("hero");
    });
}

#[test]
fn test_undo_redo_round_trip_move() {
    assert_undo_redo_round_trip(fixture(), |graph| {
        graph.move_node_to("p", "ol", Placement::After);
    });
}

#[test]
fn test_undo_redo_round_trip_template_insert() {
    assert_undo_redo_round_trip(fixture(), |graph| {
        let template = TemplateNode::new(NodeKind::pane("Cta")).with_children(vec![TemplateNode::new(
            NodeKind::markdown(),
        )
        .with_children(vec![TemplateNode::new(NodeKind::text("Sign up"))])]);
        graph
            .add_template_pane("page", &template, Some("hero"), Placement::After)
            .unwrap();
    });
}

#[test]
fn test_undo_redo_round_trip_range_wrap() {
    assert_undo_redo_round_trip(fixture(), |graph| {
        graph.wrap_range(&TextRange::within("p-text", "p", 2, 5), WrapKind::Span);
    });
}

#[test]
fn test_undo_restores_the_exact_previous_structure() {
    let mut graph = fixture();
    let before = graph.to_flat_nodes();

    graph.delete_node("ul");
    assert!(graph.undo());

    let restored: Vec<(String, Option<String>)> = graph
        .to_flat_nodes()
        .into_iter()
        .map(|n| (n.id, n.parent_id))
        .collect();
    let expected: Vec<(String, Option<String>)> = before.into_iter().map(|n| (n.id, n.parent_id)).collect();
    assert_eq!(restored, expected);
}

#[test]
fn test_deleting_only_list_content_collapses_the_list() {
    let mut graph = fixture();
    assert!(graph.delete_node("solo-text"));

    assert!(graph.get_node("ol").is_none());
    assert!(graph.get_node("solo").is_none());
    assert!(graph.get_node("solo-text").is_none());
    assert!(!graph.get_child_node_ids("md").contains(&"ol".to_string()));
    assert_integrity(&graph);
}

#[test]
fn test_deleting_one_of_two_items_keeps_the_list() {
    let mut graph = fixture();
    assert!(graph.delete_node("li-1-text"));

    assert!(graph.get_node("li-1").is_none());
    assert_eq!(graph.get_child_node_ids("ul"), vec!["li-2".to_string()]);
    assert!(graph.get_node("li-2-text").is_some());
    assert_integrity(&graph);
}

#[test]
fn test_history_capacity_evicts_the_oldest_operation() {
    let config = EngineConfig {
        history_capacity: 3,
        ..EngineConfig::default()
    };
    let mut graph = fixture_with(config);

    for text in ["a", "b", "c", "d"] {
        let mut edited = graph.get_node("p-text").cloned().unwrap();
        edited.set_text(text.to_string());
        graph.modify_nodes(vec![edited], ModifyOptions::default());
    }
    assert_eq!(graph.history().undo_levels(), 3);

    assert!(graph.undo());
    assert!(graph.undo());
    assert!(graph.undo());
    assert!(!graph.undo());

    // The first edit can no longer be taken back
    assert_eq!(graph.get_node("p-text").and_then(Node::text), Some("a"));
}

#[test]
fn test_identical_modify_notifies_once() {
    let mut graph = fixture();
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    let _sub = graph.subscribe("p-text", move |_| counter.set(counter.get() + 1));

    let mut edited = graph.get_node("p-text").cloned().unwrap();
    edited.set_text("changed".to_string());

    assert_eq!(graph.modify_nodes(vec![edited.clone()], ModifyOptions::default()), 1);
    assert_eq!(graph.modify_nodes(vec![edited], ModifyOptions::default()), 0);
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_edit_lock_suppresses_only_the_locked_topic() {
    let mut graph = fixture();
    let own = Rc::new(Cell::new(0));
    let section = Rc::new(Cell::new(0));

    let counter = own.clone();
    let _own = graph.subscribe("p-text", move |_| counter.set(counter.get() + 1));
    let counter = section.clone();
    let _section = graph.subscribe("hero", move |_| counter.set(counter.get() + 1));

    graph.lock_editing("p-text");
    let mut edited = graph.get_node("p-text").cloned().unwrap();
    edited.set_text("typing".to_string());
    graph.modify_nodes(vec![edited], ModifyOptions::default());

    assert_eq!(own.get(), 0);
    assert_eq!(section.get(), 1);

    graph.release_edit_lock();
    graph.notify_node("p-text");
    assert_eq!(own.get(), 1);
}

#[test]
fn test_underflow_is_a_noop() {
    let mut graph = fixture();
    let before = graph.store().clone();
    assert!(!graph.undo());
    assert!(!graph.redo());
    assert_eq!(graph.store(), &before);
}

#[test]
fn test_deleting_a_pane_keeps_page_pane_ids_in_step() {
    let mut graph = fixture();
    graph.delete_node("hero");

    match &graph.get_node("page").unwrap().kind {
        NodeKind::Page { pane_ids, .. } => assert_eq!(pane_ids, &vec!["footer".to_string()]),
        other => panic!("expected a page, got {:?}", other),
    }

    graph.undo();
    match &graph.get_node("page").unwrap().kind {
        NodeKind::Page { pane_ids, .. } => {
            assert_eq!(pane_ids, &vec!["hero".to_string(), "footer".to_string()])
        }
        other => panic!("expected a page, got {:?}", other),
    }
}

fn dirty_ids(graph: &DocumentGraph) -> Vec<String> {
    graph.get_dirty_nodes().into_iter().map(|n| n.id).collect()
}

#[test]
fn test_undo_after_save_reports_the_reverted_nodes() {
    let mut graph = fixture();
    let mut edited = graph.get_node("p-text").cloned().unwrap();
    edited.set_text("saved".to_string());
    graph.modify_nodes(vec![edited], ModifyOptions::default());
    graph.clear_dirty();

    assert!(graph.undo());
    assert_eq!(graph.get_node("p-text").and_then(Node::text), Some("0123456789"));
    assert_eq!(dirty_ids(&graph), vec!["hero".to_string(), "p-text".to_string()]);

    graph.clear_dirty();
    assert!(graph.redo());
    assert_eq!(dirty_ids(&graph), vec!["hero".to_string(), "p-text".to_string()]);
}

#[test]
fn test_undoing_a_saved_delete_reports_the_restored_subtree() {
    let mut graph = fixture();
    graph.delete_node("li-1-text");
    graph.clear_dirty();

    assert!(graph.undo());
    let dirty = dirty_ids(&graph);
    for id in ["hero", "li-1", "li-1-text"] {
        assert!(dirty.contains(&id.to_string()), "{} missing from {:?}", id, dirty);
    }

    graph.clear_dirty();
    assert!(graph.redo());
    assert!(graph.get_node("li-1").is_none());
    assert_eq!(dirty_ids(&graph), vec!["hero".to_string()]);
}

#[test]
fn test_merged_modifies_undo_as_one_step() {
    let mut graph = fixture();
    let merge = ModifyOptions {
        merge: true,
        ..ModifyOptions::default()
    };

    for text in ["H", "He", "Hey"] {
        let mut edited = graph.get_node("p-text").cloned().unwrap();
        edited.set_text(text.to_string());
        assert_eq!(graph.modify_nodes(vec![edited], merge), 1);
    }
    assert_eq!(graph.history().undo_levels(), 1);

    assert!(graph.undo());
    assert_eq!(graph.get_node("p-text").and_then(Node::text), Some("0123456789"));
    assert!(!graph.can_undo());

    assert!(graph.redo());
    assert_eq!(graph.get_node("p-text").and_then(Node::text), Some("Hey"));
}

#[test]
fn test_reinserting_a_node_under_its_descendant_is_rejected() {
    let mut graph = fixture();
    assert!(!graph.add_node(node("md", Some("p"), NodeKind::markdown())));
    assert_eq!(graph.get_node("md").and_then(|n| n.parent_id.as_deref()), Some("hero"));
    assert_integrity(&graph);

    assert!(graph.delete_node("p"));
    assert!(graph.get_node("p-text").is_none());
    assert_integrity(&graph);
}
