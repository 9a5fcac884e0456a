//! # Document Graph
//!
//! One editable document: the node store, its undo history, the notification
//! bus and the edit lock, owned together.
//!
//! There is no implicit default instance. Callers construct the graph they
//! need (a real document, or a [`DocumentGraph::preview`] for template trees)
//! and pass it explicitly.
//!
//! ## Lifecycle of a mutation
//!
//! ```text
//! add / modify / delete / move
//!     ↓
//! NodeStore      update records + adjacency index
//!     ↓
//! History        push one value patch (unless suppressed)
//!     ↓
//! Notifications  node topic (unless edit-locked) + bubble topic
//! ```
//!
//! Mutating operations live in `mutations.rs`, template insertion in
//! `templates.rs`, selection wrapping in `range_wrap.rs` and persistence
//! queries in `dirty.rs`.

use crate::edit_lock::EditLock;
use crate::errors::{EditorError, EditorResult};
use crate::history::{AddPatchOptions, History, HistoryStep, Patch};
use crate::node::{Node, NodeKind, NodeType};
use crate::notifications::{bubble_target, NotificationBus, Subscription, ROOT_TOPIC};
use crate::store::{IntegrityViolation, NodeStore};
use pageweave_common::{EngineConfig, IdGenerator};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Editable document graph
#[derive(Debug)]
pub struct DocumentGraph {
    pub(crate) store: NodeStore,
    pub(crate) history: History,
    pub(crate) notifications: NotificationBus,
    pub(crate) edit_lock: EditLock,
    pub(crate) ids: IdGenerator,
    pub(crate) config: EngineConfig,
}

impl DocumentGraph {
    pub fn new(config: EngineConfig) -> Self {
        let history = if config.record_history {
            History::new(config.history_capacity, config.merge_window())
        } else {
            History::disabled()
        };

        Self {
            store: NodeStore::new(),
            history,
            notifications: NotificationBus::new(),
            edit_lock: EditLock::new(),
            ids: IdGenerator::new(&config.id_seed),
            config,
        }
    }

    /// Graph for template and preview trees; never records history
    pub fn preview() -> Self {
        Self::new(EngineConfig::preview())
    }

    /// Rebuild a graph from a flat node list in document order.
    ///
    /// Child order follows list order. Nothing is recorded in history and
    /// nodes whose parent is not (yet) known are skipped.
    pub fn from_nodes(config: EngineConfig, nodes: Vec<Node>) -> Self {
        let mut graph = Self::new(config);
        let mut skipped = 0;

        for node in nodes {
            match node.parent_id.clone() {
                None if graph.store.root_id().is_none() => {
                    graph.store.put(node);
                }
                Some(parent_id) if graph.store.contains(&parent_id) => {
                    let id = node.id.clone();
                    graph.store.put(node);
                    graph.store.link(&id, &parent_id, None);
                }
                _ => skipped += 1,
            }
        }

        debug!(nodes = graph.store.len(), skipped, "Document graph loaded");
        graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Fresh sortable identifier from this graph's generator
    pub fn new_id(&mut self) -> String {
        self.ids.new_id()
    }

    // Read API

    pub fn root_id(&self) -> Option<&str> {
        self.store.root_id()
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.store.get(id)
    }

    /// [`get_node`](Self::get_node) for callers that treat a missing id as an error
    pub fn require_node(&self, id: &str) -> EditorResult<&Node> {
        self.store
            .get(id)
            .ok_or_else(|| EditorError::UnknownNode(id.to_string()))
    }

    pub fn get_child_node_ids(&self, parent_id: &str) -> Vec<String> {
        self.store.child_ids(parent_id).to_vec()
    }

    /// Full id → node snapshot
    pub fn all_nodes(&self) -> HashMap<String, Node> {
        self.store.nodes().clone()
    }

    /// `id` and all its descendants, children before parents
    pub fn get_nodes_recursively(&self, id: &str) -> Vec<Node> {
        self.store
            .post_order(id)
            .iter()
            .filter_map(|n| self.store.get(n).cloned())
            .collect()
    }

    /// Nearest node of `node_type`, checking `id` itself first
    pub fn get_closest_node_type_from_id(&self, id: &str, node_type: NodeType) -> Option<String> {
        self.store.closest_of_type(id, node_type)
    }

    pub fn is_pane(&self, id: &str) -> bool {
        self.store.get(id).map(Node::is_pane).unwrap_or(false)
    }

    pub fn is_layout_grid(&self, id: &str) -> bool {
        self.store.get(id).map(Node::is_layout_grid).unwrap_or(false)
    }

    pub fn is_text_leaf(&self, id: &str) -> bool {
        self.store.get(id).map(Node::is_text_leaf).unwrap_or(false)
    }

    pub fn is_list(&self, id: &str) -> bool {
        self.store.get(id).map(Node::is_list).unwrap_or(false)
    }

    pub fn is_list_item(&self, id: &str) -> bool {
        self.store.get(id).map(Node::is_list_item).unwrap_or(false)
    }

    /// Nodes in document pre-order; feeding this to [`DocumentGraph::from_nodes`]
    /// reproduces the same tree
    pub fn to_flat_nodes(&self) -> Vec<Node> {
        self.store
            .pre_order()
            .iter()
            .filter_map(|id| self.store.get(id).cloned())
            .collect()
    }

    pub fn check_integrity(&self) -> Vec<IntegrityViolation> {
        self.store.check_integrity()
    }

    // Notifications

    pub fn notifications(&self) -> &NotificationBus {
        &self.notifications
    }

    pub fn subscribe(&self, topic: impl Into<String>, callback: impl Fn(&str) + 'static) -> Subscription {
        self.notifications.subscribe(topic, callback)
    }

    /// Notify `id`'s own topic (unless it is edit-locked) and its bubble topic
    pub fn notify_node(&self, id: &str) {
        self.notify_nodes([id]);
    }

    /// Notify several nodes, reaching each topic at most once
    pub(crate) fn notify_nodes<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut topics: Vec<String> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut push = |topic: String| {
            if seen.insert(topic.clone()) {
                topics.push(topic);
            }
        };

        for id in ids {
            if !self.store.contains(id) {
                if id == ROOT_TOPIC {
                    push(ROOT_TOPIC.to_string());
                }
                continue;
            }
            if !self.edit_lock.is_locked(id) {
                push(id.to_string());
            }
            if let Some(target) = bubble_target(&self.store, id) {
                if target != id {
                    push(target);
                }
            }
        }

        for topic in topics {
            self.notifications.notify(&topic);
        }
    }

    // Edit lock

    /// Suppress notifications aimed at exactly `id` while it is being edited
    pub fn lock_editing(&mut self, id: impl Into<String>) {
        self.edit_lock.lock(id);
    }

    pub fn release_edit_lock(&mut self) -> Option<String> {
        self.edit_lock.release()
    }

    pub fn locked_node(&self) -> Option<&str> {
        self.edit_lock.locked_node()
    }

    // History

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn clear_history(&mut self) {
        self.history.clear_history();
    }

    /// Revert the newest history entry; `false` when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        match self.history.undo(&mut self.store) {
            Some(step) => {
                self.after_history_step(&step);
                true
            }
            None => false,
        }
    }

    /// Replay the most recently undone entry
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.store) {
            Some(step) => {
                self.after_history_step(&step);
                true
            }
            None => false,
        }
    }

    /// Restored records carry whatever dirty flag they were captured with, so
    /// everything the step wrote is stamped again for the next save
    fn after_history_step(&mut self, step: &HistoryStep) {
        if let Some(locked) = self.edit_lock.locked_node() {
            if !self.store.contains(locked) {
                self.edit_lock.release();
            }
        }

        for id in &step.records {
            if let Some(node) = self.store.get_mut(id) {
                node.dirty = true;
            }
        }
        // Includes the surviving parents of removed nodes
        for id in &step.touched {
            self.mark_aggregates_dirty(id);
        }

        self.notify_nodes(step.touched.iter().map(String::as_str).chain([ROOT_TOPIC]));
    }

    pub(crate) fn record(&mut self, patch: Patch, merge: bool) {
        self.history.add_patch(patch, AddPatchOptions { merge });
    }

    /// Keep a page's declared section list in step with its children.
    /// Returns the patch for the change, if any.
    pub(crate) fn sync_page_panes(&mut self, page_id: &str) -> Option<Patch> {
        let child_panes: Vec<String> = self
            .store
            .child_ids(page_id)
            .iter()
            .filter(|c| self.store.node_type(c) == Some(NodeType::Pane))
            .cloned()
            .collect();

        let before = self.store.get(page_id)?.clone();
        let mut after = before.clone();
        match &mut after.kind {
            NodeKind::Page { pane_ids, .. } if *pane_ids != child_panes => {
                *pane_ids = child_panes;
            }
            _ => return None,
        }

        after.dirty = true;
        self.store.put(after.clone());
        Some(Patch::Replace {
            before: vec![before],
            after: vec![after],
        })
    }

    /// Stamp the aggregates owning `id` as dirty: its nearest section and,
    /// below that, its nearest layout grid. A section is its own aggregate.
    pub(crate) fn mark_aggregates_dirty(&mut self, id: &str) {
        let Some(node_type) = self.store.node_type(id) else {
            return;
        };
        if node_type == NodeType::Pane {
            if let Some(node) = self.store.get_mut(id) {
                node.dirty = true;
            }
            return;
        }
        if !node_type.is_structural() {
            return;
        }

        let ancestors = self.store.ancestors(id);
        let pane = ancestors
            .iter()
            .find(|a| self.store.node_type(a) == Some(NodeType::Pane))
            .cloned();
        let grid = ancestors
            .iter()
            .take_while(|a| Some(*a) != pane.as_ref())
            .find(|a| self.store.node_type(a) == Some(NodeType::LayoutGrid))
            .cloned();

        for aggregate in pane.into_iter().chain(grid) {
            if let Some(node) = self.store.get_mut(&aggregate) {
                node.dirty = true;
            }
        }
    }
}

impl Default for DocumentGraph {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn flat_doc() -> Vec<Node> {
        vec![
            Node::new("doc", None, NodeKind::Document { title: "Site".to_string() }),
            Node::new("page", Some("doc".to_string()), NodeKind::Page {
                title: "Home".to_string(),
                slug: "home".to_string(),
                pane_ids: vec!["pane".to_string()],
                is_context: false,
            }),
            Node::new("pane", Some("page".to_string()), NodeKind::pane("Hero")),
            Node::new("grid", Some("pane".to_string()), NodeKind::LayoutGrid {
                columns: Default::default(),
                classes: Default::default(),
            }),
            Node::new("col", Some("grid".to_string()), NodeKind::markdown()),
            Node::new("p", Some("col".to_string()), NodeKind::tag("p")),
            Node::new("t", Some("p".to_string()), NodeKind::text("Hi")),
        ]
    }

    #[test]
    fn test_from_nodes_round_trips_through_flat_export() {
        let graph = DocumentGraph::from_nodes(EngineConfig::default(), flat_doc());
        assert_eq!(graph.root_id(), Some("doc"));
        assert!(graph.check_integrity().is_empty());
        assert!(!graph.can_undo());

        let rebuilt = DocumentGraph::from_nodes(EngineConfig::default(), graph.to_flat_nodes());
        assert_eq!(rebuilt.store(), graph.store());
    }

    #[test]
    fn test_from_nodes_skips_orphans() {
        let mut nodes = flat_doc();
        nodes.push(Node::new("stray", Some("nowhere".to_string()), NodeKind::markdown()));

        let graph = DocumentGraph::from_nodes(EngineConfig::default(), nodes);
        assert!(graph.get_node("stray").is_none());
    }

    #[test]
    fn test_read_helpers() {
        let graph = DocumentGraph::from_nodes(EngineConfig::default(), flat_doc());

        assert_eq!(graph.get_child_node_ids("col"), vec!["p".to_string()]);
        assert!(graph.get_child_node_ids("missing").is_empty());
        assert_eq!(
            graph.get_closest_node_type_from_id("t", NodeType::LayoutGrid),
            Some("grid".to_string())
        );
        assert!(graph.is_pane("pane"));
        assert!(graph.is_layout_grid("grid"));
        assert!(graph.is_text_leaf("t"));
        assert!(!graph.is_pane("missing"));
        assert!(graph.require_node("pane").is_ok());
        assert!(matches!(graph.require_node("missing"), Err(EditorError::UnknownNode(id)) if id == "missing"));

        let ids: Vec<String> = graph.get_nodes_recursively("grid").into_iter().map(|n| n.id).collect();
        assert_eq!(ids, ["t", "p", "col", "grid"]);
    }

    #[test]
    fn test_notify_bubbles_and_respects_edit_lock() {
        let mut graph = DocumentGraph::from_nodes(EngineConfig::default(), flat_doc());
        let node_hits = Rc::new(Cell::new(0));
        let pane_hits = Rc::new(Cell::new(0));
        let root_hits = Rc::new(Cell::new(0));

        let counter = node_hits.clone();
        let _a = graph.subscribe("t", move |_| counter.set(counter.get() + 1));
        let counter = pane_hits.clone();
        let _b = graph.subscribe("pane", move |_| counter.set(counter.get() + 1));
        let counter = root_hits.clone();
        let _c = graph.subscribe(ROOT_TOPIC, move |_| counter.set(counter.get() + 1));

        graph.notify_node("t");
        assert_eq!((node_hits.get(), pane_hits.get(), root_hits.get()), (1, 1, 0));

        graph.lock_editing("t");
        graph.notify_node("t");
        assert_eq!((node_hits.get(), pane_hits.get()), (1, 2));

        graph.release_edit_lock();
        graph.notify_node("pane");
        assert_eq!((pane_hits.get(), root_hits.get()), (3, 1));

        graph.notify_node("missing");
        assert_eq!(node_hits.get(), 1);
    }

    #[test]
    fn test_node_named_root_is_not_the_alias() {
        let mut nodes = flat_doc();
        nodes.push(Node::new("root", Some("p".to_string()), NodeKind::text("!")));
        let mut graph = DocumentGraph::from_nodes(EngineConfig::default(), nodes);

        let node_hits = Rc::new(Cell::new(0));
        let pane_hits = Rc::new(Cell::new(0));
        let counter = node_hits.clone();
        let _a = graph.subscribe("root", move |_| counter.set(counter.get() + 1));
        let counter = pane_hits.clone();
        let _b = graph.subscribe("pane", move |_| counter.set(counter.get() + 1));

        graph.lock_editing("root");
        graph.notify_node("root");
        assert_eq!((node_hits.get(), pane_hits.get()), (0, 1));

        graph.release_edit_lock();
        graph.notify_node("root");
        assert_eq!((node_hits.get(), pane_hits.get()), (1, 2));
    }

    #[test]
    fn test_mark_aggregates_dirty_hits_pane_and_grid() {
        let mut graph = DocumentGraph::from_nodes(EngineConfig::default(), flat_doc());
        graph.mark_aggregates_dirty("t");

        assert!(graph.get_node("pane").unwrap().dirty);
        assert!(graph.get_node("grid").unwrap().dirty);
        assert!(!graph.get_node("col").unwrap().dirty);
        assert!(!graph.get_node("page").unwrap().dirty);
    }
}
