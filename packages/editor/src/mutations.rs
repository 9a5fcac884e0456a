//! # Graph Mutations
//!
//! add / modify / delete / move on [`DocumentGraph`].
//!
//! ## Semantics
//!
//! ### Add
//! - A parentless node becomes the root when none exists; a second root is rejected
//! - Otherwise the node is appended to its parent's child list
//! - Pages also adopt their pre-declared sections
//! - Re-inserting an existing id overwrites it, unless the new parent sits
//!   inside that node's own subtree
//!
//! ### Modify
//! - Deep-equal input (ignoring the dirty flag) is a no-op
//! - Changed nodes are stamped dirty, and so are their owning section and grid
//! - One undo step per changed node unless history is suppressed
//!
//! ### Delete
//! - Removes the node and every descendant
//! - The last content of a list item takes the item with it, and the last
//!   item of a list takes the list with it
//!
//! ### Move
//! - Within a parent, or across parents of the same node type
//! - Anything else is rejected with a warning and leaves the graph untouched
//!
//! Unknown identifiers are silently ignored everywhere: references from UI
//! callbacks may be stale by the time they arrive.

use crate::graph::DocumentGraph;
use crate::history::Patch;
use crate::node::{Node, NodeKind, NodeType};
use crate::notifications::ROOT_TOPIC;
use crate::store::LinkPosition;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Options for [`DocumentGraph::modify_nodes`]
#[derive(Debug, Clone, Copy)]
pub struct ModifyOptions {
    pub notify: bool,
    pub record_history: bool,
    /// Coalesce with the previous undo step when inside the merge window
    pub merge: bool,
}

impl Default for ModifyOptions {
    fn default() -> Self {
        Self {
            notify: true,
            record_history: true,
            merge: false,
        }
    }
}

/// Direction for [`DocumentGraph::move_node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Side of a reference node to place something on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    Before,
    #[default]
    After,
}

impl DocumentGraph {
    /// Insert one node. Returns `false` when it was rejected.
    pub fn add_node(&mut self, node: Node) -> bool {
        self.add_nodes(vec![node]) == 1
    }

    /// Insert several nodes as one undo step, in list order. Parents must
    /// either exist already or appear earlier in the list.
    /// Returns how many nodes were inserted.
    pub fn add_nodes(&mut self, nodes: Vec<Node>) -> usize {
        let needs_snapshot = nodes.iter().any(|n| {
            self.store.contains(&n.id)
                || matches!(&n.kind, NodeKind::Page { pane_ids, .. } if !pane_ids.is_empty())
        });
        let before = needs_snapshot.then(|| self.store.clone());

        let inserted = self.insert_nodes(nodes);
        if inserted.is_empty() {
            return 0;
        }

        let mut page_parents: Vec<String> = Vec::new();
        for id in &inserted {
            self.mark_aggregates_dirty(id);
            if let Some(parent_id) = self.store.parent_id(id) {
                if self.store.node_type(parent_id) == Some(NodeType::Page)
                    && !page_parents.iter().any(|p| p == parent_id)
                {
                    page_parents.push(parent_id.to_string());
                }
            }
        }

        self.history.begin_batch("Add nodes");
        let mut patches = Vec::new();
        for page_id in &page_parents {
            patches.extend(self.sync_page_panes(page_id));
        }
        match before {
            Some(before) => self.record(
                Patch::Snapshot {
                    before: Box::new(before),
                    after: Box::new(self.store.clone()),
                },
                false,
            ),
            None => {
                let patch = self.add_patch_for(&inserted);
                self.record(patch, false);
                for patch in patches {
                    self.record(patch, false);
                }
            }
        }
        self.history.end_batch();

        debug!(count = inserted.len(), "Nodes added");
        let mut topics: Vec<&str> = Vec::new();
        for id in &inserted {
            match self.store.parent_id(id) {
                Some(parent_id) => topics.push(parent_id),
                None => topics.push(ROOT_TOPIC),
            }
        }
        self.notify_nodes(topics.iter().copied().chain(inserted.iter().map(String::as_str)));

        inserted.len()
    }

    /// Store-level insertion without history or notification. Returns the
    /// ids that made it in, in insertion order.
    pub(crate) fn insert_nodes(&mut self, nodes: Vec<Node>) -> Vec<String> {
        let mut inserted = Vec::new();

        for mut node in nodes {
            match node.parent_id.clone() {
                None => {
                    if let Some(root) = self.store.root_id() {
                        if root != node.id {
                            warn!(node_id = %node.id, root_id = %root, "Rejected second root node");
                            continue;
                        }
                    }
                    node.dirty = true;
                    inserted.push(node.id.clone());
                    self.store.put(node);
                }
                Some(parent_id) => {
                    if !self.store.contains(&parent_id) {
                        debug!(node_id = %node.id, parent_id = %parent_id, "Skipping node with unknown parent");
                        continue;
                    }
                    if self.store.is_within(&parent_id, &node.id) {
                        warn!(node_id = %node.id, parent_id = %parent_id, "Rejected insert into own subtree");
                        continue;
                    }

                    let id = node.id.clone();
                    let previous_parent = self.store.parent_id(&id).map(str::to_string);
                    if previous_parent.as_deref().is_some_and(|p| p != parent_id) {
                        self.store.unlink(&id);
                    }

                    let declared_panes = match &node.kind {
                        NodeKind::Page { pane_ids, .. } => pane_ids.clone(),
                        _ => Vec::new(),
                    };

                    node.dirty = true;
                    self.store.put(node);
                    self.store.link(&id, &parent_id, None);

                    for pane_id in declared_panes {
                        if pane_id != id && self.store.contains(&pane_id) && !self.store.is_within(&id, &pane_id) {
                            self.store.reparent(&pane_id, &id, None);
                            if let Some(pane) = self.store.get_mut(&pane_id) {
                                pane.dirty = true;
                            }
                        }
                    }

                    inserted.push(id);
                }
            }
        }

        inserted
    }

    /// Add patch capturing `ids` as they now sit in the store
    pub(crate) fn add_patch_for(&self, ids: &[String]) -> Patch {
        Patch::Add {
            nodes: ids.iter().filter_map(|id| self.store.get(id).cloned()).collect(),
            positions: ids.iter().filter_map(|id| self.store.position(id)).collect(),
        }
    }

    /// Replace stored nodes with the given versions.
    /// Returns the number of nodes that actually changed.
    pub fn modify_nodes(&mut self, nodes: Vec<Node>, options: ModifyOptions) -> usize {
        let mut changed: Vec<String> = Vec::new();

        for mut node in nodes {
            let Some(current) = self.store.get(&node.id) else {
                debug!(node_id = %node.id, "Ignoring modify of unknown node");
                continue;
            };
            if current.content_eq(&node) {
                continue;
            }
            if current.parent_id != node.parent_id {
                warn!(node_id = %node.id, "modify_nodes does not relink; keeping current parent");
                node.parent_id = current.parent_id.clone();
                if current.content_eq(&node) {
                    continue;
                }
            }

            let before = current.clone();
            node.dirty = true;
            self.store.put(node.clone());
            self.mark_aggregates_dirty(&node.id);

            if options.record_history {
                self.record(
                    Patch::Replace {
                        before: vec![before],
                        after: vec![node.clone()],
                    },
                    options.merge,
                );
            }
            changed.push(node.id);
        }

        if options.notify {
            self.notify_nodes(changed.iter().map(String::as_str));
        }
        changed.len()
    }

    /// Delete a node and its subtree, collapsing list containers left empty.
    /// Returns `false` for unknown ids and the root.
    #[instrument(skip(self))]
    pub fn delete_node(&mut self, id: &str) -> bool {
        let Some(target) = self.resolve_delete_target(id) else {
            return false;
        };
        if target != id {
            debug!(requested = %id, target = %target, "Delete redirected");
        }

        let Some(parent_id) = self.store.parent_id(&target).map(str::to_string) else {
            warn!(node_id = %target, "Refusing to delete the root node");
            return false;
        };

        self.remove_subtrees(&[target], "Delete node");
        self.notify_nodes([parent_id.as_str()]);
        true
    }

    /// Delete every child of `parent_id` as one undo step. Returns how many
    /// children were removed.
    pub fn delete_children(&mut self, parent_id: &str) -> usize {
        let children = self.store.child_ids(parent_id).to_vec();
        if children.is_empty() {
            return 0;
        }

        self.remove_subtrees(&children, "Delete children");
        self.notify_nodes([parent_id]);
        children.len()
    }

    /// Remove whole subtrees and record one history entry for them
    pub(crate) fn remove_subtrees(&mut self, roots: &[String], description: &str) {
        let mut ids: Vec<String> = Vec::new();
        for root in roots {
            ids.extend(self.store.post_order(root));
        }
        if ids.is_empty() {
            return;
        }

        for root in roots {
            if let Some(parent_id) = self.store.parent_id(root).map(str::to_string) {
                self.mark_aggregates_dirty(&parent_id);
            }
        }

        let nodes: Vec<Node> = ids.iter().filter_map(|id| self.store.get(id).cloned()).collect();
        let positions: Vec<LinkPosition> = ids.iter().filter_map(|id| self.store.position(id)).collect();
        let pages: HashSet<String> = positions
            .iter()
            .filter(|p| self.store.node_type(&p.parent_id) == Some(NodeType::Page))
            .map(|p| p.parent_id.clone())
            .collect();

        self.store.purge(ids.iter().map(String::as_str));

        if let Some(locked) = self.edit_lock.locked_node() {
            if ids.iter().any(|id| id == locked) {
                self.edit_lock.release();
            }
        }

        self.history.begin_batch(description);
        self.record(Patch::Remove { nodes, positions }, false);
        for page_id in pages {
            if let Some(patch) = self.sync_page_panes(&page_id) {
                self.record(patch, false);
            }
        }
        self.history.end_batch();
    }

    /// Apply the list-collapse rules to a delete request:
    /// 1. the only meaningful child of a list item deletes the item instead
    /// 2. the only item of a list deletes the list instead
    fn resolve_delete_target(&self, id: &str) -> Option<String> {
        self.store.get(id)?;
        let mut target = id.to_string();

        if let Some(parent) = self.store.parent_id(id).and_then(|p| self.store.get(p)) {
            if parent.is_list_item() && self.is_sole_meaningful_child(id, &parent.id) {
                target = parent.id.clone();
            }
        }

        let target_is_item = self.store.get(&target).map(Node::is_list_item).unwrap_or(false);
        if target_is_item {
            if let Some(list) = self.store.parent_id(&target).and_then(|p| self.store.get(p)) {
                let items = self
                    .store
                    .child_ids(&list.id)
                    .iter()
                    .filter(|c| self.store.get(c).map(Node::is_list_item).unwrap_or(false))
                    .count();
                if list.is_list() && items == 1 {
                    target = list.id.clone();
                }
            }
        }

        Some(target)
    }

    fn is_sole_meaningful_child(&self, id: &str, parent_id: &str) -> bool {
        self.store
            .child_ids(parent_id)
            .iter()
            .filter(|c| c.as_str() != id)
            .all(|c| self.store.get(c).map(|n| !n.is_meaningful()).unwrap_or(true))
    }

    /// Swap a node with its neighbour. At the edge of its parent it hops into
    /// the neighbouring parent when that has the same node type.
    pub fn move_node(&mut self, id: &str, direction: MoveDirection) -> bool {
        let Some(position) = self.store.position(id) else {
            return false;
        };
        let siblings = self.store.child_ids(&position.parent_id).len();

        let destination = match direction {
            MoveDirection::Up if position.index > 0 => {
                Some((position.parent_id.clone(), position.index - 1))
            }
            MoveDirection::Down if position.index + 1 < siblings => {
                Some((position.parent_id.clone(), position.index + 1))
            }
            _ => self.neighbour_parent(&position.parent_id, direction).map(|neighbour| {
                let index = match direction {
                    MoveDirection::Up => self.store.child_ids(&neighbour).len(),
                    MoveDirection::Down => 0,
                };
                (neighbour, index)
            }),
        };

        match destination {
            Some((parent_id, index)) => self.relink(id, &parent_id, index),
            None => {
                warn!(node_id = %id, ?direction, "Node cannot move any further");
                false
            }
        }
    }

    fn neighbour_parent(&self, parent_id: &str, direction: MoveDirection) -> Option<String> {
        let position = self.store.position(parent_id)?;
        let uncles = self.store.child_ids(&position.parent_id);
        let index = match direction {
            MoveDirection::Up => position.index.checked_sub(1)?,
            MoveDirection::Down => position.index + 1,
        };
        let neighbour = uncles.get(index)?;
        (self.store.node_type(neighbour) == self.store.node_type(parent_id)).then(|| neighbour.clone())
    }

    /// Place `id` before or after `reference_id`. Crossing into a parent of a
    /// different node type is rejected.
    pub fn move_node_to(&mut self, id: &str, reference_id: &str, placement: Placement) -> bool {
        if id == reference_id {
            return false;
        }
        let (Some(current_parent), Some(target_parent)) = (
            self.store.parent_id(id).map(str::to_string),
            self.store.parent_id(reference_id).map(str::to_string),
        ) else {
            return false;
        };

        if self.store.is_within(&target_parent, id) {
            warn!(node_id = %id, reference_id = %reference_id, "Rejected move into own subtree");
            return false;
        }
        if current_parent != target_parent
            && self.store.node_type(&current_parent) != self.store.node_type(&target_parent)
        {
            warn!(
                node_id = %id,
                from = %current_parent,
                to = %target_parent,
                "Rejected move across parents of different node types"
            );
            return false;
        }

        let Some(reference_index) = self
            .store
            .child_ids(&target_parent)
            .iter()
            .filter(|c| c.as_str() != id)
            .position(|c| c == reference_id)
        else {
            return false;
        };
        let index = match placement {
            Placement::Before => reference_index,
            Placement::After => reference_index + 1,
        };

        self.relink(id, &target_parent, index)
    }

    /// Move `id` to `index` of `parent_id` (index counted without `id`)
    fn relink(&mut self, id: &str, parent_id: &str, index: usize) -> bool {
        let Some(from) = self.store.position(id) else {
            return false;
        };
        if from.parent_id == parent_id && from.index == index {
            return false;
        }

        self.mark_aggregates_dirty(id);
        self.store.reparent(id, parent_id, Some(index));
        if let Some(node) = self.store.get_mut(id) {
            node.dirty = true;
        }
        self.mark_aggregates_dirty(id);
        let Some(to) = self.store.position(id) else {
            return false;
        };

        self.history.begin_batch("Move node");
        self.record(
            Patch::Move {
                id: id.to_string(),
                from: from.clone(),
                to,
            },
            false,
        );
        for page_id in [from.parent_id.clone(), parent_id.to_string()] {
            if let Some(patch) = self.sync_page_panes(&page_id) {
                self.record(patch, false);
            }
        }
        self.history.end_batch();

        self.notify_nodes([from.parent_id.as_str(), parent_id, id]);
        true
    }
}
