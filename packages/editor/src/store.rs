//! # Node Store
//!
//! Owns every node record and the parent → ordered-children adjacency index.
//!
//! The store only knows about records and links. It neither records history
//! nor notifies anyone; [`DocumentGraph`](crate::DocumentGraph) wraps these
//! primitives with both. Every primitive tolerates unknown identifiers.

use crate::node::{Node, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Where a node sits inside its parent's child list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPosition {
    pub id: String,
    pub parent_id: String,
    pub index: usize,
}

/// Node records plus the adjacency index.
///
/// Cloning the store is how full-state snapshots are taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStore {
    nodes: HashMap<String, Node>,
    children: HashMap<String, Vec<String>>,
    root_id: Option<String>,
}

/// A broken tree invariant found by [`NodeStore::check_integrity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    MissingRoot,
    ExtraRoot { id: String },
    MissingParent { id: String, parent_id: String },
    NotLinked { id: String },
    LinkedMoreThanOnce { id: String, count: usize },
    WrongParent { id: String, listed_under: String },
    DanglingChild { parent_id: String, child_id: String },
    /// Never reached walking down from the root
    Unreachable { id: String },
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    pub fn nodes(&self) -> &HashMap<String, Node> {
        &self.nodes
    }

    pub fn node_type(&self, id: &str) -> Option<NodeType> {
        self.nodes.get(id).map(Node::node_type)
    }

    /// Ordered child identifiers; empty for leaves and unknown ids
    pub fn child_ids(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent_id(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.parent_id.as_deref())
    }

    pub fn position(&self, id: &str) -> Option<LinkPosition> {
        let parent_id = self.parent_id(id)?;
        let index = self.child_ids(parent_id).iter().position(|c| c == id)?;
        Some(LinkPosition {
            id: id.to_string(),
            parent_id: parent_id.to_string(),
            index,
        })
    }

    /// Insert or overwrite a record without touching links.
    ///
    /// A parentless node becomes the root when none exists yet.
    pub fn put(&mut self, node: Node) -> Option<Node> {
        if node.parent_id.is_none() && self.root_id.is_none() {
            self.root_id = Some(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node)
    }

    /// Add `id` to `parent_id`'s child list at `index` (clamped), or at the end.
    /// Already-linked ids are left where they are.
    pub fn link(&mut self, id: &str, parent_id: &str, index: Option<usize>) {
        let list = self.children.entry(parent_id.to_string()).or_default();
        if list.iter().any(|c| c == id) {
            return;
        }
        let at = index.unwrap_or(list.len()).min(list.len());
        list.insert(at, id.to_string());
    }

    /// Remove `id` from its parent's child list, returning where it was
    pub fn unlink(&mut self, id: &str) -> Option<LinkPosition> {
        let position = self.position(id)?;
        if let Some(list) = self.children.get_mut(&position.parent_id) {
            list.remove(position.index);
            if list.is_empty() {
                self.children.remove(&position.parent_id);
            }
        }
        Some(position)
    }

    /// Move `id` under `parent_id` at `index`, updating its record
    pub fn reparent(&mut self, id: &str, parent_id: &str, index: Option<usize>) {
        self.unlink(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent_id = Some(parent_id.to_string());
        }
        self.link(id, parent_id, index);
    }

    /// Replace the whole child list of `parent_id`
    pub fn set_child_ids(&mut self, parent_id: &str, ids: Vec<String>) {
        if ids.is_empty() {
            self.children.remove(parent_id);
        } else {
            self.children.insert(parent_id.to_string(), ids);
        }
    }

    /// Drop records and links for every id given. Children of purged ids are
    /// expected to be in the list too.
    pub fn purge<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.unlink(id);
            self.children.remove(id);
            self.nodes.remove(id);
            if self.root_id.as_deref() == Some(id) {
                self.root_id = None;
            }
        }
    }

    /// Put records back and relink them at their recorded positions
    pub fn restore(&mut self, nodes: &[Node], positions: &[LinkPosition]) {
        for node in nodes {
            self.put(node.clone());
        }

        let mut ordered: Vec<&LinkPosition> = positions.iter().collect();
        ordered.sort_by_key(|p| p.index);
        for position in ordered {
            self.link(&position.id, &position.parent_id, Some(position.index));
        }
    }

    /// Descendant ids in post-order (children before parents), `id` last
    pub fn post_order(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if self.contains(id) {
            self.collect_post_order(id, &mut HashSet::new(), &mut out);
        }
        out
    }

    // Visited ids are skipped so a corrupted index cannot recurse forever
    fn collect_post_order<'a>(&'a self, id: &'a str, seen: &mut HashSet<&'a str>, out: &mut Vec<String>) {
        if !seen.insert(id) {
            return;
        }
        for child in self.child_ids(id) {
            self.collect_post_order(child, seen, out);
        }
        out.push(id.to_string());
    }

    /// Pre-order walk from the root
    pub fn pre_order(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self.root_id.as_deref().into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id.to_string());
            for child in self.child_ids(id).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Ancestors of `id`, nearest first, excluding `id`
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.parent_id(id);
        while let Some(parent) = current {
            if out.iter().any(|a| a == parent) {
                break;
            }
            out.push(parent.to_string());
            current = self.parent_id(parent);
        }
        out
    }

    /// `true` when `ancestor_id` is `id` or one of its ancestors
    pub fn is_within(&self, id: &str, ancestor_id: &str) -> bool {
        id == ancestor_id || self.ancestors(id).iter().any(|a| a == ancestor_id)
    }

    /// Nearest node of `node_type`, starting at `id` itself
    pub fn closest_of_type(&self, id: &str, node_type: NodeType) -> Option<String> {
        let node = self.nodes.get(id)?;
        if node.node_type() == node_type {
            return Some(id.to_string());
        }
        self.ancestors(id)
            .into_iter()
            .find(|a| self.node_type(a) == Some(node_type))
    }

    /// Verify the tree invariants of the node map and adjacency index
    pub fn check_integrity(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        match &self.root_id {
            Some(root) if self.contains(root) => {}
            _ if self.nodes.is_empty() => {}
            _ => violations.push(IntegrityViolation::MissingRoot),
        }

        let mut link_counts: HashMap<&str, usize> = HashMap::new();
        for (parent_id, list) in &self.children {
            for child_id in list {
                *link_counts.entry(child_id.as_str()).or_default() += 1;
                match self.nodes.get(child_id) {
                    None => violations.push(IntegrityViolation::DanglingChild {
                        parent_id: parent_id.clone(),
                        child_id: child_id.clone(),
                    }),
                    Some(child) if child.parent_id.as_deref() != Some(parent_id.as_str()) => {
                        violations.push(IntegrityViolation::WrongParent {
                            id: child_id.clone(),
                            listed_under: parent_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let reachable: HashSet<String> = self.pre_order().into_iter().collect();

        let mut ids: Vec<&String> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            if self.root_id.is_some() && !reachable.contains(id) {
                violations.push(IntegrityViolation::Unreachable { id: id.clone() });
            }
            let node = &self.nodes[id];
            match &node.parent_id {
                None => {
                    if self.root_id.as_deref() != Some(id.as_str()) {
                        violations.push(IntegrityViolation::ExtraRoot { id: id.clone() });
                    }
                }
                Some(parent_id) => {
                    if !self.contains(parent_id) {
                        violations.push(IntegrityViolation::MissingParent {
                            id: id.clone(),
                            parent_id: parent_id.clone(),
                        });
                    }
                    match link_counts.get(id.as_str()).copied().unwrap_or(0) {
                        0 => violations.push(IntegrityViolation::NotLinked { id: id.clone() }),
                        1 => {}
                        count => violations.push(IntegrityViolation::LinkedMoreThanOnce {
                            id: id.clone(),
                            count,
                        }),
                    }
                }
            }
        }

        violations
    }
}
