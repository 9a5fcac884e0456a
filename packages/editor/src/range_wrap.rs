//! # Range Wrapping
//!
//! Encloses a character-level text selection in a new inline node (a span or
//! a link), and dissolves such wrappers again.
//!
//! ```text
//! p ─ text "0123456789"          wrap [2, 5)
//!                                  ↓
//! p ─ text "01"
//!   ─ span ─ text "234"
//!   ─ text "56789"
//! ```
//!
//! Splitting changes a variable number of nodes, so a wrap is recorded as one
//! whole-store snapshot patch rather than a minimal diff. This is the only
//! place besides the mutation layer that writes the store directly.

use crate::graph::DocumentGraph;
use crate::history::Patch;
use crate::node::{Node, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// A selection between two text leaves below `common_ancestor`.
/// Offsets count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    pub start_node: String,
    pub start_offset: usize,
    pub end_node: String,
    pub end_offset: usize,
    pub common_ancestor: String,
}

impl TextRange {
    /// Selection inside one text leaf
    pub fn within(node_id: impl Into<String>, ancestor: impl Into<String>, start: usize, end: usize) -> Self {
        let node_id = node_id.into();
        Self {
            start_node: node_id.clone(),
            start_offset: start,
            end_node: node_id,
            end_offset: end,
            common_ancestor: ancestor.into(),
        }
    }

    pub fn is_single_leaf(&self) -> bool {
        self.start_node == self.end_node
    }
}

/// Outcome of splitting one text leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub left: String,
    pub right: Option<String>,
}

/// Inline element created around a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapKind {
    Span,
    Anchor,
}

impl WrapKind {
    fn node_kind(self) -> NodeKind {
        match self {
            WrapKind::Span => NodeKind::tag("span"),
            WrapKind::Anchor => NodeKind::Tag {
                tag_name: "a".to_string(),
                text: None,
                attributes: BTreeMap::from([("href".to_string(), String::new())]),
                classes: BTreeMap::new(),
            },
        }
    }
}

/// Split `text` at a character offset
fn split_chars(text: &str, offset: usize) -> (String, String) {
    let at = text.char_indices().nth(offset).map(|(i, _)| i).unwrap_or(text.len());
    (text[..at].to_string(), text[at..].to_string())
}

impl DocumentGraph {
    /// Split a text leaf at `offset` (in characters).
    ///
    /// - at or past the end: nothing changes, the leaf is `left`
    /// - at zero: an empty leaf is inserted before it and becomes `left`
    /// - inside: the leaf keeps `[0, offset)` and a new leaf right after it
    ///   holds the rest
    ///
    /// Writes the store only; callers record history.
    pub(crate) fn split_text_node(&mut self, id: &str, offset: usize) -> Option<SplitResult> {
        let node = self.store.get(id)?.clone();
        let text = node.text()?.to_string();
        let position = self.store.position(id)?;

        if offset >= text.chars().count() {
            return Some(SplitResult {
                left: id.to_string(),
                right: None,
            });
        }

        if offset == 0 {
            let mut empty = node.clone();
            empty.id = self.ids.new_id();
            empty.set_text(String::new());
            empty.dirty = true;
            let left = empty.id.clone();
            self.store.put(empty);
            self.store.link(&left, &position.parent_id, Some(position.index));
            return Some(SplitResult {
                left,
                right: Some(id.to_string()),
            });
        }

        let (head, tail) = split_chars(&text, offset);

        let mut left = node.clone();
        left.set_text(head);
        left.dirty = true;
        self.store.put(left);

        let mut right = node;
        right.id = self.ids.new_id();
        right.set_text(tail);
        right.dirty = true;
        let right_id = right.id.clone();
        self.store.put(right);
        self.store.link(&right_id, &position.parent_id, Some(position.index + 1));

        Some(SplitResult {
            left: id.to_string(),
            right: Some(right_id),
        })
    }

    /// Wrap the selected text in a new inline node and return its id.
    ///
    /// Returns `None` without changing anything when the selection does not
    /// name text leaves below the ancestor, or is empty.
    #[instrument(skip(self))]
    pub fn wrap_range(&mut self, range: &TextRange, kind: WrapKind) -> Option<String> {
        if !self.valid_range(range) {
            debug!("Ignoring invalid selection");
            return None;
        }
        let before = self.store.clone();

        let Some((start_boundary, end_boundary)) = self.split_boundaries(range) else {
            self.store = before;
            return None;
        };

        let ancestor = range.common_ancestor.as_str();
        let (Some(start_child), Some(end_child)) = (
            self.child_below(&start_boundary, ancestor),
            self.child_below(&end_boundary, ancestor),
        ) else {
            warn!(ancestor = %ancestor, "Selection boundaries left the common ancestor");
            self.store = before;
            return None;
        };

        let siblings = self.store.child_ids(ancestor).to_vec();
        let (Some(a), Some(b)) = (
            siblings.iter().position(|c| *c == start_child),
            siblings.iter().position(|c| *c == end_child),
        ) else {
            self.store = before;
            return None;
        };
        let (lo, hi) = (a.min(b), a.max(b));
        let collected = siblings[lo..=hi].to_vec();

        let mut wrapper = Node::new(self.ids.new_id(), Some(ancestor.to_string()), kind.node_kind());
        wrapper.dirty = true;
        let wrapper_id = wrapper.id.clone();
        self.store.put(wrapper);

        for id in &collected {
            if let Some(node) = self.store.get_mut(id) {
                node.parent_id = Some(wrapper_id.clone());
                node.dirty = true;
            }
        }
        self.store.set_child_ids(&wrapper_id, collected.clone());

        let mut spliced = siblings[..lo].to_vec();
        spliced.push(wrapper_id.clone());
        spliced.extend_from_slice(&siblings[hi + 1..]);
        self.store.set_child_ids(ancestor, spliced);

        self.mark_aggregates_dirty(&wrapper_id);

        self.history.begin_batch("Wrap selection");
        self.record(
            Patch::Snapshot {
                before: Box::new(before),
                after: Box::new(self.store.clone()),
            },
            false,
        );
        self.history.end_batch();

        debug!(wrapper_id = %wrapper_id, wrapped = collected.len(), "Selection wrapped");
        self.notify_nodes([ancestor, wrapper_id.as_str()]);
        Some(wrapper_id)
    }

    /// Wrap the selection in a `span`, resolving once the view had time to
    /// mount the new element
    pub async fn wrap_range_in_span(&mut self, range: &TextRange) -> Option<String> {
        let id = self.wrap_range(range, WrapKind::Span)?;
        tokio::time::sleep(self.config.wrap_settle()).await;
        Some(id)
    }

    /// Wrap the selection in a link with an empty `href`
    pub async fn wrap_range_in_anchor(&mut self, range: &TextRange) -> Option<String> {
        let id = self.wrap_range(range, WrapKind::Anchor)?;
        tokio::time::sleep(self.config.wrap_settle()).await;
        Some(id)
    }

    /// Dissolve an inline wrapper: its children take its place and adjacent
    /// plain text leaves are merged. Returns `false` for unknown ids, the root
    /// and nodes that are not element tags.
    #[instrument(skip(self))]
    pub fn unwrap_node(&mut self, id: &str) -> bool {
        let Some(node) = self.store.get(id) else {
            return false;
        };
        if node.tag_name().is_none() || node.is_text_leaf() {
            warn!(node_id = %id, node_type = ?node.node_type(), "Only element tags can be unwrapped");
            return false;
        }
        let Some(position) = self.store.position(id) else {
            return false;
        };

        let before = self.store.clone();
        let parent_id = position.parent_id.clone();
        let children = self.store.child_ids(id).to_vec();

        self.store.purge([id]);
        for child in &children {
            if let Some(node) = self.store.get_mut(child) {
                node.parent_id = Some(parent_id.clone());
                node.dirty = true;
            }
        }
        let mut siblings = self.store.child_ids(&parent_id).to_vec();
        let index = position.index.min(siblings.len());
        siblings.splice(index..index, children.iter().cloned());
        self.store.set_child_ids(&parent_id, siblings);

        let window_start = index.saturating_sub(1);
        let window_end = index + children.len();
        let mut purged = vec![id.to_string()];
        purged.extend(self.merge_text_run(&parent_id, window_start, window_end));

        if let Some(locked) = self.edit_lock.locked_node() {
            if purged.iter().any(|p| p == locked) {
                self.edit_lock.release();
            }
        }

        self.mark_aggregates_dirty(&parent_id);
        if let Some(parent) = self.store.get_mut(&parent_id) {
            parent.dirty = true;
        }

        self.history.begin_batch("Unwrap node");
        self.record(
            Patch::Snapshot {
                before: Box::new(before),
                after: Box::new(self.store.clone()),
            },
            false,
        );
        self.history.end_batch();

        self.notify_nodes([parent_id.as_str()]);
        true
    }

    /// Merge neighbouring plain text leaves of `parent_id` whose indices fall
    /// in `[start, end]`. Returns the ids merged away.
    fn merge_text_run(&mut self, parent_id: &str, start: usize, end: usize) -> Vec<String> {
        let mut merged_away = Vec::new();
        let mut index = start;
        let mut end = end;

        loop {
            let siblings = self.store.child_ids(parent_id);
            if index >= end || index + 1 >= siblings.len() {
                break;
            }
            let left_id = siblings[index].clone();
            let right_id = siblings[index + 1].clone();

            let mergeable = matches!(
                (self.store.get(&left_id), self.store.get(&right_id)),
                (Some(l), Some(r)) if l.is_plain_text() && r.is_plain_text()
            );
            if !mergeable {
                index += 1;
                continue;
            }

            let right_text = self
                .store
                .get(&right_id)
                .and_then(Node::text)
                .unwrap_or_default()
                .to_string();
            if let Some(left) = self.store.get_mut(&left_id) {
                let joined = format!("{}{}", left.text().unwrap_or_default(), right_text);
                left.set_text(joined);
                left.dirty = true;
            }
            self.store.purge([right_id.as_str()]);
            merged_away.push(right_id);
            end = end.saturating_sub(1);
        }

        merged_away
    }

    fn valid_range(&self, range: &TextRange) -> bool {
        let ancestor = range.common_ancestor.as_str();
        if !self.store.contains(ancestor) {
            return false;
        }
        if range.is_single_leaf() && range.start_offset == range.end_offset {
            return false;
        }
        [&range.start_node, &range.end_node].iter().all(|id| {
            id.as_str() != ancestor && self.is_text_leaf(id) && self.store.is_within(id, ancestor)
        })
    }

    /// Split the selection's leaves and return the (start, end) boundary ids
    fn split_boundaries(&mut self, range: &TextRange) -> Option<(String, String)> {
        if range.is_single_leaf() {
            let start = range.start_offset.min(range.end_offset);
            let end = range.start_offset.max(range.end_offset);

            let left = self.split_text_node(&range.end_node, end)?.left;
            let middle = self.split_text_node(&left, start)?.right?;
            return Some((middle.clone(), middle));
        }

        let end_boundary = self.split_text_node(&range.end_node, range.end_offset)?.left;
        let start_split = self.split_text_node(&range.start_node, range.start_offset)?;
        let start_boundary = start_split.right.unwrap_or(start_split.left);
        Some((start_boundary, end_boundary))
    }

    /// The child of `ancestor` that contains `id`
    fn child_below(&self, id: &str, ancestor: &str) -> Option<String> {
        if self.store.parent_id(id) == Some(ancestor) {
            return Some(id.to_string());
        }
        let chain = self.store.ancestors(id);
        let at = chain.iter().position(|a| a == ancestor)?;
        if at == 0 {
            Some(id.to_string())
        } else {
            Some(chain[at - 1].clone())
        }
    }
}
