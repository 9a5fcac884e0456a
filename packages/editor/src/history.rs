//! # Undo/Redo History
//!
//! Tracks reversible graph operations.
//!
//! ## Design
//!
//! - Each operation is recorded as a value [`Patch`] holding everything needed
//!   to reverse and replay it; nothing captures live references to the graph
//! - Undo reverts the newest entry and moves it to the redo stack
//! - Redo replays it and moves it back
//! - New patches clear the redo stack
//! - Patches pushed with `merge` inside the coalescing window join the previous
//!   entry, so a burst of keystrokes is one undo step
//! - The undo stack is bounded; the oldest entry is evicted past capacity and
//!   can no longer be undone
//! - Compound operations group their patches with `begin_batch`/`end_batch`
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = History::new(500, Duration::from_secs(1));
//! history.add_patch(patch, AddPatchOptions::default());
//!
//! history.undo(&mut store);
//! history.redo(&mut store);
//! ```

use crate::node::Node;
use crate::store::{LinkPosition, NodeStore};
use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

/// Operation-kind tag of a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Add,
    Remove,
    Replace,
}

/// One reversible operation, stored by value
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Nodes inserted, with their final link positions
    Add {
        nodes: Vec<Node>,
        positions: Vec<LinkPosition>,
    },

    /// Nodes deleted, with the link positions they had
    Remove {
        nodes: Vec<Node>,
        positions: Vec<LinkPosition>,
    },

    /// Records overwritten in place
    Replace { before: Vec<Node>, after: Vec<Node> },

    /// A node relinked from one position to another
    Move {
        id: String,
        from: LinkPosition,
        to: LinkPosition,
    },

    /// Whole-store state before and after a compound edit
    Snapshot {
        before: Box<NodeStore>,
        after: Box<NodeStore>,
    },
}

impl Patch {
    pub fn kind(&self) -> PatchKind {
        match self {
            Patch::Add { .. } => PatchKind::Add,
            Patch::Remove { .. } => PatchKind::Remove,
            Patch::Replace { .. } | Patch::Move { .. } | Patch::Snapshot { .. } => {
                PatchKind::Replace
            }
        }
    }

    pub fn undo(&self, store: &mut NodeStore) {
        match self {
            Patch::Add { nodes, .. } => {
                store.purge(nodes.iter().rev().map(|n| n.id.as_str()));
            }
            Patch::Remove { nodes, positions } => store.restore(nodes, positions),
            Patch::Replace { before, .. } => {
                for node in before {
                    store.put(node.clone());
                }
            }
            Patch::Move { id, from, .. } => store.reparent(id, &from.parent_id, Some(from.index)),
            Patch::Snapshot { before, .. } => *store = (**before).clone(),
        }
    }

    pub fn redo(&self, store: &mut NodeStore) {
        match self {
            Patch::Add { nodes, positions } => store.restore(nodes, positions),
            Patch::Remove { nodes, .. } => {
                store.purge(nodes.iter().map(|n| n.id.as_str()));
            }
            Patch::Replace { after, .. } => {
                for node in after {
                    store.put(node.clone());
                }
            }
            Patch::Move { id, to, .. } => store.reparent(id, &to.parent_id, Some(to.index)),
            Patch::Snapshot { after, .. } => *store = (**after).clone(),
        }
    }

    /// Identifiers whose record or child list this patch changes
    pub fn touched(&self) -> Vec<String> {
        let mut ids = BTreeSet::new();
        match self {
            Patch::Add { nodes, positions } | Patch::Remove { nodes, positions } => {
                ids.extend(nodes.iter().map(|n| n.id.clone()));
                ids.extend(positions.iter().map(|p| p.parent_id.clone()));
            }
            Patch::Replace { after, .. } => {
                ids.extend(after.iter().map(|n| n.id.clone()));
            }
            Patch::Move { id, from, to } => {
                ids.insert(id.clone());
                ids.insert(from.parent_id.clone());
                ids.insert(to.parent_id.clone());
            }
            Patch::Snapshot { before, after } => {
                for id in before.nodes().keys().chain(after.nodes().keys()) {
                    if before.get(id) != after.get(id) || before.child_ids(id) != after.child_ids(id) {
                        ids.insert(id.clone());
                    }
                }
            }
        }
        ids.into_iter().collect()
    }

    /// Identifiers whose own record this patch writes, in either direction
    pub fn records(&self) -> Vec<String> {
        let mut ids = BTreeSet::new();
        match self {
            Patch::Add { nodes, .. } | Patch::Remove { nodes, .. } => {
                ids.extend(nodes.iter().map(|n| n.id.clone()));
            }
            Patch::Replace { after, .. } => {
                ids.extend(after.iter().map(|n| n.id.clone()));
            }
            Patch::Move { id, .. } => {
                ids.insert(id.clone());
            }
            Patch::Snapshot { before, after } => {
                for id in before.nodes().keys().chain(after.nodes().keys()) {
                    if before.get(id) != after.get(id) {
                        ids.insert(id.clone());
                    }
                }
            }
        }
        ids.into_iter().collect()
    }
}

/// What one undo or redo changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStep {
    /// Ids whose record or child list changed
    pub touched: Vec<String>,
    /// Ids whose record was written back
    pub records: Vec<String>,
}

impl HistoryStep {
    fn collect(&mut self, patch: &Patch) {
        self.touched.extend(patch.touched());
        self.records.extend(patch.records());
    }

    fn finish(mut self) -> Self {
        self.touched.sort();
        self.touched.dedup();
        self.records.sort();
        self.records.dedup();
        self
    }
}

/// A group of patches undone/redone together
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Patches in application order
    pub patches: Vec<Patch>,

    /// Optional description of this entry
    pub description: Option<String>,

    recorded_at: Instant,
}

impl HistoryEntry {
    fn new(description: Option<String>) -> Self {
        Self {
            patches: Vec::new(),
            description,
            recorded_at: Instant::now(),
        }
    }

    fn undo(&self, store: &mut NodeStore) -> HistoryStep {
        let mut step = HistoryStep::default();
        for patch in self.patches.iter().rev() {
            patch.undo(store);
            step.collect(patch);
        }
        step.finish()
    }

    fn redo(&self, store: &mut NodeStore) -> HistoryStep {
        let mut step = HistoryStep::default();
        for patch in &self.patches {
            patch.redo(store);
            step.collect(patch);
        }
        step.finish()
    }
}

/// Options for [`History::add_patch`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AddPatchOptions {
    /// Join the previous entry when it was recorded within the merge window
    pub merge: bool,
}

/// Bounded undo/redo stacks
#[derive(Debug)]
pub struct History {
    /// Applied entries (most recent last)
    undo_stack: VecDeque<HistoryEntry>,

    /// Undone entries (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo entries (0 = unlimited)
    capacity: usize,

    merge_window: Duration,

    /// Disabled histories drop every patch
    enabled: bool,

    /// Entry being assembled by a compound operation
    current_batch: Option<HistoryEntry>,

    batch_depth: usize,
}

impl History {
    pub fn new(capacity: usize, merge_window: Duration) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            capacity,
            merge_window,
            enabled: true,
            current_batch: None,
            batch_depth: 0,
        }
    }

    /// A history that ignores every patch, for preview graphs
    pub fn disabled() -> Self {
        let mut history = Self::new(0, Duration::ZERO);
        history.enabled = false;
        history
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Record a patch for an operation that has already been applied
    pub fn add_patch(&mut self, patch: Patch, options: AddPatchOptions) {
        if !self.enabled {
            return;
        }

        if let Some(batch) = &mut self.current_batch {
            batch.patches.push(patch);
            return;
        }

        let now = Instant::now();
        if options.merge && !self.merge_window.is_zero() {
            if let Some(last) = self.undo_stack.back_mut() {
                if now.duration_since(last.recorded_at) <= self.merge_window {
                    last.patches.push(patch);
                    last.recorded_at = now;
                    self.redo_stack.clear();
                    return;
                }
            }
        }

        let mut entry = HistoryEntry::new(None);
        entry.patches.push(patch);
        entry.recorded_at = now;
        self.push_entry(entry);
    }

    /// Start grouping patches into one entry. Nested calls join the outer batch.
    pub fn begin_batch(&mut self, description: impl Into<String>) {
        self.batch_depth += 1;
        if self.current_batch.is_none() {
            self.current_batch = Some(HistoryEntry::new(Some(description.into())));
        }
    }

    /// Close the current batch and push it if it recorded anything
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }

        if let Some(mut batch) = self.current_batch.take() {
            if !batch.patches.is_empty() {
                batch.recorded_at = Instant::now();
                self.push_entry(batch);
            }
        }
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_back(entry);

        // Evicted entries are gone for good
        while self.capacity > 0 && self.undo_stack.len() > self.capacity {
            self.undo_stack.pop_front();
        }

        // New action invalidates the future
        self.redo_stack.clear();
    }

    /// Revert the newest entry. Returns what it changed, or `None` when
    /// there was nothing to undo.
    pub fn undo(&mut self, store: &mut NodeStore) -> Option<HistoryStep> {
        let entry = self.undo_stack.pop_back()?;
        let step = entry.undo(store);
        self.redo_stack.push(entry);
        Some(step)
    }

    /// Replay the most recently undone entry
    pub fn redo(&mut self, store: &mut NodeStore) -> Option<HistoryStep> {
        let entry = self.redo_stack.pop()?;
        let step = entry.redo(store);
        self.undo_stack.push_back(entry);
        Some(step)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Kind of the newest undoable patch
    pub fn last_kind(&self) -> Option<PatchKind> {
        self.undo_stack
            .back()
            .and_then(|entry| entry.patches.last())
            .map(Patch::kind)
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .back()
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    /// Drop all undo/redo history
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
        self.batch_depth = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(500, Duration::from_secs(1))
    }
}
