//! # Edit Lock
//!
//! Marks the one node currently being text-edited. While held, notifications
//! aimed at exactly that node are swallowed so a tree-wide re-render can't
//! reset the editor's uncommitted state. Ancestors still hear about changes.

/// Single-writer edit flag
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditLock {
    node_id: Option<String>,
}

impl EditLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `node_id`, replacing any previous holder
    pub fn lock(&mut self, node_id: impl Into<String>) {
        self.node_id = Some(node_id.into());
    }

    /// Release the lock; returns the previous holder
    pub fn release(&mut self) -> Option<String> {
        self.node_id.take()
    }

    pub fn locked_node(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn is_locked(&self, node_id: &str) -> bool {
        self.node_id.as_deref() == Some(node_id)
    }
}
