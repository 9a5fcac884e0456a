//! # Notification Bus
//!
//! Per-identifier subscription registry used by view layers to learn what to
//! re-render. Topics are node identifiers plus the [`ROOT_TOPIC`] alias.
//!
//! Topics are created on first subscribe and disappear with their last
//! subscriber. Notification iterates over a snapshot of the subscriber list,
//! so callbacks may subscribe or unsubscribe (themselves or others) while a
//! notification is in flight.
//!
//! Which ancestor topic also hears about a change is decided by
//! [`bubble_target`], a per-node-type table.

use crate::node::NodeType;
use crate::store::NodeStore;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Topic notified when no more specific ancestor applies. A stored node
/// with this id is still treated as a node.
pub const ROOT_TOPIC: &str = "__root__";

type Callback = Rc<dyn Fn(&str)>;

#[derive(Default)]
struct Registry {
    topics: HashMap<String, Vec<(u64, Callback)>>,
    next_id: u64,
}

/// Subscription registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct NotificationBus {
    registry: Rc<RefCell<Registry>>,
}

/// Handle returned by [`NotificationBus::subscribe`].
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove the callback. Safe to call from inside a notification and more than once.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.borrow_mut();
        if let Some(subscribers) = registry.topics.get_mut(&self.topic) {
            subscribers.retain(|(id, _)| *id != self.id);
            if subscribers.is_empty() {
                registry.topics.remove(&self.topic);
            }
        }
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `topic`. The callback receives the topic id.
    pub fn subscribe(&self, topic: impl Into<String>, callback: impl Fn(&str) + 'static) -> Subscription {
        let topic = topic.into();
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, Rc::new(callback)));

        Subscription {
            registry: Rc::downgrade(&self.registry),
            topic,
            id,
        }
    }

    /// Invoke every subscriber of exactly `topic`, in subscription order
    pub fn notify(&self, topic: &str) {
        let callbacks: Vec<Callback> = {
            let registry = self.registry.borrow();
            match registry.topics.get(topic) {
                Some(subscribers) => subscribers.iter().map(|(_, cb)| cb.clone()).collect(),
                None => return,
            }
        };

        for callback in callbacks {
            callback(topic);
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .borrow()
            .topics
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.registry.borrow().topics.contains_key(topic)
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("NotificationBus")
            .field("topics", &registry.topics.len())
            .finish()
    }
}

/// Where a node type's notifications bubble to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleRule {
    /// Nearest section ancestor, or the root alias when there is none
    NearestPane,
    /// Straight to the root alias
    Root,
}

pub fn bubble_rule(node_type: NodeType) -> BubbleRule {
    match node_type {
        NodeType::Tag
        | NodeType::Markdown
        | NodeType::LayoutGrid
        | NodeType::Background
        | NodeType::Menu
        | NodeType::Impression
        | NodeType::File => BubbleRule::NearestPane,
        NodeType::Pane | NodeType::Page | NodeType::Document => BubbleRule::Root,
    }
}

/// Ancestor topic that also receives a notification for `id`
pub fn bubble_target(store: &NodeStore, id: &str) -> Option<String> {
    let node_type = store.node_type(id)?;
    let target = match bubble_rule(node_type) {
        BubbleRule::NearestPane => store
            .ancestors(id)
            .into_iter()
            .find(|a| store.node_type(a) == Some(NodeType::Pane))
            .unwrap_or_else(|| ROOT_TOPIC.to_string()),
        BubbleRule::Root => ROOT_TOPIC.to_string(),
    };
    Some(target)
}
