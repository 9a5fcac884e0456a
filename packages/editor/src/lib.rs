//! # Pageweave Editor
//!
//! Document graph engine for the Pageweave page editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ view layer: subscribes per node id          │
//! └─────────────────────────────────────────────┘
//!                     ↑ notifications
//! ┌─────────────────────────────────────────────┐
//! │ DocumentGraph                               │
//! │  - NodeStore: records + ordered child index │
//! │  - History: value patches, undo/redo        │
//! │  - NotificationBus: per-id topics, bubbling │
//! │  - EditLock: suppresses one node's topic    │
//! └─────────────────────────────────────────────┘
//!          ↑                         ↑
//! ┌──────────────────┐    ┌────────────────────┐
//! │ templates        │    │ range_wrap         │
//! │ stamp subtrees   │    │ split + wrap text  │
//! └──────────────────┘    └────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Flat records, separate structure**: nodes never embed their children
//! 2. **Every edit is reversible**: one history entry per user-level operation
//! 3. **Invalid input is a no-op**: unknown ids return `false`/`None`
//! 4. **One writer**: all mutation runs synchronously on the caller's thread
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pageweave_editor::{DocumentGraph, Node, NodeKind, TextRange};
//!
//! let mut graph = DocumentGraph::from_nodes(config, nodes);
//! let _sub = graph.subscribe(pane_id, |id| println!("re-render {id}"));
//!
//! graph.delete_node(&node_id);
//! graph.undo();
//!
//! let link = graph.wrap_range_in_anchor(&range).await;
//! ```

mod dirty;
mod edit_lock;
mod errors;
mod graph;
mod history;
mod mutations;
mod node;
mod notifications;
mod range_wrap;
mod store;
mod templates;

pub use dirty::ClassData;
pub use edit_lock::EditLock;
pub use errors::{EditorError, EditorResult};
pub use graph::DocumentGraph;
pub use history::{AddPatchOptions, History, HistoryEntry, HistoryStep, Patch, PatchKind};
pub use mutations::{ModifyOptions, MoveDirection, Placement};
pub use node::{Node, NodeKind, NodeType, ViewportColumns, LIST_ITEM_TAG, LIST_TAGS, MEDIA_TAGS, TEXT_TAG};
pub use notifications::{bubble_rule, bubble_target, BubbleRule, NotificationBus, Subscription, ROOT_TOPIC};
pub use range_wrap::{SplitResult, TextRange, WrapKind};
pub use store::{IntegrityViolation, LinkPosition, NodeStore};
pub use templates::{instantiate, validate_content_template, validate_pane_template, Instantiated, TemplateNode};

// Re-export common types for convenience
pub use pageweave_common::{EngineConfig, IdGenerator};
