//! # Document Nodes
//!
//! A node is the atomic document entity. Nodes never embed their children;
//! structure lives in the store's adjacency index.
//!
//! ```text
//! document
//!   └─ page
//!        └─ pane (section)
//!             ├─ background
//!             ├─ layout-grid ─ markdown (column) ─ tag …
//!             └─ markdown ─ tag (ul) ─ tag (li) ─ tag (text)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag name of a text-bearing leaf
pub const TEXT_TAG: &str = "text";

/// Tag names treated as list containers
pub const LIST_TAGS: &[&str] = &["ul", "ol"];

/// Tag name of a list item
pub const LIST_ITEM_TAG: &str = "li";

/// Tag names of media that must live inside a list item
pub const MEDIA_TAGS: &[&str] = &["img", "code"];

/// Document entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    /// `None` only for the document root
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Set when the node (or a descendant aggregate) changed since the last save
    #[serde(default, skip_serializing_if = "is_false")]
    pub dirty: bool,

    #[serde(flatten)]
    pub kind: NodeKind,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Type-specific node attributes, tagged by `nodeType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "kebab-case")]
pub enum NodeKind {
    #[serde(rename_all = "camelCase")]
    Document {
        #[serde(default)]
        title: String,
    },

    #[serde(rename_all = "camelCase")]
    Page {
        #[serde(default)]
        title: String,
        #[serde(default)]
        slug: String,
        /// Pre-declared section identifiers, linked under the page on insert
        #[serde(default)]
        pane_ids: Vec<String>,
        #[serde(default)]
        is_context: bool,
    },

    #[serde(rename_all = "camelCase")]
    Pane {
        #[serde(default)]
        title: String,
        #[serde(default)]
        slug: String,
        #[serde(default)]
        classes: BTreeMap<String, String>,
        #[serde(default)]
        background_color: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    LayoutGrid {
        #[serde(default)]
        columns: ViewportColumns,
        #[serde(default)]
        classes: BTreeMap<String, String>,
    },

    #[serde(rename_all = "camelCase")]
    Markdown {
        #[serde(default)]
        classes: BTreeMap<String, String>,
    },

    #[serde(rename_all = "camelCase")]
    Tag {
        tag_name: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        classes: BTreeMap<String, String>,
    },

    #[serde(rename_all = "camelCase")]
    Background {
        #[serde(default)]
        image_url: Option<String>,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        position: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Menu {
        #[serde(default)]
        title: String,
        #[serde(default)]
        links: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    Impression {
        #[serde(default)]
        title: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        action_url: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    File {
        #[serde(default)]
        src: String,
        #[serde(default)]
        alt_text: Option<String>,
    },
}

/// Per-viewport column counts of a layout grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportColumns {
    pub mobile: u8,
    pub tablet: u8,
    pub desktop: u8,
}

impl Default for ViewportColumns {
    fn default() -> Self {
        Self {
            mobile: 1,
            tablet: 2,
            desktop: 2,
        }
    }
}

/// Node type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Document,
    Page,
    Pane,
    LayoutGrid,
    Markdown,
    Tag,
    Background,
    Menu,
    Impression,
    File,
}

impl NodeType {
    /// Types whose edits also dirty their owning section and grid
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            NodeType::LayoutGrid | NodeType::Tag | NodeType::Background | NodeType::Markdown
        )
    }
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Document { .. } => NodeType::Document,
            NodeKind::Page { .. } => NodeType::Page,
            NodeKind::Pane { .. } => NodeType::Pane,
            NodeKind::LayoutGrid { .. } => NodeType::LayoutGrid,
            NodeKind::Markdown { .. } => NodeType::Markdown,
            NodeKind::Tag { .. } => NodeType::Tag,
            NodeKind::Background { .. } => NodeType::Background,
            NodeKind::Menu { .. } => NodeType::Menu,
            NodeKind::Impression { .. } => NodeType::Impression,
            NodeKind::File { .. } => NodeType::File,
        }
    }

    /// Plain text leaf with the given content
    pub fn text(content: impl Into<String>) -> Self {
        NodeKind::Tag {
            tag_name: TEXT_TAG.to_string(),
            text: Some(content.into()),
            attributes: BTreeMap::new(),
            classes: BTreeMap::new(),
        }
    }

    /// Tag element without a text payload
    pub fn tag(tag_name: impl Into<String>) -> Self {
        NodeKind::Tag {
            tag_name: tag_name.into(),
            text: None,
            attributes: BTreeMap::new(),
            classes: BTreeMap::new(),
        }
    }

    pub fn pane(title: impl Into<String>) -> Self {
        NodeKind::Pane {
            title: title.into(),
            slug: String::new(),
            classes: BTreeMap::new(),
            background_color: None,
        }
    }

    pub fn markdown() -> Self {
        NodeKind::Markdown {
            classes: BTreeMap::new(),
        }
    }

    /// Style attributes carried by the node, if its type has any
    pub fn classes(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            NodeKind::Pane { classes, .. }
            | NodeKind::LayoutGrid { classes, .. }
            | NodeKind::Markdown { classes }
            | NodeKind::Tag { classes, .. } => Some(classes),
            _ => None,
        }
    }
}

impl Node {
    pub fn new(id: impl Into<String>, parent_id: Option<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            parent_id,
            dirty: false,
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Deep equality ignoring the dirty flag
    pub fn content_eq(&self, other: &Node) -> bool {
        self.id == other.id && self.parent_id == other.parent_id && self.kind == other.kind
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Tag { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    /// Text payload of a text leaf
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Tag { tag_name, text: Some(text), .. } if tag_name == TEXT_TAG => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, content: String) -> bool {
        match &mut self.kind {
            NodeKind::Tag { tag_name, text: Some(text), .. } if tag_name == TEXT_TAG => {
                *text = content;
                true
            }
            _ => false,
        }
    }

    pub fn is_text_leaf(&self) -> bool {
        self.text().is_some()
    }

    /// A text leaf that carries no attributes or classes of its own
    pub fn is_plain_text(&self) -> bool {
        match &self.kind {
            NodeKind::Tag { tag_name, text: Some(_), attributes, classes } => {
                tag_name == TEXT_TAG && attributes.is_empty() && classes.is_empty()
            }
            _ => false,
        }
    }

    pub fn is_pane(&self) -> bool {
        self.node_type() == NodeType::Pane
    }

    pub fn is_layout_grid(&self) -> bool {
        self.node_type() == NodeType::LayoutGrid
    }

    pub fn is_list(&self) -> bool {
        self.tag_name().map(|t| LIST_TAGS.contains(&t)).unwrap_or(false)
    }

    pub fn is_list_item(&self) -> bool {
        self.tag_name() == Some(LIST_ITEM_TAG)
    }

    /// Images and embedded widgets
    pub fn is_media(&self) -> bool {
        self.tag_name().map(|t| MEDIA_TAGS.contains(&t)).unwrap_or(false)
    }

    /// Empty text leaves don't count as content when deciding list collapses
    pub fn is_meaningful(&self) -> bool {
        match self.text() {
            Some(text) => !text.trim().is_empty(),
            None => true,
        }
    }
}
