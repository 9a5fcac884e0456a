//! # Template Instantiation
//!
//! Stamps disconnected template subtrees into the graph.
//!
//! A [`TemplateNode`] nests its children inline and uses placeholder ids (or
//! none at all). Instantiation flattens it depth-first, gives every node a
//! fresh sortable id, points each node at its parent's *new* id and hangs the
//! template root off an anchor supplied by the caller.
//!
//! Markdown containers may also carry `markdown_nodes`: a flat list produced
//! by parsing the markdown body. Those nodes name their parent by id, and the
//! id can be either a template placeholder or one that is already real, so
//! parent links are resolved in a second pass once every placeholder has been
//! mapped.
//!
//! ```text
//! TemplateNode (nested, placeholder ids)
//!     ↓ pass 1: depth-first flatten, fresh ids, old → new map
//!     ↓ pass 2: resolve placeholder parent ids through the map
//! Vec<Node> (flat, parents before children)
//! ```

use crate::errors::{EditorError, EditorResult};
use crate::graph::DocumentGraph;
use crate::mutations::Placement;
use crate::node::{Node, NodeKind, NodeType, MEDIA_TAGS};
use pageweave_common::IdGenerator;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Disconnected node description used to stamp out new content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateNode {
    /// Placeholder id, only meaningful inside the template
    #[serde(default)]
    pub id: Option<String>,

    /// Parent reference of a markdown body node
    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(flatten)]
    pub kind: NodeKind,

    #[serde(default)]
    pub children: Vec<TemplateNode>,

    /// Flat nodes parsed from a markdown body, linked through `parent_id`
    #[serde(default)]
    pub markdown_nodes: Vec<TemplateNode>,
}

impl TemplateNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: None,
            parent_id: None,
            kind,
            children: Vec::new(),
            markdown_nodes: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> EditorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> EditorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TemplateNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_markdown_nodes(mut self, nodes: Vec<TemplateNode>) -> Self {
        self.markdown_nodes = nodes;
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Number of nodes instantiation will produce
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TemplateNode::node_count).sum::<usize>()
            + self.markdown_nodes.iter().map(TemplateNode::node_count).sum::<usize>()
    }

    fn is_media(&self) -> bool {
        matches!(&self.kind, NodeKind::Tag { tag_name, .. } if MEDIA_TAGS.contains(&tag_name.as_str()))
    }
}

/// Output of [`instantiate`]
#[derive(Debug, Clone)]
pub struct Instantiated {
    /// Flattened nodes, parents before children
    pub nodes: Vec<Node>,

    /// New id of the template root
    pub root_id: String,

    /// Placeholder id → new id
    pub id_map: HashMap<String, String>,
}

/// Flatten `template` into fresh nodes whose root hangs off `anchor_id`
pub fn instantiate(template: &TemplateNode, anchor_id: &str, ids: &mut IdGenerator) -> Instantiated {
    let mut flattener = Flattener {
        ids,
        nodes: Vec::new(),
        id_map: HashMap::new(),
        body_owner: HashMap::new(),
    };
    let root_id = flattener.flatten(template, Some(anchor_id), None);

    let Flattener {
        mut nodes,
        id_map,
        body_owner,
        ..
    } = flattener;

    // Second pass: placeholder parents → new ids
    let new_ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for node in &mut nodes {
        let Some(parent_id) = node.parent_id.clone() else {
            continue;
        };
        if let Some(mapped) = id_map.get(&parent_id) {
            node.parent_id = Some(mapped.clone());
        } else if !new_ids.contains(&parent_id) && parent_id != anchor_id {
            if let Some(owner) = body_owner.get(&node.id) {
                debug!(node_id = %node.id, parent_id = %parent_id, "Unresolved body parent, using its markdown container");
                node.parent_id = Some(owner.clone());
            }
        }
    }

    Instantiated {
        nodes: parents_first(nodes, anchor_id),
        root_id,
        id_map,
    }
}

struct Flattener<'a> {
    ids: &'a mut IdGenerator,
    nodes: Vec<Node>,
    id_map: HashMap<String, String>,
    /// Body node id → new id of the markdown container it came from
    body_owner: HashMap<String, String>,
}

impl Flattener<'_> {
    /// `parent_id` is the new id of the enclosing node, or `None` for body
    /// nodes whose raw parent reference is kept for the second pass
    fn flatten(&mut self, template: &TemplateNode, parent_id: Option<&str>, owner: Option<&str>) -> String {
        let id = self.ids.new_id();
        if let Some(placeholder) = &template.id {
            self.id_map.insert(placeholder.clone(), id.clone());
        }

        let parent_id = match parent_id {
            Some(parent_id) => Some(parent_id.to_string()),
            None => template.parent_id.clone().or_else(|| owner.map(str::to_string)),
        };
        if let Some(owner) = owner {
            self.body_owner.insert(id.clone(), owner.to_string());
        }

        let mut node = Node::new(id.clone(), parent_id, template.kind.clone());
        node.dirty = true;
        self.nodes.push(node);

        for child in &template.children {
            self.flatten(child, Some(id.as_str()), None);
        }
        for body_node in &template.markdown_nodes {
            self.flatten(body_node, None, Some(id.as_str()));
        }

        id
    }
}

/// Stable reorder so every node follows its parent
fn parents_first(nodes: Vec<Node>, anchor_id: &str) -> Vec<Node> {
    let batch: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let mut placed: HashSet<String> = HashSet::new();
    placed.insert(anchor_id.to_string());

    let mut pending = nodes;
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let before = pending.len();
        let mut rest = Vec::new();
        for node in pending {
            let ready = match &node.parent_id {
                Some(parent_id) => placed.contains(parent_id) || !batch.contains(parent_id),
                None => true,
            };
            if ready {
                placed.insert(node.id.clone());
                ordered.push(node);
            } else {
                rest.push(node);
            }
        }
        if rest.len() == before {
            // Parent cycle inside the batch; keep the remainder as given
            ordered.extend(rest);
            break;
        }
        pending = rest;
    }
    ordered
}

/// Shape check for section templates
pub fn validate_pane_template(template: &TemplateNode) -> EditorResult<()> {
    if template.node_type() != NodeType::Pane {
        return Err(EditorError::MalformedTemplate(format!(
            "expected a pane template, found {:?}",
            template.node_type()
        )));
    }
    for child in template.children.iter().chain(&template.markdown_nodes) {
        validate_content_template(child)?;
    }
    Ok(())
}

/// Shape check for content inserted below a section
pub fn validate_content_template(template: &TemplateNode) -> EditorResult<()> {
    match template.node_type() {
        NodeType::Document | NodeType::Page | NodeType::Pane => {
            Err(EditorError::MalformedTemplate(format!(
                "{:?} nodes cannot be nested inside content templates",
                template.node_type()
            )))
        }
        _ => {
            for child in template.children.iter().chain(&template.markdown_nodes) {
                validate_content_template(child)?;
            }
            Ok(())
        }
    }
}

impl DocumentGraph {
    /// Instantiate a section template under `owner_id` (a page).
    ///
    /// With `insert_ref` the new section lands before/after that sibling;
    /// otherwise it is appended. Returns the new section id, or `None` when
    /// the owner is unknown or not a page.
    #[instrument(skip(self, template), fields(nodes = template.node_count()))]
    pub fn add_template_pane(
        &mut self,
        owner_id: &str,
        template: &TemplateNode,
        insert_ref: Option<&str>,
        placement: Placement,
    ) -> EditorResult<Option<String>> {
        validate_pane_template(template)?;
        match self.store.node_type(owner_id) {
            Some(NodeType::Page) => {}
            Some(other) => {
                warn!(owner_id = %owner_id, owner_type = ?other, "Sections can only be added to pages");
                return Ok(None);
            }
            None => return Ok(None),
        }

        let instantiated = instantiate(template, owner_id, &mut self.ids);
        let pane_id = instantiated.root_id.clone();

        self.history.begin_batch("Add template pane");
        let inserted = self.insert_nodes(instantiated.nodes);
        self.place_relative(&pane_id, owner_id, insert_ref, placement);
        for id in &inserted {
            self.mark_aggregates_dirty(id);
        }
        let patch = self.add_patch_for(&inserted);
        self.record(patch, false);
        if let Some(patch) = self.sync_page_panes(owner_id) {
            self.record(patch, false);
        }
        self.history.end_batch();

        debug!(pane_id = %pane_id, count = inserted.len(), "Template pane added");
        self.notify_nodes([owner_id, pane_id.as_str()]);
        Ok(Some(pane_id))
    }

    /// Replace the single section of a context page with a new one from
    /// `template`, as one undo step
    pub fn add_context_template_pane(
        &mut self,
        owner_id: &str,
        template: &TemplateNode,
    ) -> EditorResult<Option<String>> {
        validate_pane_template(template)?;
        match self.store.get(owner_id).map(|n| &n.kind) {
            Some(NodeKind::Page { is_context: true, .. }) => {}
            Some(_) => {
                warn!(owner_id = %owner_id, "Context panes can only be added to context pages");
                return Ok(None);
            }
            None => return Ok(None),
        }

        let existing: Vec<String> = self
            .store
            .child_ids(owner_id)
            .iter()
            .filter(|c| self.store.node_type(c) == Some(NodeType::Pane))
            .cloned()
            .collect();

        self.history.begin_batch("Add context pane");
        if !existing.is_empty() {
            self.remove_subtrees(&existing, "Add context pane");
        }
        let result = self.add_template_pane(owner_id, template, None, Placement::After);
        self.history.end_batch();
        result
    }

    /// Instantiate a content template inside `target_id`.
    ///
    /// Sections get an intermediate markdown container; images and widgets
    /// outside a list get a synthesized list and list item. Everything
    /// inserted is one undo step. Returns the new id of the template root.
    #[instrument(skip(self, template), fields(nodes = template.node_count()))]
    pub fn add_template_node(
        &mut self,
        target_id: &str,
        template: &TemplateNode,
        insert_ref: Option<&str>,
        placement: Placement,
    ) -> EditorResult<Option<String>> {
        validate_content_template(template)?;
        let Some(target) = self.store.get(target_id) else {
            return Ok(None);
        };
        let target_is_pane = target.is_pane();
        let target_is_list = target.is_list();

        let mut synthesized: Vec<Node> = Vec::new();
        let mut parent_id = target_id.to_string();

        let wraps_content = !matches!(
            template.node_type(),
            NodeType::Markdown | NodeType::LayoutGrid | NodeType::Background
        );
        if target_is_pane && wraps_content {
            let container = Node::new(self.ids.new_id(), Some(parent_id.clone()), NodeKind::markdown());
            parent_id = container.id.clone();
            synthesized.push(container);
        }

        if template.is_media() && !self.has_list_item_ancestor(target_id) {
            if !target_is_list {
                let list = Node::new(self.ids.new_id(), Some(parent_id.clone()), NodeKind::tag("ul"));
                parent_id = list.id.clone();
                synthesized.push(list);
            }
            let item = Node::new(self.ids.new_id(), Some(parent_id.clone()), NodeKind::tag("li"));
            parent_id = item.id.clone();
            synthesized.push(item);
        }

        let instantiated = instantiate(template, &parent_id, &mut self.ids);
        let root_id = instantiated.root_id.clone();
        let top_id = synthesized
            .first()
            .map(|n| n.id.clone())
            .unwrap_or_else(|| root_id.clone());

        let mut nodes = synthesized;
        nodes.extend(instantiated.nodes);

        self.history.begin_batch("Add template node");
        let inserted = self.insert_nodes(nodes);
        self.place_relative(&top_id, target_id, insert_ref, placement);
        for id in &inserted {
            self.mark_aggregates_dirty(id);
        }
        let patch = self.add_patch_for(&inserted);
        self.record(patch, false);
        self.history.end_batch();

        self.notify_nodes([target_id, top_id.as_str()]);
        Ok(Some(root_id))
    }

    /// Merge a section template's style and background onto an existing
    /// section without touching its content. Returns `false` for unknown or
    /// non-section targets.
    pub fn apply_shell_to_pane(&mut self, pane_id: &str, shell: &TemplateNode) -> EditorResult<bool> {
        validate_pane_template(shell)?;
        let Some(current) = self.store.get(pane_id).filter(|n| n.is_pane()).cloned() else {
            return Ok(false);
        };
        let NodeKind::Pane {
            classes: shell_classes,
            background_color: shell_background,
            ..
        } = &shell.kind
        else {
            return Ok(false);
        };

        let mut updated = current.clone();
        if let NodeKind::Pane {
            classes,
            background_color,
            ..
        } = &mut updated.kind
        {
            classes.extend(shell_classes.iter().map(|(k, v)| (k.clone(), v.clone())));
            if shell_background.is_some() {
                *background_color = shell_background.clone();
            }
        }

        let shell_backgrounds: Vec<&TemplateNode> = shell
            .children
            .iter()
            .filter(|c| c.node_type() == NodeType::Background)
            .collect();

        self.history.begin_batch("Apply shell");
        if !updated.content_eq(&current) {
            updated.dirty = true;
            self.store.put(updated.clone());
            self.record(
                crate::history::Patch::Replace {
                    before: vec![current],
                    after: vec![updated],
                },
                false,
            );
        }

        if !shell_backgrounds.is_empty() {
            let existing: Vec<String> = self
                .store
                .child_ids(pane_id)
                .iter()
                .filter(|c| self.store.node_type(c) == Some(NodeType::Background))
                .cloned()
                .collect();
            if !existing.is_empty() {
                self.remove_subtrees(&existing, "Apply shell");
            }

            let mut inserted = Vec::new();
            for (index, background) in shell_backgrounds.into_iter().enumerate() {
                let instantiated = instantiate(background, pane_id, &mut self.ids);
                let root_id = instantiated.root_id.clone();
                inserted.extend(self.insert_nodes(instantiated.nodes));
                self.store.reparent(&root_id, pane_id, Some(index));
            }
            for id in &inserted {
                self.mark_aggregates_dirty(id);
            }
            let patch = self.add_patch_for(&inserted);
            self.record(patch, false);
        }
        self.history.end_batch();

        self.notify_nodes([pane_id]);
        Ok(true)
    }

    fn has_list_item_ancestor(&self, id: &str) -> bool {
        self.is_list_item(id) || self.store.ancestors(id).iter().any(|a| self.is_list_item(a))
    }

    /// Reposition a freshly inserted `id` inside `parent_id` relative to
    /// `insert_ref`; without a usable reference it stays at the end
    fn place_relative(&mut self, id: &str, parent_id: &str, insert_ref: Option<&str>, placement: Placement) {
        let Some(reference) = insert_ref else {
            return;
        };
        let siblings: Vec<&String> = self
            .store
            .child_ids(parent_id)
            .iter()
            .filter(|c| c.as_str() != id)
            .collect();
        let Some(reference_index) = siblings.iter().position(|c| c.as_str() == reference) else {
            debug!(reference = %reference, "Insert reference is not a child of the target");
            return;
        };
        let index = match placement {
            Placement::Before => reference_index,
            Placement::After => reference_index + 1,
        };
        self.store.reparent(id, parent_id, Some(index));
    }
}
