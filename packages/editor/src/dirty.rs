//! Persistence-facing queries over the dirty flag.
//!
//! The save path pushes what [`DocumentGraph::get_dirty_nodes`] returns and
//! calls [`DocumentGraph::clear_dirty`] once the backend accepted it.

use crate::graph::DocumentGraph;
use crate::node::{Node, NodeType};
use serde::Serialize;
use std::collections::BTreeMap;

/// Style payload of a changed node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassData {
    pub id: String,
    pub node_type: NodeType,
    pub classes: BTreeMap<String, String>,
}

impl DocumentGraph {
    /// Every node changed since the last save, ordered by id
    pub fn get_dirty_nodes(&self) -> Vec<Node> {
        let mut dirty: Vec<Node> = self
            .store
            .nodes()
            .values()
            .filter(|n| n.dirty)
            .cloned()
            .collect();
        dirty.sort_by(|a, b| a.id.cmp(&b.id));
        dirty
    }

    /// Class attributes of the dirty nodes whose type carries them
    pub fn get_dirty_nodes_class_data(&self) -> Vec<ClassData> {
        self.get_dirty_nodes()
            .into_iter()
            .filter_map(|node| {
                let classes = node.kind.classes()?.clone();
                Some(ClassData {
                    node_type: node.node_type(),
                    id: node.id,
                    classes,
                })
            })
            .collect()
    }

    /// Clear every dirty flag. Returns how many nodes were dirty.
    pub fn clear_dirty(&mut self) -> usize {
        let ids: Vec<String> = self
            .store
            .nodes()
            .values()
            .filter(|n| n.dirty)
            .map(|n| n.id.clone())
            .collect();
        for id in &ids {
            if let Some(node) = self.store.get_mut(id) {
                node.dirty = false;
            }
        }
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::ModifyOptions;
    use crate::node::NodeKind;
    use pageweave_common::EngineConfig;

    #[test]
    fn test_dirty_lifecycle() {
        let mut graph = DocumentGraph::new(EngineConfig::default());
        graph.add_node(Node::new("doc", None, NodeKind::Document { title: String::new() }));
        graph.add_node(Node::new("pane", Some("doc".to_string()), NodeKind::pane("Hero")));
        graph.add_node(Node::new("t", Some("pane".to_string()), NodeKind::text("hi")));

        assert_eq!(graph.get_dirty_nodes().len(), 3);
        assert_eq!(graph.clear_dirty(), 3);
        assert!(graph.get_dirty_nodes().is_empty());

        let mut edited = graph.get_node("t").cloned().unwrap();
        edited.set_text("hello".to_string());
        graph.modify_nodes(vec![edited], ModifyOptions::default());

        let ids: Vec<String> = graph.get_dirty_nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["pane".to_string(), "t".to_string()]);

        let class_data = graph.get_dirty_nodes_class_data();
        assert_eq!(class_data.len(), 2);
        assert_eq!(class_data[0].node_type, NodeType::Pane);
    }
}
