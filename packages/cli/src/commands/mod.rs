pub mod insert_pane;
pub mod inspect;
pub mod wrap;

pub use insert_pane::{insert_pane, InsertPaneArgs};
pub use inspect::{inspect, InspectArgs};
pub use wrap::{wrap, WrapArgs};

use anyhow::{Context, Result};
use pageweave_editor::{DocumentGraph, EngineConfig, Node};
use std::fs;
use std::path::Path;
use tracing::info;

/// Read a flat JSON node array into a graph
pub fn load_document(path: &Path, config: &EngineConfig) -> Result<DocumentGraph> {
    let content = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let nodes: Vec<Node> =
        serde_json::from_str(&content).with_context(|| format!("{} is not a node list", path.display()))?;

    let count = nodes.len();
    let graph = DocumentGraph::from_nodes(config.clone(), nodes);
    if graph.store().len() < count {
        info!(
            skipped = count - graph.store().len(),
            "Some nodes were not reachable from the root and were dropped"
        );
    }
    Ok(graph)
}

/// Write the graph back as a flat node array, to `output` or stdout
pub fn write_document(graph: &DocumentGraph, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(&graph.to_flat_nodes())?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;
        }
        None => println!("{}", json),
    }
    Ok(())
}
