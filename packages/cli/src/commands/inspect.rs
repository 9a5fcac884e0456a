use super::load_document;
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use pageweave_editor::{DocumentGraph, NodeKind};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Flat JSON node document
    pub document: PathBuf,

    /// Only report integrity problems
    #[arg(long)]
    pub check: bool,
}

pub fn inspect(args: InspectArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let graph = load_document(&args.document, &config.engine)?;

    if !args.check {
        match graph.root_id() {
            Some(root) => print_tree(&graph, root, 0),
            None => println!("{}", "Document is empty".yellow()),
        }
        println!();
    }

    let violations = graph.check_integrity();
    if violations.is_empty() {
        println!("{} {} nodes, tree is consistent", "✓".green(), graph.store().len());
        Ok(())
    } else {
        for violation in &violations {
            eprintln!("  {} {:?}", "✗".red(), violation);
        }
        Err(anyhow!("{} integrity violations", violations.len()))
    }
}

fn print_tree(graph: &DocumentGraph, id: &str, depth: usize) {
    let Some(node) = graph.get_node(id) else {
        return;
    };

    let label = match &node.kind {
        NodeKind::Tag { tag_name, text: Some(text), .. } if tag_name == "text" => {
            format!("{:?}", text).normal()
        }
        NodeKind::Tag { tag_name, .. } => format!("<{}>", tag_name).cyan(),
        NodeKind::Page { title, .. } | NodeKind::Pane { title, .. } => {
            format!("{:?} {}", node.node_type(), title).bright_blue().bold()
        }
        _ => format!("{:?}", node.node_type()).bright_blue(),
    };
    let dirty = if node.dirty { " *".yellow().to_string() } else { String::new() };

    println!("{}{} {}{}", "  ".repeat(depth), label, node.id.dimmed(), dirty);
    for child in graph.get_child_node_ids(id) {
        print_tree(graph, &child, depth + 1);
    }
}
