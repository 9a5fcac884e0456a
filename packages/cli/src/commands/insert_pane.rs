use super::{load_document, write_document};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use pageweave_editor::{Placement, TemplateNode};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InsertPaneArgs {
    /// Flat JSON node document
    pub document: PathBuf,

    /// Page receiving the new section
    #[arg(long)]
    pub page: String,

    /// Section template (nested JSON)
    #[arg(short, long)]
    pub template: PathBuf,

    /// Insert after this section
    #[arg(long, conflicts_with = "before")]
    pub after: Option<String>,

    /// Insert before this section
    #[arg(long)]
    pub before: Option<String>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn insert_pane(args: InsertPaneArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut graph = load_document(&args.document, &config.engine)?;

    graph.require_node(&args.page)?;
    let template = TemplateNode::from_file(&args.template)
        .with_context(|| format!("Cannot load template {}", args.template.display()))?;

    let (insert_ref, placement) = match (&args.before, &args.after) {
        (Some(id), _) => (Some(id.as_str()), Placement::Before),
        (None, Some(id)) => (Some(id.as_str()), Placement::After),
        (None, None) => (None, Placement::After),
    };

    let pane_id = graph
        .add_template_pane(&args.page, &template, insert_ref, placement)?
        .ok_or_else(|| anyhow!("{} is not a page in this document", args.page))?;

    write_document(&graph, args.output.as_deref())?;
    eprintln!(
        "{} Inserted section {} ({} nodes)",
        "✓".green(),
        pane_id.bold(),
        graph.get_nodes_recursively(&pane_id).len()
    );
    Ok(())
}
