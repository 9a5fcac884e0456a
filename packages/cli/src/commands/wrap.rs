use super::{load_document, write_document};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use pageweave_editor::TextRange;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct WrapArgs {
    /// Flat JSON node document
    pub document: PathBuf,

    /// Common ancestor of the selection
    #[arg(long)]
    pub ancestor: String,

    /// Selection start as `<text-node-id>:<offset>`
    #[arg(long)]
    pub start: String,

    /// Selection end as `<text-node-id>:<offset>`
    #[arg(long)]
    pub end: String,

    /// Wrap in a link instead of a span
    #[arg(long)]
    pub anchor: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn wrap(args: WrapArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut graph = load_document(&args.document, &config.engine)?;

    graph.require_node(&args.ancestor)?;
    let (start_node, start_offset) = parse_endpoint(&args.start)?;
    let (end_node, end_offset) = parse_endpoint(&args.end)?;
    let range = TextRange {
        start_node,
        start_offset,
        end_node,
        end_offset,
        common_ancestor: args.ancestor.clone(),
    };

    let wrapper = if args.anchor {
        graph.wrap_range_in_anchor(&range).await
    } else {
        graph.wrap_range_in_span(&range).await
    }
    .ok_or_else(|| anyhow!("Selection does not name text below {}", args.ancestor))?;

    write_document(&graph, args.output.as_deref())?;
    eprintln!("{} Wrapped selection in {}", "✓".green(), wrapper.bold());
    Ok(())
}

/// `node-id:offset`; the id itself may contain colons
fn parse_endpoint(value: &str) -> Result<(String, usize)> {
    let (id, offset) = value
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Expected <node-id>:<offset>, got {:?}", value))?;
    let offset = offset
        .parse::<usize>()
        .map_err(|_| anyhow!("Invalid offset in {:?}", value))?;
    Ok((id.to_string(), offset))
}
