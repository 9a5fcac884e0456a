mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{insert_pane, inspect, wrap, InsertPaneArgs, InspectArgs, WrapArgs};
use tracing_subscriber::EnvFilter;

/// Pageweave CLI - run document graph operations against flat node documents
#[derive(Parser, Debug)]
#[command(name = "pageweave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a document tree and check its integrity
    Inspect(InspectArgs),

    /// Instantiate a section template into a page
    InsertPane(InsertPaneArgs),

    /// Wrap a text selection in a span or link
    Wrap(WrapArgs),
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match cli.command {
        Command::Inspect(args) => inspect(args, &cwd),
        Command::InsertPane(args) => insert_pane(args, &cwd),
        Command::Wrap(args) => wrap(args, &cwd).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
