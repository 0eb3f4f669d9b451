mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            catalog,
            webhook,
            auto_recover,
        } => commands::run(catalog, webhook, auto_recover).await,
        Command::Plan {
            resources,
            manifests,
            output,
        } => commands::plan(resources, manifests, output).await,
        Command::Impact {
            resource,
            manifests,
        } => commands::impact(resource, manifests).await,
        Command::Graph { manifests, output } => commands::graph(manifests, output).await,
    }
}
