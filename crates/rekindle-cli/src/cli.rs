use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "rekindle",
    about = "GitOps recovery controller: detects stuck reconciliations and orchestrates dependency-aware cleanup and re-creation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the recovery controller until interrupted.
    Run {
        /// Path to the recovery pattern catalog.
        #[arg(long, env = "REKINDLE_CATALOG", default_value = "recovery-patterns.yaml")]
        catalog: PathBuf,

        /// Webhook URL for escalation notifications.
        #[arg(long, env = "REKINDLE_WEBHOOK")]
        webhook: Option<String>,

        /// Enable automatic recovery regardless of the catalog setting.
        #[arg(long)]
        auto_recover: bool,
    },

    /// Plan cleanup and recreation for a set of failed resources.
    Plan {
        /// Failed resources in namespace/kind/name form.
        #[arg(required = true)]
        resources: Vec<String>,

        /// Directory of manifests to build the dependency graph from;
        /// omitted, a built-in sample topology is used.
        #[arg(long)]
        manifests: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value = "text")]
        output: OutputFormat,
    },

    /// Show the blast radius of one resource.
    Impact {
        /// Resource in namespace/kind/name form.
        resource: String,

        /// Directory of manifests to build the dependency graph from.
        #[arg(long)]
        manifests: Option<PathBuf>,
    },

    /// Render the dependency graph.
    Graph {
        /// Directory of manifests to build the dependency graph from.
        #[arg(long)]
        manifests: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value = "text")]
        output: GraphOutput,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum GraphOutput {
    Text,
    Json,
    Dot,
}
