//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// keel - interface generation and relocatable component builds
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to Keel.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub manifest_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate, assemble and verify components
    Build(BuildArgs),

    /// Print the build graph as JSON without running it
    Plan(PlanArgs),

    /// Remove the output directory
    Clean,
}

/// Profile and component selection shared by `build` and `plan`.
#[derive(Args)]
pub struct SelectionArgs {
    /// Component profile from Keel.toml
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Override the profile's architecture
    #[arg(long)]
    pub arch: Option<String>,

    /// Override the profile's platform
    #[arg(long)]
    pub platform: Option<String>,

    /// Only these components and the components they use
    #[arg(short, long = "component")]
    pub components: Vec<String>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format: human or json
    #[arg(long)]
    pub message_format: Option<String>,

    /// Pass -v to interface generators
    #[arg(long)]
    pub verbose_generator: bool,

    /// Write a manifest of verified components after a successful build
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}
