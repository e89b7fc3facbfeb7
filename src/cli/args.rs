//! Top-level argument definitions

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::baseline::BaselineCommands;
use crate::cli::commands::completions::CompletionsArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::instance::InstanceCommands;
use crate::cli::commands::link::LinkCommands;
use crate::cli::commands::part::PartCommands;
use crate::cli::commands::product::ProductCommands;
use crate::cli::commands::tree::{PathsArgs, RollupArgs, TreeArgs};

#[derive(Parser, Debug)]
#[command(name = "tplm")]
#[command(version, about = "Tessera PLM - versioned parts and product structures as plain text")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long = "format", short = 'f', global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub output: OutputFormat,

    /// Act as this user instead of the configured one
    #[arg(long, global = true, env = "TPLM_USER")]
    pub user: Option<String>,

    /// Show debug logging
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project in the current directory
    Init(InitArgs),

    /// Part masters and their revision lifecycle
    #[command(subcommand)]
    Part(PartCommands),

    /// Products (configuration items)
    #[command(subcommand)]
    Product(ProductCommands),

    /// Show the resolved structure of a product
    Tree(TreeArgs),

    /// List every path at which a part occurs in a product
    Paths(PathsArgs),

    /// Flattened bill of material with quantities multiplied down the tree
    Rollup(RollupArgs),

    /// Frozen product baselines
    #[command(subcommand)]
    Baseline(BaselineCommands),

    /// Serial-numbered product instances
    #[command(subcommand)]
    Instance(InstanceCommands),

    /// Typed path-to-path links between nodes of a product
    #[command(subcommand)]
    Link(LinkCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tree for structures, table for lists, YAML for single entities
    #[default]
    Auto,
    /// Indented text tree
    Tree,
    /// Human-readable table
    Table,
    /// Tab-separated values
    Tsv,
    /// Comma-separated values
    Csv,
    Json,
    Yaml,
}
