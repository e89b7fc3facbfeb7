//! `tplm tree`, `tplm paths` and `tplm rollup` - structure queries on a product

use console::style;
use miette::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::{parse_part, Session};
use crate::cli::output::{print_rows, print_tree, print_value};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::structure::filter::ConfigSpec;
use crate::structure::path::Path;
use crate::structure::resolver::{Start, StructureResolver};
use crate::structure::selector::FilterSelector;

/// Configuration selection shared by the structure queries
#[derive(clap::Args, Debug)]
pub struct FilterArgs {
    /// wip, latest, released, latest-released, pi-<serial> or a baseline id
    #[arg(long, short = 'F')]
    pub filter: Option<String>,

    /// Also list substitutes next to their usage links
    #[arg(long)]
    pub diverge: bool,
}

impl FilterArgs {
    pub fn spec(&self, session: &Session, product: &str) -> Result<ConfigSpec> {
        let selector: FilterSelector = self
            .filter
            .as_deref()
            .unwrap_or(&session.config.default_filter)
            .parse()?;
        let diverge = self.diverge || session.config.diverge;
        Ok(session
            .workspace
            .config_spec(product, &selector, &session.user, diverge)?)
    }
}

#[derive(clap::Args, Debug)]
pub struct TreeArgs {
    /// Product id
    pub product: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Levels to expand below the start node; -1 means unlimited
    #[arg(long, short = 'd', allow_hyphen_values = true)]
    pub depth: Option<i32>,

    /// Start at this path instead of the root, e.g. -1-u12
    #[arg(long, allow_hyphen_values = true)]
    pub path: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PathsArgs {
    pub product: String,

    /// Part number to look for
    #[arg(long, short = 'p')]
    pub part: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(clap::Args, Debug)]
pub struct RollupArgs {
    pub product: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run_tree(args: TreeArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let spec = args.filter.spec(&session, &args.product)?;
    let root = session.workspace.product(&args.product)?.design_item.clone();
    let depth = Config::max_depth(args.depth.unwrap_or(session.config.default_depth));
    let start = match &args.path {
        Some(path) => Start::Path {
            root,
            path: path.parse::<Path>()?,
        },
        None => Start::Part(root),
    };

    let resolver = StructureResolver::new(&session.workspace).reading_as(session.user.as_str());
    match resolver.resolve_tree(&spec, start, depth)? {
        Some(tree) => print_tree(&tree, global.output),
        None => {
            eprintln!(
                "{} Nothing of {} is visible under filter '{}'",
                style("!").yellow(),
                args.product,
                spec.label()
            );
            Ok(())
        }
    }
}

pub fn run_paths(args: PathsArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let spec = args.filter.spec(&session, &args.product)?;
    let root = session.workspace.product(&args.product)?.design_item.clone();
    let part = parse_part(&args.part)?;

    let resolver = StructureResolver::new(&session.workspace).reading_as(session.user.as_str());
    let paths: Vec<String> = resolver
        .find_paths(&spec, root, |node| node.part == part)?
        .iter()
        .map(ToString::to_string)
        .collect();

    match global.output {
        OutputFormat::Json | OutputFormat::Yaml => print_value(&paths, global.output),
        _ => {
            for path in &paths {
                println!("{}", path);
            }
            Ok(())
        }
    }
}

#[derive(Debug, Tabled, Serialize)]
struct RollupRow {
    #[tabled(rename = "PART")]
    part: String,
    #[tabled(rename = "QUANTITY")]
    quantity: f64,
    #[tabled(rename = "UNIT")]
    unit: String,
    #[tabled(rename = "OCCURRENCES")]
    occurrences: usize,
}

pub fn run_rollup(args: RollupArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let spec = args.filter.spec(&session, &args.product)?;
    let root = session.workspace.product(&args.product)?.design_item.clone();

    let resolver = StructureResolver::new(&session.workspace).reading_as(session.user.as_str());
    let rows: Vec<RollupRow> = resolver
        .rollup(&spec, root)?
        .into_iter()
        .map(|line| RollupRow {
            part: line.part.to_string(),
            quantity: line.quantity,
            unit: line.unit.unwrap_or_else(|| "-".to_string()),
            occurrences: line.occurrences,
        })
        .collect();
    print_rows(&rows, global.output)
}
