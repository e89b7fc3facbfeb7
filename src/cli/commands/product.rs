//! `tplm product` command - Configuration items

use console::style;
use miette::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::{parse_part, truncate_str, Session};
use crate::cli::output::{print_rows, print_value};
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(clap::Subcommand, Debug)]
pub enum ProductCommands {
    /// Create a product whose design item is a root assembly
    New(NewArgs),

    /// List products
    List,

    /// Show a product
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Product id
    pub id: String,

    /// Root assembly part number
    #[arg(long, short = 'p')]
    pub part: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub id: String,
}

pub fn run(cmd: ProductCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ProductCommands::New(args) => run_new(args, global),
        ProductCommands::List => run_list(global),
        ProductCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let part = parse_part(&args.part)?;
    let id = session
        .workspace
        .create_product(&args.id, &part, args.description)?
        .id
        .clone();
    session.save()?;
    println!(
        "{} Created product {} on {}",
        style("✓").green(),
        style(&id).cyan(),
        style(&part).cyan()
    );
    Ok(())
}

#[derive(Debug, Tabled, Serialize)]
struct ProductRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DESIGN ITEM")]
    design_item: String,
    #[tabled(rename = "BASELINES")]
    baselines: usize,
    #[tabled(rename = "INSTANCES")]
    instances: usize,
    #[tabled(rename = "LINKS")]
    links: usize,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let ws = &session.workspace;
    let rows: Vec<ProductRow> = ws
        .products()
        .map(|p| ProductRow {
            id: p.id.clone(),
            design_item: p.design_item.to_string(),
            baselines: ws.baselines_of(&p.id).count(),
            instances: ws.instances_of(&p.id).count(),
            links: p.path_links.len(),
            description: truncate_str(p.description.as_deref().unwrap_or("-"), 40),
        })
        .collect();

    if rows.is_empty() && global.output == OutputFormat::Auto {
        println!("No products found.");
        return Ok(());
    }
    print_rows(&rows, global.output)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let product = session.workspace.product(&args.id)?;
    print_value(product, global.output)
}
