//! `tplm link` command - Typed path-to-path links between nodes of a product

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::Tabled;
use ulid::Ulid;

use crate::cli::commands::tree::FilterArgs;
use crate::cli::helpers::{confirm, truncate_str, Session};
use crate::cli::output::{print_rows, print_tree, print_value};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::product::PathToPathLink;

#[derive(clap::Subcommand, Debug)]
pub enum LinkCommands {
    /// Link two paths of a product
    Add(AddLinkArgs),

    /// List the links of a product
    List(ListLinksArgs),

    /// Remove a link
    Rm(RemoveLinkArgs),

    /// Change the description of a link
    Describe(DescribeLinkArgs),

    /// List the link types used on a product
    Types(TypesArgs),

    /// Show the source nodes of the root links of one type
    Roots(RootsArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddLinkArgs {
    /// Product id
    pub product: String,

    /// Link type (wired_to, mates_with, ...)
    #[arg(long, short = 't')]
    pub link_type: String,

    /// Source path, e.g. -1-u12
    #[arg(allow_hyphen_values = true)]
    pub source: String,

    /// Target path
    #[arg(allow_hyphen_values = true)]
    pub target: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListLinksArgs {
    pub product: String,

    /// Only links of this type
    #[arg(long, short = 't')]
    pub link_type: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveLinkArgs {
    pub product: String,

    /// Link id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct DescribeLinkArgs {
    pub product: String,

    pub id: String,

    /// New description; omit to clear it
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct TypesArgs {
    pub product: String,
}

#[derive(clap::Args, Debug)]
pub struct RootsArgs {
    pub product: String,

    #[arg(long, short = 't')]
    pub link_type: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run(cmd: LinkCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        LinkCommands::Add(args) => run_add(args, global),
        LinkCommands::List(args) => run_list(args, global),
        LinkCommands::Rm(args) => run_remove(args, global),
        LinkCommands::Describe(args) => run_describe(args, global),
        LinkCommands::Types(args) => run_types(args, global),
        LinkCommands::Roots(args) => run_roots(args, global),
    }
}

fn parse_id(s: &str) -> Result<Ulid> {
    Ulid::from_string(s.trim()).into_diagnostic()
}

fn run_add(args: AddLinkArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let link = session.workspace.create_path_link(
        &args.product,
        &args.link_type,
        &args.source,
        &args.target,
        args.description,
    )?;
    session.save()?;
    println!(
        "{} Added link {}: {} --[{}]--> {}",
        style("✓").green(),
        style(link.id).dim(),
        link.source,
        style(&link.link_type).cyan(),
        link.target
    );
    Ok(())
}

#[derive(Debug, Tabled, Serialize)]
struct LinkRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TYPE")]
    link_type: String,
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "TARGET")]
    target: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

impl From<&PathToPathLink> for LinkRow {
    fn from(link: &PathToPathLink) -> Self {
        LinkRow {
            id: link.id.to_string(),
            link_type: link.link_type.clone(),
            source: link.source.to_string(),
            target: link.target.to_string(),
            description: truncate_str(link.description.as_deref().unwrap_or("-"), 40),
        }
    }
}

fn run_list(args: ListLinksArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let links: Vec<&PathToPathLink> = match &args.link_type {
        Some(link_type) => session
            .workspace
            .path_links_of_type(&args.product, link_type)?,
        None => session
            .workspace
            .product(&args.product)?
            .path_links
            .iter()
            .collect(),
    };
    let rows: Vec<LinkRow> = links.into_iter().map(LinkRow::from).collect();

    if rows.is_empty() && global.output == OutputFormat::Auto {
        println!("No links found.");
        return Ok(());
    }
    print_rows(&rows, global.output)
}

fn run_remove(args: RemoveLinkArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = parse_id(&args.id)?;
    if !confirm(&format!("Remove link {}?", id), args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    let removed = session.workspace.delete_path_link(&args.product, id)?;
    session.save()?;
    println!(
        "{} Removed link: {} --[{}]--> {}",
        style("✓").green(),
        removed.source,
        style(&removed.link_type).cyan(),
        removed.target
    );
    Ok(())
}

fn run_describe(args: DescribeLinkArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let id = parse_id(&args.id)?;
    session
        .workspace
        .update_path_link_description(&args.product, id, args.description)?;
    session.save()?;
    println!("{} Updated link {}", style("✓").green(), style(id).dim());
    Ok(())
}

fn run_types(args: TypesArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let types = session.workspace.path_link_types(&args.product)?;
    match global.output {
        OutputFormat::Json | OutputFormat::Yaml => print_value(&types, global.output),
        _ => {
            for link_type in &types {
                println!("{}", link_type);
            }
            Ok(())
        }
    }
}

fn run_roots(args: RootsArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let spec = args.filter.spec(&session, &args.product)?;
    let tree = session
        .workspace
        .path_link_roots(&args.product, &args.link_type, &spec, &session.user)?;
    print_tree(&tree, global.output)
}
