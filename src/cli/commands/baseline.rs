//! `tplm baseline` command - Frozen configurations of a product

use console::style;
use miette::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::{parse_link_id, truncate_str, Session};
use crate::cli::output::{print_rows, print_value};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::baseline::{BaselineChoices, BaselineKind};

#[derive(clap::Subcommand, Debug)]
pub enum BaselineCommands {
    /// Freeze one iteration per part of a product
    New(NewArgs),

    /// List the baselines of a product
    List(ListArgs),

    /// Show a baseline
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Product id
    pub product: String,

    #[arg(long, short = 'n')]
    pub name: String,

    /// latest (newest checked-in iterations) or released
    #[arg(long = "type", short = 't', default_value = "latest")]
    pub kind: BaselineKind,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Use a substitute at a usage-link path, as PATH=LINK (repeatable)
    #[arg(long = "choose", allow_hyphen_values = true)]
    pub choices: Vec<String>,

    /// Leave out the optional usage link at PATH (repeatable)
    #[arg(long = "exclude", allow_hyphen_values = true)]
    pub excluded: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    pub product: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub product: String,

    /// Baseline id
    pub id: u32,
}

pub fn run(cmd: BaselineCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        BaselineCommands::New(args) => run_new(args, global),
        BaselineCommands::List(args) => run_list(args, global),
        BaselineCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;

    let mut choices = BaselineChoices::default();
    for choice in &args.choices {
        let (path, link) = choice
            .split_once('=')
            .ok_or_else(|| miette::miette!("Expected PATH=LINK, got '{}'", choice))?;
        choices
            .substitutes
            .insert(path.trim().to_string(), parse_link_id(link)?);
    }
    choices
        .excluded_optional
        .extend(args.excluded.iter().map(|p| p.trim().to_string()));

    let user = session.user.clone();
    let baseline = session.workspace.create_baseline(
        &args.product,
        &args.name,
        args.kind,
        args.description,
        &user,
        choices,
    )?;
    let (id, parts) = (baseline.id, baseline.configuration.parts.len());
    session.save()?;

    println!(
        "{} Created {} baseline {} '{}' of {} ({} parts)",
        style("✓").green(),
        args.kind,
        style(id).cyan(),
        args.name,
        style(&args.product).cyan(),
        parts
    );
    Ok(())
}

#[derive(Debug, Tabled, Serialize)]
struct BaselineRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    kind: String,
    #[tabled(rename = "PARTS")]
    parts: usize,
    #[tabled(rename = "AUTHOR")]
    author: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    session.workspace.product(&args.product)?;
    let rows: Vec<BaselineRow> = session
        .workspace
        .baselines_of(&args.product)
        .map(|b| BaselineRow {
            id: b.id,
            name: truncate_str(&b.name, 40),
            kind: b.kind.to_string(),
            parts: b.configuration.parts.len(),
            author: b.author.clone(),
            created: b.created.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    if rows.is_empty() && global.output == OutputFormat::Auto {
        println!("No baselines found.");
        return Ok(());
    }
    print_rows(&rows, global.output)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let baseline = session.workspace.baseline(&args.product, args.id)?;
    print_value(baseline, global.output)
}
