//! `tplm instance` command - Serial-numbered product instances

use console::style;
use miette::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::helpers::Session;
use crate::cli::output::{print_rows, print_value};
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(clap::Subcommand, Debug)]
pub enum InstanceCommands {
    /// Create an instance frozen from a baseline
    New(InstanceArgs),

    /// Add an instance iteration frozen from another baseline
    Rebase(InstanceArgs),

    /// List the instances of a product
    List(ListArgs),

    /// Show an instance with all its iterations
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstanceArgs {
    /// Product id
    pub product: String,

    /// Serial number
    pub serial: String,

    /// Baseline id to freeze from
    #[arg(long, short = 'b')]
    pub baseline: u32,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    pub product: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub product: String,
    pub serial: String,
}

pub fn run(cmd: InstanceCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        InstanceCommands::New(args) => run_new(args, global),
        InstanceCommands::Rebase(args) => run_rebase(args, global),
        InstanceCommands::List(args) => run_list(args, global),
        InstanceCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: InstanceArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let user = session.user.clone();
    session
        .workspace
        .create_product_instance(&args.product, &args.serial, args.baseline, &user)?;
    session.save()?;
    println!(
        "{} Created instance {} of {} from baseline {}",
        style("✓").green(),
        style(&args.serial).cyan(),
        style(&args.product).cyan(),
        args.baseline
    );
    Ok(())
}

fn run_rebase(args: InstanceArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let user = session.user.clone();
    let iteration = session
        .workspace
        .rebase_product_instance(&args.product, &args.serial, args.baseline, &user)?
        .last_iteration()
        .map_or(0, |i| i.number);
    session.save()?;
    println!(
        "{} Instance {} of {} is now at iteration {} (baseline {})",
        style("✓").green(),
        style(&args.serial).cyan(),
        style(&args.product).cyan(),
        iteration,
        args.baseline
    );
    Ok(())
}

#[derive(Debug, Tabled, Serialize)]
struct InstanceRow {
    #[tabled(rename = "SERIAL")]
    serial: String,
    #[tabled(rename = "ITERATION")]
    iteration: u32,
    #[tabled(rename = "BASELINE")]
    baseline: u32,
    #[tabled(rename = "PARTS")]
    parts: usize,
    #[tabled(rename = "AUTHOR")]
    author: String,
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    session.workspace.product(&args.product)?;
    let rows: Vec<InstanceRow> = session
        .workspace
        .instances_of(&args.product)
        .filter_map(|instance| {
            instance.last_iteration().map(|last| InstanceRow {
                serial: instance.serial.clone(),
                iteration: last.number,
                baseline: last.based_on,
                parts: last.configuration.parts.len(),
                author: last.author.clone(),
            })
        })
        .collect();

    if rows.is_empty() && global.output == OutputFormat::Auto {
        println!("No instances found.");
        return Ok(());
    }
    print_rows(&rows, global.output)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let instance = session
        .workspace
        .product_instance(&args.product, &args.serial)?;
    print_value(instance, global.output)
}
