//! `tplm part` command - Part masters, their structure and revision lifecycle

use console::style;
use miette::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::cli::helpers::{
    confirm, parse_attribute, parse_link_id, parse_part, revision_or_last, truncate_str, Session,
};
use crate::cli::output::{print_rows, print_value};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::lifecycle::allowed_transitions;
use crate::core::workspace::IterationEdit;
use crate::entities::link::{CadInstance, NewSubstitute, NewUsage};
use crate::entities::part::PartMaster;
use crate::structure::loader::{PartLoader, ReadView};

#[derive(clap::Subcommand, Debug)]
pub enum PartCommands {
    /// Create a part master (revision A, checked out by you)
    New(NewArgs),

    /// List part masters
    List(ListArgs),

    /// Show a part master with its revisions and components
    Show(ShowArgs),

    /// Check out a revision, starting a new working iteration
    Checkout(RevisionArgs),

    /// Check in your working iteration
    Checkin(RevisionArgs),

    /// Discard your working iteration
    Undo(RevisionArgs),

    /// Release a revision
    Release(RevisionArgs),

    /// Mark a released revision obsolete
    Obsolete(RevisionArgs),

    /// Start the next revision from the latest checked-in iteration
    NewVersion(NewVersionArgs),

    /// Add a usage link to your working iteration
    Use(UseArgs),

    /// Remove a usage link from your working iteration
    Unuse(UnuseArgs),

    /// Offer a substitute for a usage link of your working iteration
    Substitute(SubstituteArgs),

    /// Set attributes, attachments or the note of your working iteration
    Set(SetArgs),

    /// Restrict who may read a part master
    Readers(ReadersArgs),

    /// Delete a part master nothing else references
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Part number
    pub number: String,

    /// Part name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Check the first iteration in right away
    #[arg(long)]
    pub checkin: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only parts whose number or name contains this text
    #[arg(long)]
    pub search: Option<String>,

    /// Only parts checked out by you
    #[arg(long)]
    pub mine: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub number: String,
}

#[derive(clap::Args, Debug)]
pub struct RevisionArgs {
    pub number: String,

    /// Revision letter (defaults to the last revision)
    #[arg(long, short = 'r')]
    pub rev: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct NewVersionArgs {
    pub number: String,
}

#[derive(clap::Args, Debug)]
pub struct UseArgs {
    /// Parent assembly (must be checked out by you)
    pub parent: String,

    /// Component part number
    pub component: String,

    #[arg(long, short = 'a', default_value_t = 1.0)]
    pub amount: f64,

    #[arg(long, short = 'u')]
    pub unit: Option<String>,

    /// The link can be left out of a baseline
    #[arg(long)]
    pub optional: bool,

    /// Reference designator or note for this occurrence
    #[arg(long)]
    pub reference: Option<String>,

    /// Substitute part numbers offered for this link
    #[arg(long = "substitute", short = 's')]
    pub substitutes: Vec<String>,

    /// Placement of one occurrence as tx,ty,tz[,rx,ry,rz] (repeatable)
    #[arg(long = "at", allow_hyphen_values = true)]
    pub placements: Vec<CadInstance>,
}

#[derive(clap::Args, Debug)]
pub struct UnuseArgs {
    pub parent: String,

    /// Usage link id
    pub link: String,
}

#[derive(clap::Args, Debug)]
pub struct SubstituteArgs {
    pub parent: String,

    /// Usage link id
    pub link: String,

    /// Substitute part number
    pub substitute: String,

    #[arg(long, short = 'a', default_value_t = 1.0)]
    pub amount: f64,

    #[arg(long, short = 'u')]
    pub unit: Option<String>,

    /// Placement of one occurrence as tx,ty,tz[,rx,ry,rz] (repeatable)
    #[arg(long = "at", allow_hyphen_values = true)]
    pub placements: Vec<CadInstance>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    pub number: String,

    /// Attribute as key=value (repeatable)
    #[arg(long = "attr")]
    pub attributes: Vec<String>,

    /// Attach a file by name (repeatable)
    #[arg(long = "attach")]
    pub attachments: Vec<String>,

    /// Remove every attribute not given with --attr
    #[arg(long)]
    pub replace_attributes: bool,

    #[arg(long)]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ReadersArgs {
    pub number: String,

    /// Allowed readers; none opens the part to everybody
    pub readers: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    pub number: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: PartCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PartCommands::New(args) => run_new(args, global),
        PartCommands::List(args) => run_list(args, global),
        PartCommands::Show(args) => run_show(args, global),
        PartCommands::Checkout(args) => run_checkout(args, global),
        PartCommands::Checkin(args) => run_checkin(args, global),
        PartCommands::Undo(args) => run_undo(args, global),
        PartCommands::Release(args) => run_release(args, global),
        PartCommands::Obsolete(args) => run_obsolete(args, global),
        PartCommands::NewVersion(args) => run_new_version(args, global),
        PartCommands::Use(args) => run_use(args, global),
        PartCommands::Unuse(args) => run_unuse(args, global),
        PartCommands::Substitute(args) => run_substitute(args, global),
        PartCommands::Set(args) => run_set(args, global),
        PartCommands::Readers(args) => run_readers(args, global),
        PartCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let user = session.user.clone();
    let key = session
        .workspace
        .create_master(&args.number, &args.name, &user)?
        .number
        .clone();
    if args.checkin {
        session.workspace.check_in(&key, "A", &user)?;
    }
    session.save()?;

    let state = if args.checkin { "checked in" } else { "checked out" };
    println!(
        "{} Created part {} - {} (A.1, {})",
        style("✓").green(),
        style(&key).cyan(),
        style(&args.name).yellow(),
        state
    );
    Ok(())
}

#[derive(Debug, Tabled, Serialize)]
struct PartRow {
    #[tabled(rename = "NUMBER")]
    number: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "REV")]
    revision: String,
    #[tabled(rename = "ITERATION")]
    iteration: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "AUTHOR")]
    author: String,
}

fn part_row(master: &PartMaster, user: &str) -> PartRow {
    let revision = master.last_revision();
    PartRow {
        number: master.number.to_string(),
        name: truncate_str(&master.name, 40),
        revision: revision.map_or_else(|| "-".to_string(), |r| r.version.clone()),
        iteration: revision
            .and_then(|r| r.last_accessible_iteration(Some(user)))
            .map_or_else(|| "-".to_string(), |i| i.number.to_string()),
        state: revision.map_or_else(|| "-".to_string(), |r| r.state.to_string()),
        author: master.author.clone(),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let search = args.search.as_deref().map(str::to_lowercase);
    let rows: Vec<PartRow> = session
        .workspace
        .masters()
        .filter(|m| m.can_read(&session.user))
        .filter(|m| {
            search.as_deref().is_none_or(|s| {
                m.number.as_str().to_lowercase().contains(s) || m.name.to_lowercase().contains(s)
            })
        })
        .filter(|m| {
            !args.mine
                || m.last_revision()
                    .is_some_and(|r| r.is_checked_out_by(&session.user))
        })
        .map(|m| part_row(m, &session.user))
        .collect();

    if rows.is_empty() && global.output == OutputFormat::Auto {
        println!("No parts found.");
        return Ok(());
    }
    print_rows(&rows, global.output)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let master = session
        .workspace
        .load_master(&key, ReadView::of(&session.user))?;

    if matches!(global.output, OutputFormat::Json | OutputFormat::Yaml) {
        return print_value(&*master, global.output);
    }

    let links = session.workspace.links();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Part").bold(), style(&master.number).cyan());
    println!("{}: {}", style("Name").bold(), style(&master.name).yellow());
    println!("{}: {}", style("Author").bold(), master.author);
    if !master.readers.is_empty() {
        println!("{}: {}", style("Readers").bold(), master.readers.join(", "));
    }
    println!("{}", style("─".repeat(60)).dim());

    for revision in &master.revisions {
        let allowed: Vec<String> = allowed_transitions(&master, &revision.version, &session.user)
            .iter()
            .map(ToString::to_string)
            .collect();
        println!();
        println!(
            "{} {} ({} iteration{}){}",
            style(format!("Revision {}", revision.version)).bold(),
            revision.state,
            revision.iterations.len(),
            if revision.iterations.len() == 1 { "" } else { "s" },
            if allowed.is_empty() {
                String::new()
            } else {
                format!("  {}", style(format!("[{}]", allowed.join(", "))).dim())
            }
        );
        let Some(iteration) = revision.last_iteration() else {
            continue;
        };
        let working = !revision.is_iteration_checked_in(iteration.number);
        println!(
            "  {}.{}{}",
            revision.version,
            iteration.number,
            if working { " (working)" } else { "" }
        );
        if let Some(note) = &iteration.note {
            println!("    note: {}", note);
        }
        for (key, value) in &iteration.attributes {
            println!("    {} = {}", style(key).cyan(), value);
        }
        for attachment in &iteration.attachments {
            println!("    file: {}", attachment.full_name);
        }
        for id in &iteration.components {
            let Some(usage) = links.usage(*id) else {
                continue;
            };
            let unit = usage.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default();
            let optional = if usage.optional { " (optional)" } else { "" };
            println!(
                "    u{} → {} x{}{}{}",
                usage.id,
                style(&usage.component).cyan(),
                usage.amount,
                unit,
                optional
            );
            for instance in &usage.cad_instances {
                print_placement(instance);
            }
            for sub_id in &usage.substitutes {
                if let Some(sub) = links.substitute(*sub_id) {
                    println!(
                        "      s{} ⇄ {} x{}",
                        sub.id,
                        style(&sub.substitute).cyan(),
                        sub.amount
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_placement(instance: &CadInstance) {
    let [tx, ty, tz] = instance.translation;
    let [rx, ry, rz] = instance.rotation;
    println!(
        "        {} ({}, {}, {}) rot ({}, {}, {})",
        style("at").dim(),
        tx,
        ty,
        tz,
        rx,
        ry,
        rz
    );
}

fn run_checkout(args: RevisionArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let version = revision_or_last(session.workspace.master(&key)?, args.rev.as_deref())?;
    let user = session.user.clone();
    let at = session.workspace.check_out(&key, &version, &user)?;
    session.save()?;
    println!("{} Checked out {} {}", style("✓").green(), style(&key).cyan(), at);
    Ok(())
}

fn run_checkin(args: RevisionArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let version = revision_or_last(session.workspace.master(&key)?, args.rev.as_deref())?;
    let user = session.user.clone();
    let at = session.workspace.check_in(&key, &version, &user)?;
    session.save()?;
    println!("{} Checked in {} {}", style("✓").green(), style(&key).cyan(), at);
    Ok(())
}

fn run_undo(args: RevisionArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let version = revision_or_last(session.workspace.master(&key)?, args.rev.as_deref())?;
    let user = session.user.clone();
    let outcome = session.workspace.undo_check_out(&key, &version, &user)?;
    session.save()?;

    println!(
        "{} Discarded working iteration of {}-{}",
        style("✓").green(),
        style(&key).cyan(),
        version
    );
    for file in &outcome.released_files {
        println!("  {} released {}", style("-").dim(), file);
    }
    if outcome.pruned_links > 0 {
        println!(
            "  {} {} path link(s) no longer resolved and were removed",
            style("!").yellow(),
            outcome.pruned_links
        );
    }
    Ok(())
}

fn run_release(args: RevisionArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let version = revision_or_last(session.workspace.master(&key)?, args.rev.as_deref())?;
    let user = session.user.clone();
    session.workspace.release(&key, &version, &user)?;
    session.save()?;
    println!("{} Released {}-{}", style("✓").green(), style(&key).cyan(), version);
    Ok(())
}

fn run_obsolete(args: RevisionArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let version = revision_or_last(session.workspace.master(&key)?, args.rev.as_deref())?;
    let user = session.user.clone();
    session.workspace.mark_obsolete(&key, &version, &user)?;
    session.save()?;
    println!(
        "{} Marked {}-{} obsolete",
        style("✓").green(),
        style(&key).cyan(),
        version
    );
    Ok(())
}

fn run_new_version(args: NewVersionArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let user = session.user.clone();
    let version = session.workspace.new_version(&key, &user)?;
    session.save()?;
    println!(
        "{} Created revision {}-{} (checked out)",
        style("✓").green(),
        style(&key).cyan(),
        version
    );
    Ok(())
}

fn run_use(args: UseArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let parent = parse_part(&args.parent)?;
    let mut request = NewUsage::of(parse_part(&args.component)?).amount(args.amount);
    if let Some(unit) = args.unit {
        request = request.unit(unit);
    }
    if args.optional {
        request = request.optional();
    }
    request.reference_description = args.reference;
    request.cad_instances = args.placements;
    for substitute in &args.substitutes {
        request = request.substitute(NewSubstitute::of(parse_part(substitute)?));
    }
    let user = session.user.clone();
    let id = session.workspace.add_component(&parent, &user, request)?;
    session.save()?;
    println!(
        "{} {} uses {} x{} (link u{})",
        style("✓").green(),
        style(&parent).cyan(),
        style(&args.component).cyan(),
        args.amount,
        id
    );
    Ok(())
}

fn run_unuse(args: UnuseArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let parent = parse_part(&args.parent)?;
    let link = parse_link_id(&args.link)?;
    let user = session.user.clone();
    session.workspace.remove_component(&parent, &user, link)?;
    session.save()?;
    println!(
        "{} Removed link u{} from {}",
        style("✓").green(),
        link,
        style(&parent).cyan()
    );
    Ok(())
}

fn run_substitute(args: SubstituteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let parent = parse_part(&args.parent)?;
    let link = parse_link_id(&args.link)?;
    let mut substitute = NewSubstitute::of(parse_part(&args.substitute)?);
    substitute.amount = args.amount;
    substitute.unit = args.unit;
    substitute.cad_instances = args.placements;
    let user = session.user.clone();
    let id = session
        .workspace
        .add_substitute(&parent, &user, link, substitute)?;
    session.save()?;
    println!(
        "{} {} may replace {} (usage link is now u{})",
        style("✓").green(),
        style(&args.substitute).cyan(),
        link,
        id
    );
    Ok(())
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    let user = session.user.clone();

    let working = session
        .workspace
        .master(&key)?
        .last_revision()
        .filter(|r| r.is_checked_out_by(&user))
        .and_then(|r| r.last_iteration())
        .cloned()
        .ok_or_else(|| miette::miette!("{} is not checked out by {}", key, user))?;

    let attributes = if args.attributes.is_empty() && !args.replace_attributes {
        None
    } else {
        let mut attributes: BTreeMap<String, String> = if args.replace_attributes {
            BTreeMap::new()
        } else {
            working.attributes.clone()
        };
        for attribute in &args.attributes {
            let (name, value) = parse_attribute(attribute)?;
            attributes.insert(name, value);
        }
        Some(attributes)
    };
    let attachments = if args.attachments.is_empty() {
        None
    } else {
        let mut names: Vec<String> = working.attachments.iter().map(|a| a.name.clone()).collect();
        for name in args.attachments {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Some(names)
    };

    let at = session.workspace.update_iteration(
        &key,
        &user,
        IterationEdit {
            components: None,
            attributes,
            attachments,
            note: args.note,
        },
    )?;
    session.save()?;
    println!("{} Updated {} {}", style("✓").green(), style(&key).cyan(), at);
    Ok(())
}

fn run_readers(args: ReadersArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    session.workspace.set_readers(&key, args.readers.clone())?;
    session.save()?;
    if args.readers.is_empty() {
        println!("{} {} is readable by everybody", style("✓").green(), style(&key).cyan());
    } else {
        println!(
            "{} {} is readable by {}",
            style("✓").green(),
            style(&key).cyan(),
            args.readers.join(", ")
        );
    }
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let key = parse_part(&args.number)?;
    session.workspace.master(&key)?;
    if !confirm(&format!("Delete part {} and all its revisions?", key), args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    session.workspace.delete_master(&key)?;
    session.save()?;
    println!("{} Deleted part {}", style("✓").green(), style(&key).cyan());
    Ok(())
}
