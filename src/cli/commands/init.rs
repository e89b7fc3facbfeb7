//! `tplm init` command - Create a new project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::core::project::Project;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to the current directory)
    pub path: Option<PathBuf>,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => std::env::current_dir().into_diagnostic()?,
    };
    std::fs::create_dir_all(&path).into_diagnostic()?;
    let project = Project::init(&path).map_err(|e| miette::miette!("{}", e))?;

    println!(
        "{} Initialized tplm project at {}",
        style("✓").green(),
        style(project.root().display()).cyan()
    );
    println!();
    println!("Next steps:");
    println!("  tplm part new ASM-001 --name \"Top assembly\"");
    println!("  tplm product new PRD-001 --part ASM-001");
    Ok(())
}
