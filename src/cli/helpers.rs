//! Shared helper functions for CLI commands

use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::identity::{LinkId, PartKey};
use crate::core::project::Project;
use crate::core::workspace::Workspace;
use crate::entities::part::PartMaster;

/// Everything a command needs: the project, its loaded workspace, the
/// effective configuration and the acting user
pub struct Session {
    pub project: Project,
    pub workspace: Workspace,
    pub config: Config,
    pub user: String,
}

impl Session {
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project = Project::discover().map_err(|e| miette::miette!("{}", e))?;
        let config = Config::load();
        let user = global.user.clone().unwrap_or_else(|| config.user());
        let workspace = project.load_workspace()?;
        Ok(Self {
            project,
            workspace,
            config,
            user,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.project.save_workspace(&self.workspace)?;
        Ok(())
    }
}

pub fn parse_part(number: &str) -> Result<PartKey> {
    Ok(PartKey::new(number.trim())?)
}

/// Link ids are shown without prefix; accept `u7`/`s7` too
pub fn parse_link_id(s: &str) -> Result<LinkId> {
    let digits = s.trim().trim_start_matches(['u', 's']);
    digits
        .parse::<u64>()
        .map(LinkId)
        .map_err(|_| miette::miette!("Invalid link id '{}'", s))
}

/// Revision to act on: the given one, else the master's last revision
pub fn revision_or_last(master: &PartMaster, version: Option<&str>) -> Result<String> {
    match version {
        Some(v) => Ok(v.to_string()),
        None => master
            .last_revision()
            .map(|r| r.version.clone())
            .ok_or_else(|| miette::miette!("{} has no revision", master.number)),
    }
}

/// Ask before a destructive action unless `yes` was given
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// `key=value` pairs from the command line
pub fn parse_attribute(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| miette::miette!("Expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(miette::miette!("Attribute name must not be empty in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
