//! Configuration specs - which iteration of each master is visible
//!
//! A spec answers two questions during a traversal:
//! - `filter_master`: which iterations of a master are visible, in order
//!   (callers that need a single node take the last one)
//! - `filter_links`: which links under a node are expanded, and whether
//!   substitutes are offered alongside their usage link (diverge mode)

use tracing::trace;

use crate::core::error::{PlmError, PlmResult};
use crate::core::identity::{IterationRef, LinkId, PartKey};
use crate::entities::baseline::FrozenConfiguration;
use crate::entities::link::{LinkArena, PartLink, UsageLink};
use crate::entities::part::{PartIteration, PartMaster};
use crate::structure::path::Path;

/// Strategy for selecting visible iterations across an assembly
#[derive(Debug, Clone)]
pub enum ConfigSpec {
    /// Newest accessible iteration of the last revision
    Wip { viewer: String, diverge: bool },

    /// Newest checked-in iteration, scanning revisions newest-first
    LatestCheckedIn { diverge: bool },

    /// Every checked-in iteration of every released (or obsolete) revision
    Released { diverge: bool },

    /// Newest iteration of the most recently released revision
    LatestReleased { diverge: bool },

    Baseline {
        id: u32,
        configuration: FrozenConfiguration,
        diverge: bool,
    },

    ProductInstance {
        serial: String,
        configuration: FrozenConfiguration,
        diverge: bool,
    },

    /// An unsaved iteration standing in for its master; WIP everywhere else
    PendingEdit {
        part: PartKey,
        version: String,
        iteration: Box<PartIteration>,
        viewer: String,
        diverge: bool,
    },
}

/// An iteration picked by a spec
#[derive(Debug, Clone, Copy)]
pub struct Selected<'a> {
    pub version: &'a str,
    pub iteration: &'a PartIteration,
}

impl Selected<'_> {
    pub fn at(&self) -> IterationRef {
        IterationRef::new(self.version, self.iteration.number)
    }
}

impl ConfigSpec {
    pub fn wip(viewer: impl Into<String>) -> Self {
        ConfigSpec::Wip {
            viewer: viewer.into(),
            diverge: false,
        }
    }

    /// User whose working copies are visible, if any
    pub fn viewer(&self) -> Option<&str> {
        match self {
            ConfigSpec::Wip { viewer, .. } | ConfigSpec::PendingEdit { viewer, .. } => {
                Some(viewer.as_str())
            }
            _ => None,
        }
    }

    pub fn diverge(&self) -> bool {
        match self {
            ConfigSpec::Wip { diverge, .. }
            | ConfigSpec::LatestCheckedIn { diverge }
            | ConfigSpec::Released { diverge }
            | ConfigSpec::LatestReleased { diverge }
            | ConfigSpec::Baseline { diverge, .. }
            | ConfigSpec::ProductInstance { diverge, .. }
            | ConfigSpec::PendingEdit { diverge, .. } => *diverge,
        }
    }

    /// Copy of this spec with substitute expansion switched on or off
    pub fn with_diverge(mut self, value: bool) -> Self {
        match &mut self {
            ConfigSpec::Wip { diverge, .. }
            | ConfigSpec::LatestCheckedIn { diverge }
            | ConfigSpec::Released { diverge }
            | ConfigSpec::LatestReleased { diverge }
            | ConfigSpec::Baseline { diverge, .. }
            | ConfigSpec::ProductInstance { diverge, .. }
            | ConfigSpec::PendingEdit { diverge, .. } => *diverge = value,
        }
        self
    }

    /// Short label for display, in selector syntax where one exists
    pub fn label(&self) -> String {
        match self {
            ConfigSpec::Wip { .. } => "wip".to_string(),
            ConfigSpec::LatestCheckedIn { .. } => "latest".to_string(),
            ConfigSpec::Released { .. } => "released".to_string(),
            ConfigSpec::LatestReleased { .. } => "latest-released".to_string(),
            ConfigSpec::Baseline { id, .. } => id.to_string(),
            ConfigSpec::ProductInstance { serial, .. } => format!("pi-{}", serial),
            ConfigSpec::PendingEdit { part, .. } => format!("pending-{}", part),
        }
    }

    /// Visible iterations of `master`, in order; empty if none
    pub fn filter_master<'a>(&'a self, master: &'a PartMaster) -> Vec<Selected<'a>> {
        match self {
            ConfigSpec::Wip { viewer, .. } => wip(master, viewer),

            ConfigSpec::LatestCheckedIn { .. } => master
                .revisions
                .iter()
                .rev()
                .find_map(|r| {
                    r.last_checked_in_iteration().map(|iteration| Selected {
                        version: &r.version,
                        iteration,
                    })
                })
                .into_iter()
                .collect(),

            ConfigSpec::Released { .. } => master
                .revisions
                .iter()
                .rev()
                .filter(|r| r.was_released())
                .flat_map(|r| {
                    r.checked_in_iterations().rev().map(move |iteration| Selected {
                        version: &r.version,
                        iteration,
                    })
                })
                .collect(),

            ConfigSpec::LatestReleased { .. } => master
                .revisions
                .iter()
                .rev()
                .find(|r| r.is_released())
                .and_then(|r| {
                    r.last_checked_in_iteration().map(|iteration| Selected {
                        version: &r.version,
                        iteration,
                    })
                })
                .into_iter()
                .collect(),

            ConfigSpec::Baseline { configuration, .. }
            | ConfigSpec::ProductInstance { configuration, .. } => {
                frozen(master, configuration).into_iter().collect()
            }

            ConfigSpec::PendingEdit {
                part,
                version,
                iteration,
                viewer,
                ..
            } => {
                if &master.number == part {
                    vec![Selected {
                        version: version.as_str(),
                        iteration: iteration.as_ref(),
                    }]
                } else {
                    wip(master, viewer)
                }
            }
        }
    }

    /// The single iteration a traversal uses for `master`
    pub fn select<'a>(&'a self, master: &'a PartMaster) -> Option<Selected<'a>> {
        self.filter_master(master).pop()
    }

    /// Links expanded under the node at `parent`, in declaration order
    ///
    /// In diverge mode each usage link is followed by its substitutes.
    /// Frozen specs drop excluded optional links and, outside diverge mode,
    /// swap in the substitute chosen for that path.
    pub fn filter_links<'a>(
        &self,
        arena: &'a LinkArena,
        parent: &Path,
        links: &[LinkId],
        diverge: bool,
    ) -> PlmResult<Vec<PartLink<'a>>> {
        let mut resolved = Vec::with_capacity(links.len());
        for id in links {
            let usage = arena
                .usage(*id)
                .ok_or_else(|| PlmError::not_found("usage link", id))?;

            match self {
                ConfigSpec::Baseline { configuration, .. }
                | ConfigSpec::ProductInstance { configuration, .. } => {
                    let at = parent.child(&PartLink::Usage(usage)).to_string();
                    if usage.optional && configuration.excluded_optional.contains(&at) {
                        trace!(path = %at, "optional link excluded by snapshot");
                        continue;
                    }
                    if diverge {
                        resolved.push(PartLink::Usage(usage));
                        push_substitutes(arena, usage, &mut resolved)?;
                    } else {
                        match configuration.substitute_choices.get(&at) {
                            Some(choice) if usage.substitutes.contains(choice) => {
                                let sub = arena
                                    .substitute(*choice)
                                    .ok_or_else(|| PlmError::not_found("substitute link", choice))?;
                                resolved.push(PartLink::Substitute(sub));
                            }
                            _ => resolved.push(PartLink::Usage(usage)),
                        }
                    }
                }
                _ => {
                    resolved.push(PartLink::Usage(usage));
                    if diverge {
                        push_substitutes(arena, usage, &mut resolved)?;
                    }
                }
            }
        }
        Ok(resolved)
    }
}

fn wip<'a>(master: &'a PartMaster, viewer: &str) -> Vec<Selected<'a>> {
    master
        .last_revision()
        .and_then(|r| {
            r.last_accessible_iteration(Some(viewer))
                .map(|iteration| Selected {
                    version: &r.version,
                    iteration,
                })
        })
        .into_iter()
        .collect()
}

fn frozen<'a>(master: &'a PartMaster, configuration: &FrozenConfiguration) -> Option<Selected<'a>> {
    let at = configuration.iteration_for(&master.number)?;
    let revision = master.revision(&at.version)?;
    let iteration = revision.iteration(at.iteration)?;
    Some(Selected {
        version: &revision.version,
        iteration,
    })
}

fn push_substitutes<'a>(
    arena: &'a LinkArena,
    usage: &UsageLink,
    out: &mut Vec<PartLink<'a>>,
) -> PlmResult<()> {
    for sub_id in &usage.substitutes {
        let sub = arena
            .substitute(*sub_id)
            .ok_or_else(|| PlmError::not_found("substitute link", sub_id))?;
        out.push(PartLink::Substitute(sub));
    }
    Ok(())
}
