//! Revision lifecycle - check-out, check-in, undo, release and obsolescence
//!
//! Preconditions are checked in one place (`check_transition`) so that the
//! operations and the list of transitions offered to a user never disagree.

use chrono::Utc;
use std::fmt;
use tracing::info;

use crate::core::error::{PlmError, PlmResult};
use crate::core::identity::{IterationRef, PartKey};
use crate::core::workspace::Workspace;
use crate::entities::part::{Attachment, PartIteration, PartMaster, PartRevision, RevisionState};
use crate::structure::resolver::check_cyclic_assembly;

/// Lifecycle operation on a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CheckOut,
    CheckIn,
    UndoCheckOut,
    Release,
    MarkObsolete,
}

impl Transition {
    pub const ALL: [Transition; 5] = [
        Transition::CheckOut,
        Transition::CheckIn,
        Transition::UndoCheckOut,
        Transition::Release,
        Transition::MarkObsolete,
    ];
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::CheckOut => write!(f, "checkout"),
            Transition::CheckIn => write!(f, "checkin"),
            Transition::UndoCheckOut => write!(f, "undo"),
            Transition::Release => write!(f, "release"),
            Transition::MarkObsolete => write!(f, "obsolete"),
        }
    }
}

/// Result of undoing a checkout
#[derive(Debug, Clone, Default)]
pub struct UndoOutcome {
    /// Files owned only by the discarded iteration
    pub released_files: Vec<String>,
    /// Path-to-path links removed because their paths went stale
    pub pruned_links: usize,
}

/// Fail `NotAllowed` unless `user` may apply `transition` to `version` of `master`
pub fn check_transition(
    master: &PartMaster,
    version: &str,
    user: &str,
    transition: Transition,
) -> PlmResult<()> {
    let revision = master
        .revision(version)
        .ok_or_else(|| PlmError::not_found("revision", format!("{}-{}", master.number, version)))?;
    let denied = |reason: String| {
        Err(PlmError::not_allowed(format!(
            "cannot {} {}-{}: {}",
            transition, master.number, version, reason
        )))
    };

    match transition {
        Transition::CheckOut => {
            if !master.is_last_revision(version) {
                return denied("not the last revision".into());
            }
            if let Some(owner) = revision.checked_out_by() {
                return denied(format!("already checked out by {}", owner));
            }
            if revision.was_released() {
                return denied(format!("revision is {}", revision.state));
            }
        }
        Transition::CheckIn => {
            if !revision.is_checked_out_by(user) {
                return denied(format!("not checked out by {}", user));
            }
        }
        Transition::UndoCheckOut => {
            if !revision.is_checked_out_by(user) {
                return denied(format!("not checked out by {}", user));
            }
            if revision.last_iteration().map_or(0, |i| i.number) <= 1 {
                return denied("the first iteration cannot be discarded".into());
            }
        }
        Transition::Release => {
            if revision.is_checked_out() {
                return denied("revision is checked out".into());
            }
            if revision.iterations.is_empty() {
                return denied("revision has no iteration".into());
            }
            if revision.is_obsolete() {
                return denied("revision is obsolete".into());
            }
        }
        Transition::MarkObsolete => {
            if !revision.is_released() {
                return denied("only released revisions can be made obsolete".into());
            }
        }
    }
    Ok(())
}

/// Transitions `user` may currently apply to `version` of `master`
pub fn allowed_transitions(master: &PartMaster, version: &str, user: &str) -> Vec<Transition> {
    Transition::ALL
        .into_iter()
        .filter(|t| check_transition(master, version, user, *t).is_ok())
        .collect()
}

impl Workspace {
    fn revision_mut(&mut self, number: &PartKey, version: &str) -> PlmResult<&mut PartRevision> {
        self.master_mut(number)?
            .revision_mut(version)
            .ok_or_else(|| PlmError::not_found("revision", format!("{}-{}", number, version)))
    }

    /// Start a new working iteration copied from the last one
    pub fn check_out(
        &mut self,
        number: &PartKey,
        version: &str,
        user: &str,
    ) -> PlmResult<IterationRef> {
        let master = self.master(number)?;
        check_transition(master, version, user, Transition::CheckOut)?;
        let previous = master
            .revision(version)
            .and_then(PartRevision::last_iteration)
            .cloned();

        let next = previous.as_ref().map_or(1, |i| i.number + 1);
        let at = IterationRef::new(version, next);
        let mut working = PartIteration::new(next, user);
        if let Some(previous) = previous {
            working.components = self.clone_components(&previous.components);
            working.attributes = previous.attributes;
            working.attachments = previous
                .attachments
                .iter()
                .map(|a| Attachment::for_iteration(number, &at, &a.name))
                .collect();
        }

        let revision = self.revision_mut(number, version)?;
        revision.iterations.push(working);
        revision.state = RevisionState::CheckedOut {
            by: user.to_string(),
            since: Utc::now(),
        };
        info!(part = %number, %at, user, "checked out");
        Ok(at)
    }

    /// Commit the working iteration after the cyclic-assembly check
    pub fn check_in(
        &mut self,
        number: &PartKey,
        version: &str,
        user: &str,
    ) -> PlmResult<IterationRef> {
        let master = self.master(number)?;
        check_transition(master, version, user, Transition::CheckIn)?;
        let working = master
            .revision(version)
            .and_then(PartRevision::last_iteration)
            .cloned()
            .ok_or_else(|| PlmError::not_allowed(format!("{}-{} has no iteration", number, version)))?;
        check_cyclic_assembly(&*self, number, version, &working, user)?;

        let revision = self.revision_mut(number, version)?;
        let mut at = IterationRef::new(version, working.number);
        if let Some(iteration) = revision.iterations.last_mut() {
            iteration.checked_in = Some(Utc::now());
            at.iteration = iteration.number;
        }
        revision.state = RevisionState::Draft;
        info!(part = %number, %at, user, "checked in");
        Ok(at)
    }

    /// Discard the working iteration and return to the last checked-in one
    pub fn undo_check_out(
        &mut self,
        number: &PartKey,
        version: &str,
        user: &str,
    ) -> PlmResult<UndoOutcome> {
        check_transition(self.master(number)?, version, user, Transition::UndoCheckOut)?;

        let revision = self.revision_mut(number, version)?;
        let discarded = revision
            .iterations
            .pop()
            .ok_or_else(|| PlmError::not_allowed(format!("{}-{} has no iteration", number, version)))?;
        revision.state = RevisionState::Draft;

        self.discard_links(&discarded.components);
        let released_files = discarded
            .attachments
            .into_iter()
            .map(|a| a.full_name)
            .collect();
        let pruned_links = self.prune_stale_path_links();
        info!(part = %number, version, iteration = discarded.number, user, pruned_links, "checkout undone");
        Ok(UndoOutcome {
            released_files,
            pruned_links,
        })
    }

    pub fn release(&mut self, number: &PartKey, version: &str, user: &str) -> PlmResult<()> {
        check_transition(self.master(number)?, version, user, Transition::Release)?;
        self.revision_mut(number, version)?.state = RevisionState::Released {
            by: user.to_string(),
            at: Utc::now(),
        };
        info!(part = %number, version, user, "released");
        Ok(())
    }

    pub fn mark_obsolete(&mut self, number: &PartKey, version: &str, user: &str) -> PlmResult<()> {
        check_transition(self.master(number)?, version, user, Transition::MarkObsolete)?;
        self.revision_mut(number, version)?.state = RevisionState::Obsolete {
            by: user.to_string(),
            at: Utc::now(),
        };
        info!(part = %number, version, user, "marked obsolete");
        Ok(())
    }
}
