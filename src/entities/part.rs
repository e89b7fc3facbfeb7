//! Part entity types - masters, revisions and iterations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::identity::{IterationRef, LinkId, PartKey, FIRST_VERSION};

/// Lifecycle state of a revision
///
/// The checkout lives inside the state, so a revision can never carry two
/// checkouts or be checked out while released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
#[derive(Default)]
pub enum RevisionState {
    #[default]
    Draft,
    CheckedOut {
        by: String,
        since: DateTime<Utc>,
    },
    Released {
        by: String,
        at: DateTime<Utc>,
    },
    Obsolete {
        by: String,
        at: DateTime<Utc>,
    },
}

impl std::fmt::Display for RevisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevisionState::Draft => write!(f, "draft"),
            RevisionState::CheckedOut { by, .. } => write!(f, "checked out by {}", by),
            RevisionState::Released { .. } => write!(f, "released"),
            RevisionState::Obsolete { .. } => write!(f, "obsolete"),
        }
    }
}

/// A file attached to an iteration
///
/// `full_name` is unique per iteration, so files copied at checkout belong
/// exclusively to the new iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub full_name: String,
}

impl Attachment {
    pub fn for_iteration(part: &PartKey, at: &IterationRef, name: &str) -> Self {
        Self {
            name: name.to_string(),
            full_name: format!("{}/{}/{}/{}", part, at.version, at.iteration, name),
        }
    }
}

/// Snapshot of a part within a revision; immutable once checked in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartIteration {
    /// Iteration number, 1-based and monotonic within the revision
    pub number: u32,

    pub author: String,

    pub created: DateTime<Utc>,

    /// Set when the iteration is checked in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Usage links into the link arena, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<LinkId>,

    /// Instance attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl PartIteration {
    pub fn new(number: u32, author: impl Into<String>) -> Self {
        Self {
            number,
            author: author.into(),
            created: Utc::now(),
            checked_in: None,
            note: None,
            components: Vec::new(),
            attributes: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn is_assembly(&self) -> bool {
        !self.components.is_empty()
    }
}

/// A versioned line of iterations with its own lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartRevision {
    pub version: String,

    #[serde(default)]
    pub state: RevisionState,

    pub author: String,

    pub created: DateTime<Utc>,

    #[serde(default)]
    pub iterations: Vec<PartIteration>,
}

impl PartRevision {
    pub fn new(version: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: RevisionState::Draft,
            author: author.into(),
            created: Utc::now(),
            iterations: Vec::new(),
        }
    }

    pub fn checked_out_by(&self) -> Option<&str> {
        match &self.state {
            RevisionState::CheckedOut { by, .. } => Some(by),
            _ => None,
        }
    }

    pub fn is_checked_out(&self) -> bool {
        self.checked_out_by().is_some()
    }

    pub fn is_checked_out_by(&self, user: &str) -> bool {
        self.checked_out_by() == Some(user)
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, RevisionState::Released { .. })
    }

    pub fn is_obsolete(&self) -> bool {
        matches!(self.state, RevisionState::Obsolete { .. })
    }

    /// Released at some point (still released or since made obsolete)
    pub fn was_released(&self) -> bool {
        self.is_released() || self.is_obsolete()
    }

    pub fn last_iteration(&self) -> Option<&PartIteration> {
        self.iterations.last()
    }

    pub fn iteration(&self, number: u32) -> Option<&PartIteration> {
        self.iterations.iter().find(|i| i.number == number)
    }

    /// The newest iteration is the working copy while the revision is checked out
    pub fn is_iteration_checked_in(&self, number: u32) -> bool {
        match self.last_iteration() {
            Some(last) if self.is_checked_out() => number != last.number,
            _ => true,
        }
    }

    pub fn checked_in_iterations(&self) -> impl DoubleEndedIterator<Item = &PartIteration> {
        self.iterations
            .iter()
            .filter(move |i| self.is_iteration_checked_in(i.number))
    }

    pub fn last_checked_in_iteration(&self) -> Option<&PartIteration> {
        self.checked_in_iterations().next_back()
    }

    /// Newest iteration the viewer may see: checked in, or the viewer's own working copy
    pub fn last_accessible_iteration(&self, viewer: Option<&str>) -> Option<&PartIteration> {
        match (self.checked_out_by(), viewer) {
            (Some(owner), Some(viewer)) if owner == viewer => self.last_iteration(),
            _ => self.last_checked_in_iteration(),
        }
    }
}

/// Identity root of a versioned part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartMaster {
    pub number: PartKey,

    pub name: String,

    pub author: String,

    pub created: DateTime<Utc>,

    /// Users allowed to read this master; empty means everybody
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readers: Vec<String>,

    #[serde(default)]
    pub revisions: Vec<PartRevision>,
}

impl PartMaster {
    /// Create a master with revision A holding an empty first iteration
    pub fn new(number: PartKey, name: impl Into<String>, author: impl Into<String>) -> Self {
        let author = author.into();
        let mut revision = PartRevision::new(FIRST_VERSION, author.clone());
        revision.iterations.push(PartIteration::new(1, author.clone()));
        Self {
            number,
            name: name.into(),
            author,
            created: Utc::now(),
            readers: Vec::new(),
            revisions: vec![revision],
        }
    }

    pub fn last_revision(&self) -> Option<&PartRevision> {
        self.revisions.last()
    }

    pub fn last_revision_mut(&mut self) -> Option<&mut PartRevision> {
        self.revisions.last_mut()
    }

    pub fn revision(&self, version: &str) -> Option<&PartRevision> {
        self.revisions.iter().find(|r| r.version == version)
    }

    pub fn revision_mut(&mut self, version: &str) -> Option<&mut PartRevision> {
        self.revisions.iter_mut().find(|r| r.version == version)
    }

    pub fn is_last_revision(&self, version: &str) -> bool {
        self.last_revision().is_some_and(|r| r.version == version)
    }

    pub fn iteration(&self, at: &IterationRef) -> Option<&PartIteration> {
        self.revision(&at.version)
            .and_then(|r| r.iteration(at.iteration))
    }

    pub fn can_read(&self, user: &str) -> bool {
        self.readers.is_empty() || self.readers.iter().any(|r| r == user)
    }

    /// Copy of this master with other users' working iterations removed
    ///
    /// A hidden revision is presented as it stood before the checkout: its
    /// working iteration dropped and its state back to draft.
    pub fn visible_to(&self, viewer: Option<&str>) -> PartMaster {
        let mut view = self.clone();
        for revision in &mut view.revisions {
            let hide = match revision.checked_out_by() {
                Some(owner) => viewer != Some(owner),
                None => false,
            };
            if hide {
                revision.iterations.pop();
                revision.state = RevisionState::Draft;
            }
        }
        view
    }

    /// True when some revision's working iteration would be hidden from the viewer
    pub fn hides_work_from(&self, viewer: Option<&str>) -> bool {
        self.revisions
            .iter()
            .filter_map(|r| r.checked_out_by())
            .any(|owner| viewer != Some(owner))
    }
}
