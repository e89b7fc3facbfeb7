//! Read access to part masters and links for traversals

use std::borrow::Cow;

use crate::core::error::PlmResult;
use crate::core::identity::PartKey;
use crate::entities::link::LinkArena;
use crate::entities::part::PartMaster;

/// Who is reading a master, and whose working copies it shows
///
/// The two are independent: a `latest` query by bob still checks bob
/// against reader lists but shows nobody's working iteration, while the
/// cyclic-assembly check sees the editor's working copies with no reader
/// check at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadView<'a> {
    /// Checked against the master's reader list; `None` skips the check
    pub reader: Option<&'a str>,
    /// Owner whose working iterations stay visible; `None` hides them all
    pub working_copies_of: Option<&'a str>,
}

impl<'a> ReadView<'a> {
    /// Unrestricted, every working iteration hidden
    pub const SYSTEM: ReadView<'static> = ReadView {
        reader: None,
        working_copies_of: None,
    };

    /// What `user` sees of their own work
    pub fn of(user: &'a str) -> Self {
        Self {
            reader: Some(user),
            working_copies_of: Some(user),
        }
    }
}

/// Source of masters and links a traversal reads from
///
/// `load_master` returns an already-filtered snapshot: a checked-out
/// revision owned by anyone but `view.working_copies_of` has its working
/// iteration removed. A `view.reader` missing from the master's reader list
/// gets `PlmError::AccessDenied`.
pub trait PartLoader {
    fn load_master(&self, key: &PartKey, view: ReadView<'_>) -> PlmResult<Cow<'_, PartMaster>>;

    fn links(&self) -> &LinkArena;
}
