//! Core module - identities, errors, the workspace and its lifecycle rules

pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod project;
pub mod workspace;

pub use config::Config;
pub use error::{PlmError, PlmResult};
pub use identity::{IterationRef, LinkCode, LinkId, PartKey};
pub use lifecycle::{allowed_transitions, check_transition, Transition, UndoOutcome};
pub use project::{Project, ProjectError};
pub use workspace::{ComponentEdit, IterationEdit, Workspace};
