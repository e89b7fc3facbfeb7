//! Entity type definitions

pub mod baseline;
pub mod link;
pub mod part;
pub mod product;

pub use baseline::{
    BaselineChoices, BaselineKind, FrozenConfiguration, InstanceIteration, ProductBaseline,
    ProductInstance,
};
pub use link::{CadInstance, LinkArena, NewSubstitute, NewUsage, PartLink, SubstituteLink, UsageLink};
pub use part::{Attachment, PartIteration, PartMaster, PartRevision, RevisionState};
pub use product::{ConfigurationItem, PathToPathLink};
