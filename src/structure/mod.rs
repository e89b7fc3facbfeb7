//! Product-structure resolution - paths, configuration specs, traversal and
//! cross-link validation

pub mod filter;
pub mod link_graph;
pub mod loader;
pub mod path;
pub mod resolver;
pub mod selector;

pub use filter::{ConfigSpec, Selected};
pub use link_graph::LinkGraphValidator;
pub use loader::{PartLoader, ReadView};
pub use path::{Path, PathStep};
pub use resolver::{
    check_cyclic_assembly, Component, ComponentKind, RollupLine, Start, StructureResolver,
    StructureWalk, Visit, VisitOutcome, VisitedNode,
};
pub use selector::FilterSelector;
