//! Tessera PLM: product-structure configuration resolution
//!
//! Versioned parts (master, revision, iteration) are linked into assemblies
//! by usage and substitute links. A configuration spec picks one iteration
//! per master, the structure resolver walks the resulting tree, and typed
//! path-to-path links cross-reference nodes of a product.

pub mod cli;
pub mod core;
pub mod entities;
pub mod structure;
