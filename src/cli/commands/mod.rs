//! CLI command implementations

pub mod baseline;
pub mod completions;
pub mod init;
pub mod instance;
pub mod link;
pub mod part;
pub mod product;
pub mod tree;
