//! Compiles a node graph of an infrastructure layout into a terragrunt
//! directory tree, and scans such a tree back into a graph.
//!
//! Generation goes through [paths], [deps] and [codegen] and ends in
//! [generate_archive], which packs the tree into a zip archive. The way back
//! is [import_tree], which scans a directory with [import::Scanner] and hands
//! the result to [reconstruct] and [layout].

mod errors;

pub mod archive;
pub mod catalog;
pub mod codegen;
pub mod deps;
pub mod graph;
pub mod hierarchy;
pub mod import;
pub mod layout;
pub mod paths;
pub mod reconstruct;

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod tests;

pub use archive::{generate_archive, GeneratorOptions};
pub use errors::{Error, ParseErrorMarker};
pub use graph::{Edge, Graph, Node};
pub use hierarchy::NodeType;
pub use import::import_tree;
pub use layout::LayoutOptions;
pub use reconstruct::ImportedGraph;
