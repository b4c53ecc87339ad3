//! Loading an existing configuration tree back into a graph.
//!
//! [import_tree] scans the tree with a [Scanner], then hands the result to
//! [crate::reconstruct] which resolves dependencies into edges and lays the
//! nodes out.
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tgflow_castore::attachmentservice::AttachmentService;
use tracing::{instrument, warn};

use crate::errors::ParseErrorMarker;
use crate::graph::Node;
use crate::hierarchy::DEFAULT_OUTPUT_FILE_NAME;
use crate::layout::LayoutOptions;
use crate::reconstruct::{reconstruct, ImportedGraph};
use crate::Error;

mod config;
mod scanner;

pub use config::module_name_from_source;
pub use scanner::Scanner;

/// A node produced by the scanner, before dependencies are resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ScannedNode {
    pub node: Node,
    /// Directory of the node, relative to the scanned root, `/`-separated.
    pub path: String,
    /// Set if the node's configuration file couldn't be used.
    pub error: Option<ParseErrorMarker>,
}

/// A `dependency` block as written in a scanned file. The target is only
/// known by its path, it's turned into an edge once all nodes are known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempDependency {
    pub source_id: String,
    pub source_path: String,
    pub config_path: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOutput {
    /// In pre-order: every node comes before its descendants.
    pub nodes: Vec<ScannedNode>,
    pub dependencies: Vec<TempDependency>,
}

impl ScanOutput {
    pub fn extend(&mut self, other: ScanOutput) {
        self.nodes.extend(other.nodes);
        self.dependencies.extend(other.dependencies);
    }
}

/// Imports the tree at `root`.
///
/// `root` must contain the bootstrap `terragrunt.hcl`. Every directory below
/// it is scanned in one run sharing one id set, so dependencies across
/// different top-level folders resolve. Files found next to configuration
/// files are uploaded to `attachment_service`.
#[instrument(skip_all, fields(root = %root.as_ref().display()), err)]
pub async fn import_tree<A, P>(
    root: P,
    attachment_service: &A,
    layout: &LayoutOptions,
) -> Result<ImportedGraph, Error>
where
    A: AttachmentService + ?Sized,
    P: AsRef<Path> + std::fmt::Debug,
{
    let root = root.as_ref();
    match tokio::fs::metadata(root.join(DEFAULT_OUTPUT_FILE_NAME)).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => return Err(Error::RootConfigMissing(root.to_path_buf())),
    }

    let scanner = Scanner::new(root, attachment_service);

    let mut top_level: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(|e| Error::Io(root.to_path_buf(), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Io(root.to_path_buf(), e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::Io(entry.path(), e))?;
        if file_type.is_dir() {
            top_level.push(entry.path());
        }
    }
    top_level.sort();

    let mut output = ScanOutput::default();
    for scanned in try_join_all(top_level.iter().map(|dir| scanner.scan_folder(dir, 0, None))).await? {
        output.extend(scanned);
    }

    for scanned in &output.nodes {
        if let Some(marker) = &scanned.error {
            warn!(node.id = %scanned.node.id, path = %scanned.path, %marker, "configuration file could not be used");
        }
    }

    reconstruct(output, layout)
}
