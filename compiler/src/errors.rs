use std::path::PathBuf;

use crate::hierarchy::NodeType;

/// Errors that abort a generation or import run.
///
/// Generation is fail-fast: the first structural problem is returned and
/// no archive is produced. Import only fails on problems that would leave
/// the reconstructed graph inconsistent; unreadable configuration files are
/// reported through [ParseErrorMarker] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node {0} has no usable label")]
    MissingLabel(String),

    #[error("nodes {first} and {second} both resolve to path {path}")]
    PathCollision {
        path: String,
        first: String,
        second: String,
    },

    #[error("Nodes are not fully plotted: missing {0}")]
    IncompleteGraph(NodeType),

    #[error("edge {0} is enabled but has no dependency name")]
    UnnamedDependency(String),

    #[error("node {node} declares dependency {name:?} more than once")]
    DuplicateDependencyName { node: String, name: String },

    #[error("edge {edge} points to node {target}, which has no resolved path")]
    UnknownEdgeTarget { edge: String, target: String },

    #[error("no root terragrunt.hcl found in {0}")]
    RootConfigMissing(PathBuf),

    #[error("invalid terraform source url in {path}: {source_url:?}")]
    InvalidModuleSource { path: PathBuf, source_url: String },

    #[error("dependency {name:?} of {source_path} points to {config_path}, which matches no scanned node")]
    UnresolvedDependency {
        source_path: String,
        config_path: String,
        name: String,
    },

    #[error("attachment {file_name:?} of node {node} is not a plain file name")]
    InvalidAttachmentName { node: String, file_name: String },

    #[error("attachment {id} of node {node} ({file_name}) not found")]
    AttachmentMissing {
        node: String,
        file_name: String,
        id: String,
    },

    #[error("attachment store error: {0}")]
    AttachmentStore(#[from] tgflow_castore::Error),

    #[error("i/o error at {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Attached to a scanned node whose configuration file couldn't be used.
/// The node is still part of the import so the rest of the tree stays
/// usable.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum ParseErrorMarker {
    /// The file exists but could not be read.
    Unreadable(String),
    /// The file could be read but isn't valid HCL.
    InvalidHcl(String),
}

impl std::fmt::Display for ParseErrorMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorMarker::Unreadable(msg) => write!(f, "Hcl file cannot be accessed: {}", msg),
            ParseErrorMarker::InvalidHcl(msg) => write!(f, "Hcl file invalid: {}", msg),
        }
    }
}
