//! The static registry of node types and the rules about which types may be
//! nested inside which.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::graph::Node;

/// File name used by every type that doesn't declare its own.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "terragrunt.hcl";

/// The five hierarchy levels every generated tree needs at least one of,
/// in the order the scanner looks for their configuration files.
pub const SETTINGS_TYPES: [NodeType; 5] = [
    NodeType::AccountSettings,
    NodeType::EnvironmentSettings,
    NodeType::RegionSettings,
    NodeType::ZoneSettings,
    NodeType::TierSettings,
];

/// The type tag of a [Node].
///
/// All types except [NodeType::Remote] are fixed. A remote type names a module
/// from the external module catalog, e.g. `network/vpc`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Root,
    AccountSettings,
    EnvironmentSettings,
    RegionSettings,
    ZoneSettings,
    TierSettings,
    Folder,
    File,
    Remote(String),
}

/// One entry of the list of types allowed below a parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildRule {
    pub node_type: NodeType,
    /// How many children of this type a single parent may have.
    pub limit: Option<usize>,
}

impl ChildRule {
    fn limited(node_type: NodeType, limit: usize) -> Self {
        Self {
            node_type,
            limit: Some(limit),
        }
    }

    fn unlimited(node_type: NodeType) -> Self {
        Self {
            node_type,
            limit: None,
        }
    }
}

/// Per-type output and placement properties.
struct TypeConfig {
    output_file_name: &'static str,
    has_no_output: bool,
    required_locals: &'static [&'static str],
    accepts_remote_children: bool,
}

const fn settings(output_file_name: &'static str, required_locals: &'static [&'static str]) -> TypeConfig {
    TypeConfig {
        output_file_name,
        has_no_output: false,
        required_locals,
        accepts_remote_children: false,
    }
}

impl NodeType {
    fn config(&self) -> TypeConfig {
        match self {
            // The root is the synthetic top of the tree. Its configuration is
            // the fixed bootstrap file, never a generated one.
            NodeType::Root => TypeConfig {
                output_file_name: DEFAULT_OUTPUT_FILE_NAME,
                has_no_output: true,
                required_locals: &[],
                accepts_remote_children: false,
            },
            NodeType::AccountSettings => settings(
                "account.hcl",
                &["agency_name", "account_ref", "proj_code", "name_format"],
            ),
            NodeType::EnvironmentSettings => settings("env.hcl", &["env_name"]),
            NodeType::RegionSettings => settings("region.hcl", &["region"]),
            NodeType::ZoneSettings => settings("zone.hcl", &["zone_name", "zone_desc"]),
            NodeType::TierSettings => TypeConfig {
                accepts_remote_children: true,
                ..settings("tier.hcl", &["tier_name", "tier_desc"])
            },
            NodeType::Folder => TypeConfig {
                output_file_name: DEFAULT_OUTPUT_FILE_NAME,
                has_no_output: true,
                required_locals: &[],
                accepts_remote_children: true,
            },
            NodeType::File => TypeConfig {
                output_file_name: DEFAULT_OUTPUT_FILE_NAME,
                has_no_output: true,
                required_locals: &[],
                accepts_remote_children: false,
            },
            NodeType::Remote(_) => TypeConfig {
                output_file_name: DEFAULT_OUTPUT_FILE_NAME,
                has_no_output: false,
                required_locals: &[],
                accepts_remote_children: false,
            },
        }
    }

    /// The builtin types that may be placed directly below this type.
    pub fn children_allowed(&self) -> Vec<ChildRule> {
        match self {
            NodeType::Root => vec![ChildRule::limited(NodeType::AccountSettings, 1)],
            NodeType::AccountSettings => {
                vec![ChildRule::limited(NodeType::EnvironmentSettings, 1)]
            }
            NodeType::EnvironmentSettings => vec![ChildRule::limited(NodeType::RegionSettings, 1)],
            NodeType::RegionSettings => vec![ChildRule::limited(NodeType::ZoneSettings, 2)],
            NodeType::ZoneSettings => vec![ChildRule::unlimited(NodeType::TierSettings)],
            NodeType::TierSettings | NodeType::Folder => vec![
                ChildRule::unlimited(NodeType::Folder),
                ChildRule::unlimited(NodeType::File),
            ],
            NodeType::File | NodeType::Remote(_) => vec![],
        }
    }

    pub fn output_file_name(&self) -> &'static str {
        self.config().output_file_name
    }

    /// Whether nodes of this type get no generated configuration file.
    pub fn has_no_output(&self) -> bool {
        self.config().has_no_output
    }

    /// Local value keys a node of this type is expected to define.
    pub fn required_locals(&self) -> &'static [&'static str] {
        self.config().required_locals
    }

    /// Whether the cataloged module `remote_module_name` may be placed as a
    /// child of this type.
    pub fn can_accept_remote_child(&self, remote_module_name: &str) -> bool {
        !remote_module_name.is_empty() && self.config().accepts_remote_children
    }

    pub fn is_settings(&self) -> bool {
        SETTINGS_TYPES.contains(self)
    }

    /// The catalog module name for remote types.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            NodeType::Remote(name) => Some(name),
            _ => None,
        }
    }

    /// Maps a well-known settings file name (`account.hcl`, ...) back to the
    /// settings type that produces it.
    pub fn from_settings_file_name(file_name: &str) -> Option<NodeType> {
        SETTINGS_TYPES
            .iter()
            .find(|t| t.output_file_name() == file_name)
            .cloned()
    }

    fn as_str(&self) -> &str {
        match self {
            NodeType::Root => "Root",
            NodeType::AccountSettings => "AccountSettings",
            NodeType::EnvironmentSettings => "EnvironmentSettings",
            NodeType::RegionSettings => "RegionSettings",
            NodeType::ZoneSettings => "ZoneSettings",
            NodeType::TierSettings => "TierSettings",
            NodeType::Folder => "Folder",
            NodeType::File => "File",
            NodeType::Remote(name) => name,
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Root" => NodeType::Root,
            "AccountSettings" => NodeType::AccountSettings,
            "EnvironmentSettings" => NodeType::EnvironmentSettings,
            "RegionSettings" => NodeType::RegionSettings,
            "ZoneSettings" => NodeType::ZoneSettings,
            "TierSettings" => NodeType::TierSettings,
            "Folder" => NodeType::Folder,
            "File" => NodeType::File,
            _ => NodeType::Remote(value),
        }
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        value.to_owned().into()
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Remote(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lists the builtin types that can still be added below `parent_id`,
/// honouring per-parent limits by counting the existing children of each
/// type under that specific parent. `parent_id` is None for the top level.
pub fn addable_child_types(
    parent_type: &NodeType,
    parent_id: Option<&str>,
    nodes: &[Node],
) -> Vec<NodeType> {
    parent_type
        .children_allowed()
        .into_iter()
        .filter(|rule| match rule.limit {
            None => true,
            Some(limit) => {
                let existing = nodes
                    .iter()
                    .filter(|n| n.parent_id.as_deref() == parent_id && n.node_type == rule.node_type)
                    .count();
                existing < limit
            }
        })
        .map(|rule| rule.node_type)
        .collect()
}

/// Lists the cataloged module names that may be added below `parent_type`.
pub fn addable_remote_children(parent_type: &NodeType, catalog: &[CatalogEntry]) -> Vec<String> {
    catalog
        .iter()
        .map(|entry| entry.module_name.clone())
        .filter(|name| parent_type.can_accept_remote_child(name))
        .collect()
}
