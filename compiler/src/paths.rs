//! Maps nodes to directories of the generated tree, and converts between
//! absolute and node-relative paths.
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use path_clean::PathClean;
use tracing::debug;

use crate::graph::Node;
use crate::hierarchy::NodeType;
use crate::Error;

/// Node id to its slash-joined directory path, relative to the tree root.
pub type PathMap = BTreeMap<String, String>;

/// Turns a label into a single path component: double quotes are dropped,
/// path separators become `_`.
pub fn sanitize_label(label: &str) -> String {
    label.replace('"', "").replace(['/', '\\'], "_")
}

/// Resolves the directory path of every node reachable from the top level.
///
/// The walk is depth-first in node order, starting at nodes without a parent.
/// Nodes of type [NodeType::Root] don't add a path component of their own,
/// their children are placed at the top of the tree. Nodes whose parent
/// chain doesn't lead to the top level get no path.
///
/// Path uniqueness is not checked here, see [ensure_unique].
pub fn resolve_paths(nodes: &[Node]) -> Result<PathMap, Error> {
    let mut children: HashMap<Option<&str>, Vec<&Node>> = HashMap::new();
    for node in nodes {
        children
            .entry(node.parent_id.as_deref())
            .or_default()
            .push(node);
    }

    let mut paths = PathMap::new();
    let mut stack: Vec<(&Node, String)> = children
        .get(&None)
        .map(|top| top.iter().rev().map(|n| (*n, String::new())).collect())
        .unwrap_or_default();

    while let Some((node, prefix)) = stack.pop() {
        let path = if node.node_type == NodeType::Root {
            prefix
        } else {
            let component = sanitize_label(&node.label);
            if component.is_empty() || component == "." || component == ".." {
                return Err(Error::MissingLabel(node.id.clone()));
            }
            let path = if prefix.is_empty() {
                component
            } else {
                format!("{}/{}", prefix, component)
            };
            paths.insert(node.id.clone(), path.clone());
            path
        };

        if let Some(kids) = children.get(&Some(node.id.as_str())) {
            stack.extend(kids.iter().rev().map(|n| (*n, path.clone())));
        }
    }

    if paths.len() + count_roots(nodes) < nodes.len() {
        debug!(
            resolved = paths.len(),
            total = nodes.len(),
            "some nodes are not reachable from the top level"
        );
    }

    Ok(paths)
}

fn count_roots(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Root)
        .count()
}

/// Fails with [Error::PathCollision] if two nodes share a path.
pub fn ensure_unique(paths: &PathMap) -> Result<(), Error> {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(paths.len());
    for (id, path) in paths {
        if let Some(first) = seen.insert(path.as_str(), id.as_str()) {
            return Err(Error::PathCollision {
                path: path.clone(),
                first: first.to_owned(),
                second: id.clone(),
            });
        }
    }
    Ok(())
}

/// The path of `to` as seen from the directory `from`, using `..` segments
/// where needed. Both must be normalized relative paths.
pub fn relative_path(from: &str, to: &str) -> String {
    let from: Vec<&str> = from.split('/').filter(|c| !c.is_empty()).collect();
    let to: Vec<&str> = to.split('/').filter(|c| !c.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let components: Vec<&str> = std::iter::repeat("..")
        .take(from.len() - common)
        .chain(to[common..].iter().copied())
        .collect();

    if components.is_empty() {
        ".".to_owned()
    } else {
        components.join("/")
    }
}

/// Resolves `relative` against the directory `base`, normalizing away `.`
/// and `..` components.
pub fn resolve_relative(base: &str, relative: &str) -> String {
    let joined = PathBuf::from(base).join(relative).clean();
    joined
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
