//! Turns the enabled outgoing edges of a node into named dependency
//! blocks with node-relative config paths.
use std::collections::BTreeMap;

use tracing::trace;

use crate::graph::{Edge, Node};
use crate::paths::{relative_path, PathMap};
use crate::Error;

/// Collects the dependency declarations of `node`: dependency name to the
/// target's directory, relative to the node's own directory.
///
/// Disabled edges are skipped before any other check, so they may lack a
/// name. A name may only be used once per source node.
pub fn resolve_dependencies<'a>(
    node: &Node,
    node_path: &str,
    edges: impl IntoIterator<Item = &'a Edge>,
    paths: &PathMap,
) -> Result<BTreeMap<String, String>, Error> {
    let mut dependencies = BTreeMap::new();

    for edge in edges.into_iter().filter(|e| e.source == node.id) {
        if !edge.enabled {
            trace!(edge.id = %edge.id, "skipping disabled edge");
            continue;
        }

        let name = match edge.dependency_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Error::UnnamedDependency(edge.id.clone())),
        };

        let target_path = paths
            .get(&edge.target)
            .ok_or_else(|| Error::UnknownEdgeTarget {
                edge: edge.id.clone(),
                target: edge.target.clone(),
            })?;

        if dependencies
            .insert(name.to_owned(), relative_path(node_path, target_path))
            .is_some()
        {
            return Err(Error::DuplicateDependencyName {
                node: node.id.clone(),
                name: name.to_owned(),
            });
        }
    }

    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{edge, plotted_graph};
    use crate::paths::resolve_paths;
    use pretty_assertions::assert_eq;

    fn resolve_for(node_id: &str, edges: &[Edge]) -> Result<BTreeMap<String, String>, Error> {
        let graph = plotted_graph();
        let paths = resolve_paths(&graph.nodes).unwrap();
        let node = graph.node(node_id).unwrap();
        resolve_dependencies(node, &paths[node_id], edges, &paths)
    }

    #[test]
    fn relative_to_source() {
        let deps = resolve_for(
            "vpc",
            &[edge("e1", "vpc", "tier-b", Some("other_tier")), edge("e2", "vpc", "account", Some("acct"))],
        )
        .unwrap();

        assert_eq!("../../../zone-b/web", deps["other_tier"]);
        assert_eq!("../../../../..", deps["acct"]);
    }

    #[test]
    fn disabled_edges_skipped() {
        let mut disabled = edge("e1", "vpc", "tier-b", None);
        disabled.enabled = false;
        let deps = resolve_for("vpc", &[disabled]).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn other_sources_ignored() {
        let deps = resolve_for("vpc", &[edge("e1", "tier-b", "vpc", Some("x"))]).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn unnamed_rejected() {
        for name in [None, Some("")] {
            match resolve_for("vpc", &[edge("e1", "vpc", "tier-b", name)]) {
                Err(Error::UnnamedDependency(id)) => assert_eq!("e1", id),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = resolve_for(
            "vpc",
            &[edge("e1", "vpc", "tier-b", Some("dep")), edge("e2", "vpc", "account", Some("dep"))],
        );
        assert!(matches!(result, Err(Error::DuplicateDependencyName { ref node, ref name }) if node == "vpc" && name == "dep"));
    }

    #[test]
    fn unknown_target_rejected() {
        let result = resolve_for("vpc", &[edge("e1", "vpc", "ghost", Some("dep"))]);
        assert!(matches!(result, Err(Error::UnknownEdgeTarget { .. })));
    }
}
