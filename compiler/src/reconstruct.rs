//! Rebuilds edges and layout from the output of a directory scan.
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::errors::ParseErrorMarker;
use crate::graph::{Edge, Graph};
use crate::import::ScanOutput;
use crate::layout::{layout, LayoutOptions};
use crate::paths::resolve_relative;
use crate::Error;

/// The graph rebuilt from a scanned tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportedGraph {
    pub graph: Graph,
    /// Node id to the problem with its configuration file.
    pub errors: BTreeMap<String, ParseErrorMarker>,
}

/// Turns the temporary dependencies of a scan into edges and lays out the
/// nodes.
///
/// Every dependency must point to the path of a scanned node, otherwise the
/// whole import fails with [Error::UnresolvedDependency].
#[instrument(skip_all, fields(nodes = scanned.nodes.len(), dependencies = scanned.dependencies.len()), err)]
pub fn reconstruct(scanned: ScanOutput, options: &LayoutOptions) -> Result<ImportedGraph, Error> {
    let mut ids_by_path: HashMap<&str, &str> = HashMap::with_capacity(scanned.nodes.len());
    for n in &scanned.nodes {
        if let Some(first) = ids_by_path.insert(n.path.as_str(), n.node.id.as_str()) {
            return Err(Error::PathCollision {
                path: n.path.clone(),
                first: first.to_owned(),
                second: n.node.id.clone(),
            });
        }
    }

    let mut edges = Vec::with_capacity(scanned.dependencies.len());
    let mut edge_ids = HashSet::new();
    for dep in &scanned.dependencies {
        let target_path = resolve_relative(&dep.source_path, &dep.config_path);
        let target_id = ids_by_path
            .get(target_path.as_str())
            .ok_or_else(|| Error::UnresolvedDependency {
                source_path: dep.source_path.clone(),
                config_path: dep.config_path.clone(),
                name: dep.name.clone(),
            })?;

        let mut id = format!("edge-{}_out-{}_in", dep.source_id, target_id);
        // two differently named dependencies between the same pair of nodes
        if edge_ids.contains(&id) {
            id = format!("{}-{}", id, dep.name);
        }
        edge_ids.insert(id.clone());

        debug!(edge.id = %id, name = %dep.name, "resolved dependency");
        edges.push(Edge {
            id,
            source: dep.source_id.clone(),
            target: (*target_id).to_owned(),
            dependency_name: Some(dep.name.clone()),
            enabled: true,
            source_handle: Some("out".to_owned()),
            target_handle: Some("in".to_owned()),
        });
    }

    let mut errors = BTreeMap::new();
    let mut nodes = Vec::with_capacity(scanned.nodes.len());
    for s in scanned.nodes {
        if let Some(marker) = s.error {
            errors.insert(s.node.id.clone(), marker);
        }
        nodes.push(s.node);
    }

    layout(&mut nodes, options);

    Ok(ImportedGraph {
        graph: Graph { nodes, edges },
        errors,
    })
}
