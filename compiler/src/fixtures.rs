use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};

use crate::graph::{Edge, Graph, Node};
use crate::hierarchy::NodeType;

pub fn node(id: &str, node_type: NodeType, parent_id: Option<&str>, label: &str) -> Node {
    let mut node = Node::new(id, node_type, label);
    node.parent_id = parent_id.map(str::to_owned);
    node
}

pub fn edge(id: &str, source: &str, target: &str, dependency_name: Option<&str>) -> Edge {
    Edge {
        id: id.to_owned(),
        source: source.to_owned(),
        target: target.to_owned(),
        dependency_name: dependency_name.map(str::to_owned),
        enabled: true,
        source_handle: Some("out".into()),
        target_handle: Some("in".into()),
    }
}

fn with_locals(mut node: Node, locals: &[(&str, &str)]) -> Node {
    node.locals = locals
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    node
}

/// Fills in depths from the parent chain, top-level nodes are at depth 0.
fn assign_depths(nodes: &mut [Node]) {
    let parents: HashMap<String, Option<String>> = nodes
        .iter()
        .map(|n| (n.id.clone(), n.parent_id.clone()))
        .collect();
    for node in nodes.iter_mut() {
        let mut depth = 0;
        let mut parent = node.parent_id.clone();
        while let Some(p) = parent {
            depth += 1;
            parent = parents.get(&p).cloned().flatten();
        }
        node.depth = depth;
    }
}

/// One account, environment and region, two zones with one `web` tier each,
/// and a vpc module in the first tier. No edges.
pub fn plotted_graph() -> Graph {
    let mut nodes = vec![
        with_locals(
            node("account", NodeType::AccountSettings, None, "acme"),
            &[
                ("agency_name", "\"acme\""),
                ("account_ref", "\"123456789012\""),
                ("proj_code", "\"ac\""),
                ("name_format", "\"%s-%s\""),
            ],
        ),
        with_locals(
            node("env", NodeType::EnvironmentSettings, Some("account"), "prod"),
            &[("env_name", "\"prod\"")],
        ),
        with_locals(
            node("region", NodeType::RegionSettings, Some("env"), "ap-southeast-1"),
            &[("region", "\"ap-southeast-1\"")],
        ),
        with_locals(
            node("zone-a", NodeType::ZoneSettings, Some("region"), "zone-a"),
            &[("zone_name", "\"a\""), ("zone_desc", "\"first zone\"")],
        ),
        with_locals(
            node("tier-a", NodeType::TierSettings, Some("zone-a"), "web"),
            &[("tier_name", "\"web\""), ("tier_desc", "\"web tier\"")],
        ),
        {
            let mut vpc = node(
                "vpc",
                NodeType::Remote("network/vpc".into()),
                Some("tier-a"),
                "vpc",
            );
            vpc.inputs.insert("cidr".into(), "\"10.0.0.0/16\"".into());
            vpc.inputs.insert("azs".into(), "[\"a\", \"b\"]".into());
            vpc
        },
        with_locals(
            node("zone-b", NodeType::ZoneSettings, Some("region"), "zone-b"),
            &[("zone_name", "\"b\""), ("zone_desc", "\"second zone\"")],
        ),
        with_locals(
            node("tier-b", NodeType::TierSettings, Some("zone-b"), "web"),
            &[("tier_name", "\"web\""), ("tier_desc", "\"web tier\"")],
        ),
    ];
    assign_depths(&mut nodes);

    Graph {
        nodes,
        edges: vec![],
    }
}

/// Reads all file entries of a zip archive, keyed by path.
pub fn read_archive(archive: &[u8]) -> BTreeMap<String, String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).expect("must be a zip archive");
    let mut files = BTreeMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).expect("entry must be readable");
        if entry.is_dir() {
            continue;
        }
        let mut contents = String::new();
        entry
            .read_to_string(&mut contents)
            .expect("entry must be utf-8");
        files.insert(entry.name().to_owned(), contents);
    }
    files
}
