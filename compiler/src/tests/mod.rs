//! Generating archives, unpacking them and importing the result again.
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;
use tgflow_castore::attachmentservice::{AttachmentService, MemoryAttachmentService};
use tgflow_castore::fixtures::TFVARS_BLOB;

use crate::codegen::DEFAULT_MODULE_SOURCE_BASE;
use crate::fixtures::{edge, node, plotted_graph, read_archive};
use crate::graph::{FileRef, Graph};
use crate::hierarchy::NodeType;
use crate::paths::resolve_paths;
use crate::{generate_archive, import_tree, Error, GeneratorOptions, LayoutOptions};

fn unpack(archive: &[u8]) -> TempDir {
    let tmpdir = TempDir::new().unwrap();
    zip::ZipArchive::new(Cursor::new(archive))
        .expect("must be a zip archive")
        .extract(tmpdir.path())
        .expect("must extract");
    tmpdir
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

type NodeSummary = (NodeType, BTreeMap<String, String>, BTreeMap<String, String>);

/// Node type, locals and inputs of every node, keyed by its directory.
fn nodes_by_path(graph: &Graph) -> BTreeMap<String, NodeSummary> {
    let paths = resolve_paths(&graph.nodes).unwrap();
    graph
        .nodes
        .iter()
        .map(|n| {
            (
                paths[&n.id].clone(),
                (
                    n.node_type.clone(),
                    n.locals.clone(),
                    n.inputs.clone(),
                ),
            )
        })
        .collect()
}

/// Enabled edges as (source directory, target directory, name).
fn edges_by_path(graph: &Graph) -> BTreeSet<(String, String, Option<String>)> {
    let paths = resolve_paths(&graph.nodes).unwrap();
    graph
        .edges
        .iter()
        .filter(|e| e.enabled)
        .map(|e| {
            (
                paths[&e.source].clone(),
                paths[&e.target].clone(),
                e.dependency_name.clone(),
            )
        })
        .collect()
}

#[tokio::test]
async fn round_trip() {
    let svc = MemoryAttachmentService::default();

    let mut graph = plotted_graph();
    graph.edges = vec![
        edge("e1", "vpc", "tier-b", Some("peer")),
        edge("e2", "vpc", "region", Some("region")),
        {
            let mut disabled = edge("e3", "tier-a", "tier-b", Some("sibling"));
            disabled.enabled = false;
            disabled
        },
    ];
    let id = svc.put("prod.tfvars", "vpc", TFVARS_BLOB.clone()).await.unwrap();
    graph
        .nodes
        .iter_mut()
        .find(|n| n.id == "vpc")
        .unwrap()
        .files
        .push(FileRef {
            file_name: "prod.tfvars".into(),
            file_id: id.to_string(),
        });

    let archive = generate_archive(&graph, &svc, &GeneratorOptions::default())
        .await
        .expect("must generate");
    let tree = unpack(&archive);

    let import_svc = MemoryAttachmentService::default();
    let imported = import_tree(tree.path(), &import_svc, &LayoutOptions::default())
        .await
        .expect("must import");

    assert!(imported.errors.is_empty(), "{:?}", imported.errors);
    assert_eq!(graph.nodes.len(), imported.graph.nodes.len());
    assert_eq!(nodes_by_path(&graph), nodes_by_path(&imported.graph));
    assert_eq!(edges_by_path(&graph), edges_by_path(&imported.graph));
    assert_eq!(2, imported.graph.edges.len());

    // the attachment came along, under the new node id
    let vpc = imported
        .graph
        .nodes
        .iter()
        .find(|n| n.label == "vpc")
        .unwrap();
    assert_eq!(1, vpc.files.len());
    assert_eq!("prod.tfvars", vpc.files[0].file_name);
    let records = import_svc.list().await.unwrap();
    assert_eq!(1, records.len());
    assert_eq!(vpc.id, records[0].node_id);
    assert!(records[0].is_text);
}

#[tokio::test]
async fn generating_an_imported_tree_again_is_stable() {
    let svc = MemoryAttachmentService::default();
    let mut graph = plotted_graph();
    graph.edges = vec![edge("e1", "vpc", "tier-b", Some("peer"))];

    let first = generate_archive(&graph, &svc, &GeneratorOptions::default())
        .await
        .unwrap();
    let tree = unpack(&first);
    let imported = import_tree(tree.path(), &svc, &LayoutOptions::default())
        .await
        .unwrap();
    let second = generate_archive(&imported.graph, &svc, &GeneratorOptions::default())
        .await
        .unwrap();

    assert_eq!(read_archive(&first), read_archive(&second));
}

#[tokio::test]
async fn dependencies_across_top_level_folders() {
    let tmpdir = TempDir::new().unwrap();
    let root = tmpdir.path();
    let source = format!("terraform {{\n  source = \"{}app\"\n}}\n", DEFAULT_MODULE_SOURCE_BASE);

    write(root, "terragrunt.hcl", "");
    write(root, "acme/account.hcl", "locals {\n}\n");
    write(
        root,
        "acme/app/terragrunt.hcl",
        &format!("{}\ndependency \"db\" {{\n  config_path = \"../../other/db\"\n}}\n", source),
    );
    write(root, "other/account.hcl", "locals {\n}\n");
    write(root, "other/db/terragrunt.hcl", &source);

    let imported = import_tree(root, &MemoryAttachmentService::default(), &LayoutOptions::default())
        .await
        .expect("must import");

    assert_eq!(4, imported.graph.nodes.len());
    assert_eq!(
        BTreeSet::from([(
            "acme/app".to_string(),
            "other/db".to_string(),
            Some("db".to_string())
        )]),
        edges_by_path(&imported.graph)
    );
}

#[tokio::test]
async fn templated_dependency_path_is_unresolved() {
    let tmpdir = TempDir::new().unwrap();
    let root = tmpdir.path();
    write(root, "terragrunt.hcl", "");
    write(root, "acme/account.hcl", "locals {\n}\n");
    write(
        root,
        "acme/app/terragrunt.hcl",
        &format!(
            "terraform {{\n  source = \"{}app\"\n}}\n\ndependency \"db\" {{\n  config_path = \"${{get_terragrunt_dir()}}/../nowhere\"\n}}\n",
            DEFAULT_MODULE_SOURCE_BASE
        ),
    );

    let err = import_tree(root, &MemoryAttachmentService::default(), &LayoutOptions::default())
        .await
        .expect_err("must fail");

    match err {
        Error::UnresolvedDependency {
            source_path,
            config_path,
            name,
        } => {
            assert_eq!("acme/app", source_path);
            assert_eq!("${get_terragrunt_dir()}/../nowhere", config_path);
            assert_eq!("db", name);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn repeated_dependency_name_keeps_the_first_block() {
    let tmpdir = TempDir::new().unwrap();
    let root = tmpdir.path();
    let source = format!("terraform {{\n  source = \"{}app\"\n}}\n", DEFAULT_MODULE_SOURCE_BASE);
    write(root, "terragrunt.hcl", "");
    write(root, "acme/account.hcl", "locals {\n}\n");
    write(root, "acme/db/terragrunt.hcl", &source);
    write(root, "acme/cache/terragrunt.hcl", &source);
    write(
        root,
        "acme/app/terragrunt.hcl",
        &format!(
            "{}\ndependency \"db\" {{\n  config_path = \"../db\"\n}}\n\ndependency \"db\" {{\n  config_path = \"../cache\"\n}}\n",
            source
        ),
    );

    let svc = MemoryAttachmentService::default();
    let imported = import_tree(root, &svc, &LayoutOptions::default())
        .await
        .expect("must import");

    assert_eq!(
        BTreeSet::from([(
            "acme/app".to_string(),
            "acme/db".to_string(),
            Some("db".to_string())
        )]),
        edges_by_path(&imported.graph)
    );
}

#[tokio::test]
async fn parse_errors_survive_the_import() {
    let tmpdir = TempDir::new().unwrap();
    let root = tmpdir.path();
    write(root, "terragrunt.hcl", "");
    write(root, "acme/account.hcl", "locals {");
    write(root, "acme/notes/readme.txt", "hello");

    let imported = import_tree(root, &MemoryAttachmentService::default(), &LayoutOptions::default())
        .await
        .expect("must import");

    let account = imported
        .graph
        .nodes
        .iter()
        .find(|n| n.label == "acme")
        .unwrap();
    assert_eq!(NodeType::AccountSettings, account.node_type);
    assert!(imported.errors[&account.id]
        .to_string()
        .starts_with("Hcl file invalid"));
    // the account got sized as a group around the notes folder
    assert_ne!(LayoutOptions::default().default_size, account.size);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Any number of extra modules and folders below the first tier adds
    /// exactly one file per output-producing node.
    #[test]
    fn one_file_per_output_node(modules in 0usize..6, folders in 0usize..4) {
        let mut graph = plotted_graph();
        for i in 0..modules {
            graph.nodes.push(node(&format!("m{}", i), NodeType::Remote("compute/ecs".into()), Some("tier-a"), &format!("app-{}", i)));
        }
        for i in 0..folders {
            graph.nodes.push(node(&format!("f{}", i), NodeType::Folder, Some("tier-b"), &format!("folder-{}", i)));
        }

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let archive: Bytes = runtime
            .block_on(generate_archive(&graph, &MemoryAttachmentService::default(), &GeneratorOptions::default()))
            .unwrap();

        let expected = graph.nodes.iter().filter(|n| !n.node_type.has_no_output()).count() + 1;
        prop_assert_eq!(expected, read_archive(&archive).len());
    }
}
