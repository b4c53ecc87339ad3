//! Builds the zip archive of a whole graph.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Seek, Write};
use std::path::PathBuf;

use bytes::Bytes;
use futures::future::try_join_all;
use tgflow_castore::attachmentservice::{validate_name, AttachmentId, AttachmentService};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::codegen::{HclFile, DEFAULT_MODULE_SOURCE_BASE, ROOT_TERRAGRUNT_HCL};
use crate::deps::resolve_dependencies;
use crate::graph::{FileRef, Graph, Node};
use crate::hierarchy::{DEFAULT_OUTPUT_FILE_NAME, SETTINGS_TYPES};
use crate::paths::{ensure_unique, resolve_paths};
use crate::Error;

/// Owner recorded for entries that don't belong to a node.
const ROOT_OWNER: &str = "<root>";

#[derive(Clone, Debug)]
pub struct GeneratorOptions {
    /// Prefix of every `terraform.source`, the module name is appended.
    pub module_source_base: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            module_source_base: DEFAULT_MODULE_SOURCE_BASE.to_owned(),
        }
    }
}

impl GeneratorOptions {
    pub fn module_source(&self, module_name: &str) -> String {
        format!("{}{}", self.module_source_base, module_name)
    }
}

/// A file placed into the archive, with the node it came from.
struct Entry {
    owner: String,
    contents: Bytes,
}

/// An attached file that still needs to be fetched from the store.
struct PendingAttachment<'a> {
    archive_path: String,
    node_id: &'a str,
    file: &'a FileRef,
}

/// Generates the archive of the given graph.
///
/// Every node reachable from the top level becomes a directory. Nodes of
/// types with output get their generated configuration file, attached
/// files are fetched from `attachment_service` and placed next to it. The
/// fixed bootstrap `terragrunt.hcl` is always placed at the root.
///
/// Entries are written in path order with fixed timestamps and
/// permissions, so identical input yields identical bytes.
#[instrument(skip_all, fields(nodes = graph.nodes.len(), edges = graph.edges.len()), err)]
pub async fn generate_archive<A>(
    graph: &Graph,
    attachment_service: &A,
    options: &GeneratorOptions,
) -> Result<Bytes, Error>
where
    A: AttachmentService + ?Sized,
{
    let paths = resolve_paths(&graph.nodes)?;
    ensure_unique(&paths)?;

    for required in SETTINGS_TYPES {
        if !graph.nodes.iter().any(|n| n.node_type == required) {
            return Err(Error::IncompleteGraph(required));
        }
    }

    let nodes_by_id: HashMap<&str, &Node> =
        graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let dirs_by_path: HashMap<&str, &str> = paths
        .iter()
        .map(|(id, path)| (path.as_str(), id.as_str()))
        .collect();

    let mut entries: BTreeMap<String, Entry> = BTreeMap::new();
    entries.insert(
        DEFAULT_OUTPUT_FILE_NAME.to_owned(),
        Entry {
            owner: ROOT_OWNER.to_owned(),
            contents: Bytes::from_static(ROOT_TERRAGRUNT_HCL.as_bytes()),
        },
    );

    let mut pending = Vec::new();

    for (node_id, node_path) in &paths {
        // every id in the path map comes from graph.nodes
        let Some(node) = nodes_by_id.get(node_id.as_str()) else {
            continue;
        };

        let missing: Vec<&str> = node
            .node_type
            .required_locals()
            .iter()
            .filter(|key| !node.locals.contains_key(**key))
            .copied()
            .collect();
        if !missing.is_empty() {
            warn!(node.id = %node.id, node_type = %node.node_type, ?missing, "node is missing required locals");
        }

        if !node.node_type.has_no_output() {
            let dependencies =
                resolve_dependencies(node, node_path, graph.outgoing(&node.id), &paths)?;

            let file_name = node.node_type.output_file_name();
            let contents = HclFile {
                file_name,
                module_source: node
                    .node_type
                    .module_name()
                    .map(|name| options.module_source(name)),
                locals: &node.locals,
                inputs: &node.inputs,
                dependencies: &dependencies,
            }
            .to_string();

            place(
                &mut entries,
                &dirs_by_path,
                format!("{}/{}", node_path, file_name),
                &node.id,
                contents.into(),
            )?;
        } else {
            debug!(node.id = %node.id, node_type = %node.node_type, "type has no output");
        }

        for file in &node.files {
            validate_name(&file.file_name).map_err(|_| Error::InvalidAttachmentName {
                node: node.id.clone(),
                file_name: file.file_name.clone(),
            })?;
            pending.push(PendingAttachment {
                archive_path: format!("{}/{}", node_path, file.file_name),
                node_id: &node.id,
                file,
            });
        }
    }

    for (archive_path, node_id, contents) in fetch_attachments(attachment_service, &pending).await? {
        place(&mut entries, &dirs_by_path, archive_path, node_id, contents)?;
    }

    let dirs: BTreeSet<String> = paths
        .values()
        .flat_map(|path| ancestors(path))
        .collect();

    let archive = write_zip(&dirs, &entries, Cursor::new(Vec::new()))?;
    Ok(archive.into_inner().into())
}

/// Inserts a file entry, refusing to overwrite another file or to shadow a
/// node directory.
fn place(
    entries: &mut BTreeMap<String, Entry>,
    dirs_by_path: &HashMap<&str, &str>,
    archive_path: String,
    owner: &str,
    contents: Bytes,
) -> Result<(), Error> {
    if let Some(dir_owner) = dirs_by_path.get(archive_path.as_str()) {
        return Err(Error::PathCollision {
            path: archive_path,
            first: (*dir_owner).to_owned(),
            second: owner.to_owned(),
        });
    }
    if let Some(existing) = entries.get(&archive_path) {
        return Err(Error::PathCollision {
            path: archive_path,
            first: existing.owner.clone(),
            second: owner.to_owned(),
        });
    }
    entries.insert(
        archive_path,
        Entry {
            owner: owner.to_owned(),
            contents,
        },
    );
    Ok(())
}

/// Fetches all pending attachments concurrently. The first failure aborts
/// the whole run.
#[instrument(skip_all, fields(indicatif.pb_show=1, count = pending.len()), err)]
async fn fetch_attachments<'a, A>(
    attachment_service: &A,
    pending: &'a [PendingAttachment<'a>],
) -> Result<Vec<(String, &'a str, Bytes)>, Error>
where
    A: AttachmentService + ?Sized,
{
    let span = Span::current();
    span.pb_set_style(&tgflow_tracing::PB_PROGRESS_STYLE);
    span.pb_set_message("Fetching attachments");
    span.pb_set_length(pending.len() as u64);
    span.pb_start();

    try_join_all(pending.iter().map(|p| {
        let span = span.clone();
        async move {
            let contents = fetch_attachment(attachment_service, p.node_id, p.file).await?;
            span.pb_inc(1);
            Ok::<_, Error>((p.archive_path.clone(), p.node_id, contents))
        }
    }))
    .await
}

async fn fetch_attachment<A>(
    attachment_service: &A,
    node_id: &str,
    file: &FileRef,
) -> Result<Bytes, Error>
where
    A: AttachmentService + ?Sized,
{
    let id = AttachmentId::from(file.file_id.as_str());
    let mut reader = attachment_service
        .get(&id)
        .await?
        .ok_or_else(|| Error::AttachmentMissing {
            node: node_id.to_owned(),
            file_name: file.file_name.clone(),
            id: file.file_id.clone(),
        })?;

    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .map_err(|e| Error::Io(PathBuf::from(&file.file_name), e))?;

    Ok(buf.into())
}

/// All directory entries (with trailing slash) leading up to and including
/// `path`.
fn ancestors(path: &str) -> Vec<String> {
    path.match_indices('/')
        .map(|(i, _)| format!("{}/", &path[..i]))
        .chain(std::iter::once(format!("{}/", path)))
        .collect()
}

fn write_zip<W: Write + Seek>(
    dirs: &BTreeSet<String>,
    entries: &BTreeMap<String, Entry>,
    writer: W,
) -> Result<W, Error> {
    let mut zip = ZipWriter::new(writer);

    let dir_options = FileOptions::default()
        .last_modified_time(DateTime::default())
        .unix_permissions(0o755);
    let file_options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for dir in dirs {
        zip.add_directory(dir.as_str(), dir_options)?;
    }

    for (path, entry) in entries {
        zip.start_file(path.as_str(), file_options)?;
        zip.write_all(&entry.contents)
            .map_err(|e| Error::Io(PathBuf::from(path), e))?;
    }

    Ok(zip.finish()?)
}
