use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use data_encoding::HEXLOWER;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use tgflow_castore::attachmentservice::AttachmentService;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use super::config::{module_name_from_source, parse_config, ParsedConfig};
use super::{ScanOutput, ScannedNode, TempDependency};
use crate::errors::ParseErrorMarker;
use crate::graph::{FileRef, Node};
use crate::hierarchy::{NodeType, DEFAULT_OUTPUT_FILE_NAME, SETTINGS_TYPES};
use crate::Error;

/// Walks a configuration tree and turns every directory into a node.
///
/// A directory is classified by the first settings file found in it
/// (`account.hcl`, `env.hcl`, ...), else by a `terragrunt.hcl` whose
/// `terraform.source` names a remote module, else it's a plain
/// [NodeType::Folder]. Folders without files and without nodes below them
/// are dropped.
///
/// Sibling directories are scanned concurrently. The set of used node ids is
/// shared between all of them.
pub struct Scanner<'a, A: ?Sized> {
    root: PathBuf,
    attachment_service: &'a A,
    used_ids: Mutex<HashSet<String>>,
}

impl<'a, A> Scanner<'a, A>
where
    A: AttachmentService + ?Sized,
{
    /// `root` is the directory node paths and ids are derived relative to.
    pub fn new(root: impl Into<PathBuf>, attachment_service: &'a A) -> Self {
        Self {
            root: root.into(),
            attachment_service,
            used_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Derives the id from the md5 of the relative path, so the same tree
    /// yields the same ids across runs. Falls back to a random id if that
    /// one is already taken in this run.
    fn claim_id(&self, rel_path: &str) -> String {
        let mut used = self.used_ids.lock();
        let mut id = HEXLOWER.encode(&Md5::digest(rel_path.as_bytes()));
        while used.contains(&id) {
            debug!(rel_path, %id, "id already in use, using a random one");
            id = Uuid::new_v4().to_string();
        }
        used.insert(id.clone());
        id
    }

    fn release_id(&self, id: &str) {
        self.used_ids.lock().remove(id);
    }

    fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    /// Scans the directory at `path` and everything below it. `depth` is 0
    /// for the top-level folders, which must carry a configuration file.
    ///
    /// Unreadable or invalid configuration files don't fail the scan, the
    /// node is kept with a [ParseErrorMarker]. A `terragrunt.hcl` without a
    /// usable module source does fail it.
    pub fn scan_folder<'s>(
        &'s self,
        path: &'s Path,
        depth: u32,
        parent_id: Option<&'s str>,
    ) -> BoxFuture<'s, Result<ScanOutput, Error>>
    where
        'a: 's,
    {
        async move {
            let (subdirs, mut files) = list_dir(path).await?;

            let settings_type = SETTINGS_TYPES
                .iter()
                .find(|t| contains_file(&files, t.output_file_name()))
                .cloned();
            let config_name = match &settings_type {
                Some(t) => Some(t.output_file_name()),
                None if contains_file(&files, DEFAULT_OUTPUT_FILE_NAME) => {
                    Some(DEFAULT_OUTPUT_FILE_NAME)
                }
                None if depth == 0 => return Err(Error::RootConfigMissing(path.to_path_buf())),
                None => None,
            };

            let rel_path = self.relative(path);
            let id = self.claim_id(&rel_path);
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| rel_path.clone());

            let mut node = Node::new(id.clone(), NodeType::Folder, label);
            node.parent_id = parent_id.map(str::to_owned);
            node.depth = depth;

            let mut output = ScanOutput::default();
            let mut error = None;

            if let Some(config_name) = config_name {
                files.retain(|f| f.file_name() != Some(OsStr::new(config_name)));
                let config_path = path.join(config_name);

                match read_config(&config_path).await {
                    Ok(parsed) => {
                        node.node_type = match settings_type {
                            Some(t) => t,
                            None => remote_type(&config_path, &parsed)?,
                        };
                        node.locals = parsed.locals;
                        node.inputs = parsed.inputs;
                        output
                            .dependencies
                            .extend(parsed.dependencies.into_iter().map(|(name, config_path)| {
                                TempDependency {
                                    source_id: id.clone(),
                                    source_path: rel_path.clone(),
                                    config_path,
                                    name,
                                }
                            }));
                    }
                    Err(marker) => {
                        debug!(path = %config_path.display(), %marker, "keeping node with parse error");
                        // without a readable source a remote module can't
                        // be told apart from a folder.
                        node.node_type = settings_type.unwrap_or(NodeType::Folder);
                        error = Some(marker);
                    }
                }
            }

            let children = try_join_all(
                subdirs
                    .iter()
                    .map(|dir| self.scan_folder(dir, depth + 1, Some(id.as_str()))),
            )
            .await?;

            if config_name.is_none() && files.is_empty() && children.iter().all(|c| c.nodes.is_empty()) {
                trace!(path = %path.display(), "pruning empty folder");
                self.release_id(&id);
                return Ok(ScanOutput::default());
            }

            node.files = self.upload_files(&id, &files).await?;

            output.nodes.push(ScannedNode {
                node,
                path: rel_path,
                error,
            });
            for child in children {
                output.extend(child);
            }

            Ok(output)
        }
        .boxed()
    }

    #[instrument(skip_all, fields(node.id = node_id, count = files.len()), err)]
    async fn upload_files(&self, node_id: &str, files: &[PathBuf]) -> Result<Vec<FileRef>, Error> {
        try_join_all(files.iter().map(|file| async move {
            let contents = tokio::fs::read(file)
                .await
                .map_err(|e| Error::Io(file.clone(), e))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let id = self
                .attachment_service
                .put(&file_name, node_id, contents.into())
                .await?;

            Ok::<_, Error>(FileRef {
                file_name,
                file_id: id.to_string(),
            })
        }))
        .await
    }
}

/// Lists the subdirectories and plain files of `path`, sorted by name.
/// Anything else (symlinks, sockets, ...) is skipped.
async fn list_dir(path: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), Error> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| Error::Io(path.to_path_buf(), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Io(path.to_path_buf(), e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::Io(entry.path(), e))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        } else {
            trace!(path = %entry.path().display(), "skipping special file");
        }
    }

    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

fn contains_file(files: &[PathBuf], name: &str) -> bool {
    files.iter().any(|f| f.file_name() == Some(OsStr::new(name)))
}

async fn read_config(path: &Path) -> Result<ParsedConfig, ParseErrorMarker> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ParseErrorMarker::Unreadable(e.to_string()))?;
    parse_config(&text).map_err(ParseErrorMarker::InvalidHcl)
}

fn remote_type(config_path: &Path, parsed: &ParsedConfig) -> Result<NodeType, Error> {
    let source = parsed.terraform_source.as_deref().unwrap_or_default();
    module_name_from_source(source)
        .map(NodeType::Remote)
        .ok_or_else(|| Error::InvalidModuleSource {
            path: config_path.to_path_buf(),
            source_url: source.to_owned(),
        })
}
