//! The catalog of remote modules that can be placed into a graph.
//!
//! The compiler only reads it through [ModuleCatalog]. Keeping it current is
//! the job of a [CatalogRefresher], which periodically re-reads a
//! [CatalogSource] and keeps serving the last good snapshot if that fails.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::codegen::format_expression;
use crate::Error;

/// Default time between two catalog refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// A variable a module accepts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInput {
    pub name: String,
    /// The default value as an HCL expression.
    pub default: Option<String>,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    /// True if the variable has no default.
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Name as used in a remote node type, e.g. `network/vpc`.
    pub module_name: String,
    pub possible_inputs: Vec<ModuleInput>,
}

/// Read-only view of the module catalog.
pub trait ModuleCatalog: Send + Sync {
    fn snapshot(&self) -> Arc<Vec<CatalogEntry>>;

    fn get(&self, module_name: &str) -> Option<CatalogEntry> {
        self.snapshot()
            .iter()
            .find(|e| e.module_name == module_name)
            .cloned()
    }
}

/// Produces a fresh list of catalog entries.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<CatalogEntry>, Error>;
}

/// Reads modules from a local checkout of the modules repository.
///
/// Every directory containing a file whose name starts with `variable` is a
/// module, named by its path below the root. Modules may be nested, e.g.
/// `network` and `network/vpc`.
#[derive(Clone, Debug)]
pub struct DirectoryCatalogSource {
    root: PathBuf,
}

impl DirectoryCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CatalogSource for DirectoryCatalogSource {
    #[instrument(skip_all, fields(root = %self.root.display()), err)]
    async fn fetch(&self) -> Result<Vec<CatalogEntry>, Error> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_modules(&root))
            .await
            .map_err(|e| Error::Io(self.root.clone(), std::io::Error::other(e)))?
    }
}

fn scan_modules(root: &Path) -> Result<Vec<CatalogEntry>, Error> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::Io(path, e.into())
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let Some(variables_file) = find_variables_file(entry.path())? else {
            continue;
        };

        let module_name = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let text = std::fs::read_to_string(&variables_file)
            .map_err(|e| Error::Io(variables_file.clone(), e))?;
        let possible_inputs = match parse_variables(&text) {
            Ok(inputs) => inputs,
            Err(e) => {
                warn!(module = %module_name, path = %variables_file.display(), err = %e, "unable to parse variables");
                Vec::new()
            }
        };

        debug!(module = %module_name, inputs = possible_inputs.len(), "found module");
        entries.push(CatalogEntry {
            module_name,
            possible_inputs,
        });
    }

    Ok(entries)
}

/// The first file in `dir` (by name) whose name starts with `variable`.
fn find_variables_file(dir: &Path) -> Result<Option<PathBuf>, Error> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::Io(dir.to_path_buf(), e))? {
        let entry = entry.map_err(|e| Error::Io(dir.to_path_buf(), e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| Error::Io(entry.path(), e))?
            .is_file();
        if is_file && entry.file_name().to_string_lossy().starts_with("variable") {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Collects all `variable "name" { ... }` blocks.
fn parse_variables(text: &str) -> Result<Vec<ModuleInput>, hcl::Error> {
    let body = hcl::parse(text)?;
    let mut inputs = Vec::new();

    for block in body.blocks().filter(|b| b.identifier() == "variable") {
        let Some(name) = block.labels().first() else {
            continue;
        };

        let mut input = ModuleInput {
            name: name.as_str().to_owned(),
            default: None,
            input_type: None,
            required: true,
        };
        for attr in block.body().attributes() {
            match attr.key() {
                "type" => input.input_type = Some(format_expression(attr.expr())?),
                "default" => input.default = Some(format_expression(attr.expr())?),
                _ => {}
            }
        }
        input.required = input.default.is_none();
        inputs.push(input);
    }

    Ok(inputs)
}

#[derive(Clone, Debug)]
pub struct RefreshOptions {
    pub interval: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Keeps the catalog up to date in a background task.
///
/// The first fetch happens right away, later ones after every interval.
/// A failed fetch is logged and the previous snapshot stays in place.
pub struct CatalogRefresher {
    snapshot: Arc<RwLock<Arc<Vec<CatalogEntry>>>>,
    cancel: CancellationToken,
    /// Only taken by [CatalogRefresher::shutdown].
    task: Option<JoinHandle<()>>,
}

impl CatalogRefresher {
    /// Spawns the refresh task on the current tokio runtime.
    pub fn start<S>(source: S, options: RefreshOptions) -> Self
    where
        S: CatalogSource + 'static,
    {
        let snapshot: Arc<RwLock<Arc<Vec<CatalogEntry>>>> = Default::default();
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let snapshot = snapshot.clone();
            let cancel = cancel.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = source.fetch() => match result {
                            Ok(entries) => {
                                info!(modules = entries.len(), "refreshed module catalog");
                                *snapshot.write() = Arc::new(entries);
                            }
                            Err(e) => warn!(err = %e, "failed to refresh module catalog"),
                        },
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(options.interval) => {}
                    }
                }
                debug!("catalog refresher stopped");
            }
        });

        Self {
            snapshot,
            cancel,
            task: Some(task),
        }
    }

    /// Stops the refresh task and waits for it to exit. The last snapshot
    /// stays readable.
    pub async fn shutdown(mut self) -> Arc<Vec<CatalogEntry>> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(err = %e, "catalog refresher task failed");
            }
        }
        self.snapshot.read().clone()
    }
}

impl ModuleCatalog for CatalogRefresher {
    fn snapshot(&self) -> Arc<Vec<CatalogEntry>> {
        self.snapshot.read().clone()
    }
}

impl Drop for CatalogRefresher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
