use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tgflow_compiler::codegen::DEFAULT_MODULE_SOURCE_BASE;
use tracing::Level;

/// Compiles infrastructure graphs into terragrunt trees and back.
///
/// The CLI interface is not stable and subject to change.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, global = true, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Draw progress bars for long running operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Where attachments are stored, `memory://` or `simplefs:///some/dir`.
    #[arg(long, global = true, env, default_value = "memory://")]
    pub attachment_service_addr: String,

    /// Prefix of every generated module source, the module name is appended.
    #[arg(long, global = true, env, default_value = DEFAULT_MODULE_SOURCE_BASE)]
    pub module_source_base: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Generates the zip archive of a saved graph.
    Generate {
        /// Graph as saved by the editor, `{"nodes": [...], "edges": [...]}`.
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
    /// Scans an existing tree and prints the reconstructed graph.
    Import {
        #[clap(value_name = "DIR")]
        dir: PathBuf,

        /// Write the graph here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Prints the catalog of modules found in a modules checkout.
    Catalog {
        #[arg(long, env)]
        modules_dir: PathBuf,

        /// Seconds between two refreshes in watch mode.
        #[arg(long, default_value_t = 43200)]
        refresh_interval: u64,

        /// Keep refreshing until interrupted, then print the last catalog.
        #[arg(long)]
        watch: bool,
    },
}
