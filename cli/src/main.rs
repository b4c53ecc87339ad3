use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tgflow_castore::attachmentservice;
use tgflow_compiler::catalog::{
    CatalogRefresher, CatalogSource, DirectoryCatalogSource, ModuleCatalog, RefreshOptions,
};
use tgflow_compiler::{generate_archive, import_tree, GeneratorOptions, Graph, LayoutOptions};
use tgflow_tracing::TracingBuilder;
use tracing::info;

mod args;

use args::{Args, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut tracing_builder = TracingBuilder::default().level(args.log_level);
    if args.progress {
        tracing_builder = tracing_builder.enable_progressbar();
    }
    let tracing_handle = tracing_builder.build()?;
    let mut stdout = tracing_handle.get_stdout_writer();

    match args.command {
        Commands::Generate { graph, out } => {
            let attachment_service =
                attachmentservice::from_addr(&args.attachment_service_addr).await?;

            let graph: Graph = serde_json::from_slice(&tokio::fs::read(&graph).await?)?;
            let options = GeneratorOptions {
                module_source_base: args.module_source_base,
            };

            let archive = generate_archive(&graph, &*attachment_service, &options).await?;
            tokio::fs::write(&out, &archive).await?;
            info!(out = %out.display(), size = archive.len(), "wrote archive");
        }
        Commands::Import { dir, out } => {
            let attachment_service =
                attachmentservice::from_addr(&args.attachment_service_addr).await?;

            let imported =
                import_tree(&dir, &*attachment_service, &LayoutOptions::default()).await?;
            info!(
                nodes = imported.graph.nodes.len(),
                edges = imported.graph.edges.len(),
                errors = imported.errors.len(),
                "imported tree"
            );

            let json = serde_json::to_string_pretty(&imported.graph)?;
            match out {
                Some(out) => tokio::fs::write(&out, json).await?,
                None => writeln!(stdout, "{}", json)?,
            }
        }
        Commands::Catalog {
            modules_dir,
            refresh_interval,
            watch,
        } => {
            let source = DirectoryCatalogSource::new(modules_dir);

            let entries = if watch {
                let refresher = CatalogRefresher::start(
                    source,
                    RefreshOptions {
                        interval: Duration::from_secs(refresh_interval),
                    },
                );
                tokio::signal::ctrl_c().await?;
                info!(modules = refresher.snapshot().len(), "stopping catalog refresher");
                refresher.shutdown().await.as_ref().clone()
            } else {
                source.fetch().await?
            };

            writeln!(stdout, "{}", serde_json::to_string_pretty(&entries)?)?;
        }
    }

    Ok(())
}
