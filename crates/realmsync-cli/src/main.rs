mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use realmsync_client::{FileCheckpointStore, HttpResourceClient};
use realmsync_core::KindRegistry;
use realmsync_engine::{DirectorySource, ReconcileOptions, Reconciler};

use cli::Cli;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let registry = Arc::new(KindRegistry::builtin());
    let client = Arc::new(HttpResourceClient::new(
        &cli.server,
        cli.token.clone(),
        registry.clone(),
    ));
    let checkpoints = Arc::new(FileCheckpointStore::new(&cli.checkpoint_file));

    let reconciler = Reconciler::new(client, checkpoints, registry).with_options(ReconcileOptions {
        prune: cli.prune,
        dry_run: cli.dry_run,
    });

    let mut source = DirectorySource::new(&cli.import_dir)?;
    let report = reconciler.run(&mut source).await?;

    for outcome in &report.snapshots {
        if outcome.skipped {
            info!(
                document = %outcome.document,
                realm = %outcome.realm,
                "unchanged, skipped"
            );
        } else {
            info!(
                document = %outcome.document,
                realm = %outcome.realm,
                applied = outcome.applied_count(),
                "reconciled"
            );
        }
    }
    info!(
        snapshots = report.snapshots.len(),
        operations = report.total_applied(),
        dry_run = cli.dry_run,
        "run complete"
    );
    Ok(())
}
