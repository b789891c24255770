use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "realmsync")]
#[command(about = "Reconcile declarative realm configuration against a live IAM server")]
#[command(version)]
pub struct Cli {
    /// Admin API base URL
    #[arg(short, long, env = "REALMSYNC_URL")]
    pub server: String,

    /// Bearer token for the admin API
    #[arg(short, long, env = "REALMSYNC_TOKEN")]
    pub token: Option<String>,

    /// Directory of numbered snapshot documents (0_create.json, 1_update.json, ...)
    #[arg(short, long, env = "REALMSYNC_IMPORT_DIR")]
    pub import_dir: PathBuf,

    /// Checkpoint ledger file
    #[arg(
        short,
        long,
        env = "REALMSYNC_CHECKPOINT_FILE",
        default_value = "realmsync-checkpoints.json"
    )]
    pub checkpoint_file: PathBuf,

    /// Delete live resources the documents do not mention
    #[arg(long)]
    pub prune: bool,

    /// Compute and print the operation plan without applying it
    #[arg(long)]
    pub dry_run: bool,
}
