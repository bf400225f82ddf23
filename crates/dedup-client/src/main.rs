//! Client orchestrator binary: chunks one or two files and
//! runs a dedup round against every storage node in the configured fleet.

mod report;
mod round;

use std::sync::Arc;

use clap::Parser;
use dedup_core::Config;

/// `client <file>` runs one round. `client <old_file> <new_file>` seeds
/// against `old_file` first, then measures redundancy against `new_file`
/// before and after an edit.
#[derive(Parser, Debug)]
#[command(name = "dedup-client", about = "Deduplicating chunk store client")]
struct Args {
    /// One file to process, or two: `<old_file> <new_file>`.
    #[arg(required = true, num_args = 1..=2)]
    files: Vec<String>,

    /// Path to the node fleet configuration.
    #[arg(long, default_value = "./dedup.conf")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    if config.nodes.len() < 2 {
        anyhow::bail!(
            "at least two storage nodes must be configured in {}",
            args.config
        );
    }

    for path in &args.files {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("cannot read {path}: {e}"))?;

        let report = round::run_round(&config.nodes, path, Arc::new(bytes)).await?;
        report::print(&report);
    }

    Ok(())
}
