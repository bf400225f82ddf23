//! Storage node binary: accepts TCP connections from client
//! orchestrators and drives one Announce/Verify/Ingest round per connection
//! against a local, content-addressed chunk directory.

mod connection;

use std::sync::Arc;

use clap::Parser;
use dedup_storage::{ChunkStore, DirChunkStore};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "dedup-node", about = "Deduplicating chunk store node")]
struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Directory backing this node's chunk store.
    #[arg(long, default_value = "./storage")]
    storage_dir: String,

    /// This node's identity, reported in fingerprint advertisements.
    #[arg(long, default_value_t = 1)]
    node_id: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    dedup_core::NodeIdentity::new(args.node_id)?;

    let store: Arc<dyn ChunkStore> = Arc::new(DirChunkStore::open(&args.storage_dir).await?);
    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(port = args.port, storage_dir = %args.storage_dir, node_id = args.node_id, "node listening");

    loop {
        let (mut stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
        };

        let store = Arc::clone(&store);
        let node_id = args.node_id;
        tokio::spawn(async move {
            match connection::handle_round(&mut stream, &*store, node_id).await {
                Ok(summary) => tracing::info!(
                    peer = %peer,
                    filename = summary.filename,
                    file_size = summary.file_size,
                    advertised = summary.advertised_count,
                    matched = summary.matched_count,
                    uploaded = summary.uploaded_count,
                    failed_writes = summary.failed_write_count,
                    reclaimed = summary.reclaimed_count,
                    "round complete"
                ),
                Err(e) => tracing::warn!(peer = %peer, error = %e, "round aborted"),
            }
        });
    }
}
