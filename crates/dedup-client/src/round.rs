//! One client round: announce a file to every configured
//! node, verify weak-fingerprint candidates against each node's SHA-1
//! replies, and upload the chunks nobody already had.
//!
//! Per-node work runs as an independent task over its own connection. The
//! tasks rendezvous exactly once, after every node's verify phase has
//! reported in: that's the earliest point the union of matched chunks is
//! known, which is what the `j mod N` upload assignment depends on. A node
//! that fails before reporting in contributes nothing to the union and is
//! charged for the uploads it would otherwise have received.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dedup_chunker::{strong_hash, Cdc64};
use dedup_core::{Error, FileManifest, FpRecord, NodeAddr, Result, WeakIndex};
use dedup_protocol::{
    recv_digests, recv_fp_list, send_announce, send_match_candidates, send_uploads,
    send_weak_fp_set, SOCKET_TIMEOUT,
};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

/// In-memory processing cap for a single file.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

async fn with_timeout<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(SOCKET_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "socket timed out",
        ))),
    }
}

/// Per-node outcome folded into the final statistics block.
#[derive(Clone, Debug)]
pub struct NodeReport {
    pub node_id: i32,
    pub matched_count: usize,
    pub matched_bytes: u64,
    pub uploaded_count: usize,
    pub uploaded_bytes: u64,
    /// Chunks assigned to this node under `j mod N` that were never
    /// uploaded because the round with this node failed. Not automatically
    /// rebalanced onto a surviving node.
    pub failed_count: usize,
    pub failed: bool,
}

/// Full outcome of one round against one file.
#[derive(Clone, Debug)]
pub struct RoundReport {
    pub filename: String,
    pub file_size: u64,
    pub chunk_count: usize,
    pub nodes: Vec<NodeReport>,
    pub union_matched_bytes: u64,
    pub elapsed: Duration,
}

impl RoundReport {
    pub fn redundancy_pct(&self) -> f64 {
        if self.file_size == 0 {
            0.0
        } else {
            (self.union_matched_bytes as f64 / self.file_size as f64) * 100.0
        }
    }
}

#[derive(Clone)]
struct VerifyOutcome {
    node_id: i32,
    matched_indices: HashSet<usize>,
    matched_bytes: u64,
}

/// Drives a full round against every configured node for one file.
pub async fn run_round(nodes: &[NodeAddr], filename: &str, file_bytes: Arc<Vec<u8>>) -> Result<RoundReport> {
    let started = Instant::now();

    if file_bytes.len() as u64 > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge {
            size: file_bytes.len() as u64,
            max: MAX_FILE_SIZE,
        });
    }

    let manifest = Arc::new(FileManifest::from_spans(
        Cdc64::new().split(&file_bytes),
        file_bytes.len() as u64,
    ));
    let node_count = nodes.len();

    let mut verify_rxs = Vec::with_capacity(node_count);
    let mut assign_txs = Vec::with_capacity(node_count);
    let mut handles = Vec::with_capacity(node_count);

    for (idx, addr) in nodes.iter().enumerate() {
        let (verify_tx, verify_rx) = oneshot::channel();
        let (assign_tx, assign_rx) = oneshot::channel();
        verify_rxs.push(verify_rx);
        assign_txs.push(assign_tx);

        let addr = *addr;
        let filename = filename.to_string();
        let file_bytes = Arc::clone(&file_bytes);
        let manifest = Arc::clone(&manifest);
        let config_node_id = (idx + 1) as i32;

        handles.push(tokio::spawn(run_node(
            addr,
            config_node_id,
            filename,
            file_bytes,
            manifest,
            verify_tx,
            assign_rx,
        )));
    }

    let mut verify_outcomes: Vec<Option<VerifyOutcome>> = Vec::with_capacity(node_count);
    for rx in verify_rxs {
        verify_outcomes.push(rx.await.ok());
    }

    let mut union_matched: HashSet<usize> = HashSet::new();
    for outcome in verify_outcomes.iter().flatten() {
        union_matched.extend(outcome.matched_indices.iter().copied());
    }

    let mut assignments: Vec<Vec<usize>> = vec![Vec::new(); node_count.max(1)];
    for j in 0..manifest.len() {
        if union_matched.contains(&j) {
            continue;
        }
        assignments[j % node_count].push(j);
    }
    let assigned_counts: Vec<usize> = assignments.iter().map(Vec::len).collect();

    for (idx, tx) in assign_txs.into_iter().enumerate() {
        let _ = tx.send(assignments[idx].clone());
    }

    let mut node_reports = Vec::with_capacity(node_count);
    for (idx, handle) in handles.into_iter().enumerate() {
        let config_node_id = (idx + 1) as i32;
        let report = match handle.await.expect("node task panicked") {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(node_id = config_node_id, error = %e, "node round failed");
                let verify = verify_outcomes[idx].as_ref();
                NodeReport {
                    node_id: verify.map(|v| v.node_id).unwrap_or(config_node_id),
                    matched_count: verify.map(|v| v.matched_indices.len()).unwrap_or(0),
                    matched_bytes: verify.map(|v| v.matched_bytes).unwrap_or(0),
                    uploaded_count: 0,
                    uploaded_bytes: 0,
                    failed_count: assigned_counts[idx],
                    failed: true,
                }
            }
        };
        node_reports.push(report);
    }

    let union_matched_bytes: u64 = union_matched
        .iter()
        .map(|&i| manifest.spans[i].length as u64)
        .sum();

    Ok(RoundReport {
        filename: filename.to_string(),
        file_size: file_bytes.len() as u64,
        chunk_count: manifest.len(),
        nodes: node_reports,
        union_matched_bytes,
        elapsed: started.elapsed(),
    })
}

/// One node's full connection lifecycle: Announce, Verify, and (once the
/// caller has decided this node's share of the upload) Ingest.
async fn run_node(
    addr: NodeAddr,
    config_node_id: i32,
    filename: String,
    file_bytes: Arc<Vec<u8>>,
    manifest: Arc<FileManifest>,
    verify_tx: oneshot::Sender<VerifyOutcome>,
    assign_rx: oneshot::Receiver<Vec<usize>>,
) -> Result<NodeReport> {
    let mut stream = match tokio::time::timeout(
        SOCKET_TIMEOUT,
        TcpStream::connect((addr.ip, addr.port)),
    )
    .await
    {
        Ok(connected) => connected?,
        Err(_) => {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connect timed out",
            )))
        }
    };

    // --- Phase A: Announce ---
    with_timeout(send_announce(&mut stream, &filename, &file_bytes)).await?;
    let advertised = with_timeout(recv_fp_list(&mut stream)).await?;
    let node_id = advertised.first().map(|r| r.node_id).unwrap_or(config_node_id);
    let index = WeakIndex::build(&advertised);

    // --- Phase B: Verify ---
    let weak_fps = manifest.weak_fingerprints();
    with_timeout(send_weak_fp_set(&mut stream, &weak_fps)).await?;

    let mut match_positions = Vec::new();
    let mut match_candidates = Vec::new();
    for (i, fp) in weak_fps.iter().enumerate() {
        if index.contains(*fp) {
            match_positions.push(i);
            match_candidates.push(FpRecord::new(*fp, node_id));
        }
    }
    with_timeout(send_match_candidates(&mut stream, &match_candidates)).await?;
    let digests = with_timeout(recv_digests(&mut stream, match_candidates.len())).await?;

    let mut matched_indices = HashSet::new();
    for (&pos, digest) in match_positions.iter().zip(digests.iter()) {
        let span = manifest.spans[pos];
        let local = strong_hash(manifest.bytes_of(&span, &file_bytes));
        if &local == digest {
            matched_indices.insert(pos);
        }
    }
    let matched_bytes: u64 = matched_indices
        .iter()
        .map(|&i| manifest.spans[i].length as u64)
        .sum();

    let _ = verify_tx.send(VerifyOutcome {
        node_id,
        matched_indices: matched_indices.clone(),
        matched_bytes,
    });

    // --- Phase C: Ingest ---
    let assigned = assign_rx.await.unwrap_or_default();
    let upload_pairs: Vec<(u64, &[u8])> = assigned
        .iter()
        .map(|&i| {
            let span = &manifest.spans[i];
            (span.weak_fp, manifest.bytes_of(span, &file_bytes))
        })
        .collect();
    let uploaded_bytes: u64 = upload_pairs.iter().map(|(_, b)| b.len() as u64).sum();

    with_timeout(send_uploads(&mut stream, &upload_pairs)).await?;

    Ok(NodeReport {
        node_id,
        matched_count: matched_indices.len(),
        matched_bytes,
        uploaded_count: assigned.len(),
        uploaded_bytes,
        failed_count: 0,
        failed: false,
    })
}
