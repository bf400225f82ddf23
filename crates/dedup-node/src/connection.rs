//! Per-connection state machine: `Announce -> Verify -> Ingest -> Done`
//! Any I/O or protocol error at any point transitions to
//! `Abort`: the caller closes the connection and never calls `reclaim`.

use std::collections::HashSet;
use std::future::Future;

use dedup_chunker::strong_hash;
use dedup_core::{Error, FpRecord, Result};
use dedup_protocol::{
    discard_file_content, recv_announce_header, recv_fp_list, recv_uploads, recv_weak_fp_set,
    send_digests, send_fp_list, DIGEST_SIZE, SOCKET_TIMEOUT,
};
use dedup_storage::ChunkStore;
use tokio::io::{AsyncRead, AsyncWrite};

/// Per-round outcome, reported by the caller as one log line.
#[derive(Debug, Default)]
pub struct RoundSummary {
    pub filename: String,
    pub file_size: u64,
    pub advertised_count: usize,
    pub matched_count: usize,
    pub uploaded_count: usize,
    pub failed_write_count: usize,
    pub reclaimed_count: usize,
}

async fn with_timeout<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(SOCKET_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "socket timed out",
        ))),
    }
}

/// Drives exactly one protocol round over `stream` against `store`.
pub async fn handle_round<S>(stream: &mut S, store: &dyn ChunkStore, node_id: i32) -> Result<RoundSummary>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // --- Phase A: Announce ---
    let (filename, file_size) = with_timeout(recv_announce_header(stream)).await?;
    with_timeout(discard_file_content(stream, file_size)).await?;

    let fingerprints = store.list_fingerprints().await?;
    let advertised: Vec<FpRecord> = fingerprints
        .iter()
        .map(|fp| FpRecord::new(*fp, node_id))
        .collect();
    with_timeout(send_fp_list(stream, &advertised)).await?;

    // --- Phase B: Verify ---
    let current_file_fps = with_timeout(recv_weak_fp_set(stream)).await?;
    let match_candidates = with_timeout(recv_fp_list(stream)).await?;

    let mut digests = Vec::with_capacity(match_candidates.len());
    let mut matched_count = 0usize;
    for candidate in &match_candidates {
        match store.read(candidate.weak_fp).await? {
            Some(bytes) => {
                digests.push(strong_hash(&bytes));
                matched_count += 1;
            }
            None => digests.push([0u8; DIGEST_SIZE]),
        }
    }
    with_timeout(send_digests(stream, &digests)).await?;

    // --- Phase C: Ingest ---
    let uploads = with_timeout(recv_uploads(stream)).await?;

    let mut uploaded_fps: HashSet<u64> = HashSet::new();
    let mut failed_write_count = 0usize;
    for upload in &uploads {
        match store.write(upload.weak_fp, &upload.bytes).await {
            Ok(()) => {
                uploaded_fps.insert(upload.weak_fp);
            }
            Err(e) => {
                tracing::warn!(weak_fp = format!("{:016x}", upload.weak_fp), error = %e, "chunk write failed, skipping");
                failed_write_count += 1;
            }
        }
    }

    let mut keep: HashSet<u64> = current_file_fps.iter().copied().collect();
    keep.extend(uploaded_fps.iter().copied());
    let removed = store.reclaim(&keep).await?;
    let reclaimed_count = removed.len();

    Ok(RoundSummary {
        filename,
        file_size,
        advertised_count: advertised.len(),
        matched_count,
        uploaded_count: uploaded_fps.len(),
        failed_write_count,
        reclaimed_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dedup_protocol::{send_announce, send_match_candidates, send_uploads, send_weak_fp_set};
    use dedup_storage::DirChunkStore;
    use tokio::io::duplex;

    #[tokio::test]
    async fn full_round_with_one_upload_and_no_prior_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirChunkStore::open(dir.path()).await.unwrap();

        let (mut client, mut node) = duplex(1 << 20);

        let client_task = tokio::spawn(async move {
            send_announce(&mut client, "file.bin", b"hello world").await.unwrap();
            let advertised = dedup_protocol::recv_fp_list(&mut client).await.unwrap();
            assert!(advertised.is_empty());

            send_weak_fp_set(&mut client, &[999]).await.unwrap();
            send_match_candidates(&mut client, &[]).await.unwrap();

            let digests = dedup_protocol::recv_digests(&mut client, 0).await.unwrap();
            assert!(digests.is_empty());

            send_uploads(&mut client, &[(999u64, b"chunk-bytes".as_slice())])
                .await
                .unwrap();
        });

        let summary = handle_round(&mut node, &store, 1).await.unwrap();
        client_task.await.unwrap();

        assert_eq!(summary.filename, "file.bin");
        assert_eq!(summary.uploaded_count, 1);
        assert_eq!(summary.matched_count, 0);
        assert_eq!(summary.failed_write_count, 0);

        assert_eq!(store.read(999).await.unwrap(), Some(b"chunk-bytes".to_vec()));
    }

    #[tokio::test]
    async fn reclaim_drops_chunks_not_in_the_announced_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirChunkStore::open(dir.path()).await.unwrap();
        store.write(111, b"stale").await.unwrap();

        let (mut client, mut node) = duplex(1 << 20);

        let client_task = tokio::spawn(async move {
            send_announce(&mut client, "f", b"").await.unwrap();
            let advertised = dedup_protocol::recv_fp_list(&mut client).await.unwrap();
            assert_eq!(advertised.len(), 1);

            send_weak_fp_set(&mut client, &[222]).await.unwrap();
            send_match_candidates(&mut client, &[]).await.unwrap();
            let _ = dedup_protocol::recv_digests(&mut client, 0).await.unwrap();

            send_uploads(&mut client, &[(222u64, b"fresh".as_slice())])
                .await
                .unwrap();
        });

        let summary = handle_round(&mut node, &store, 1).await.unwrap();
        client_task.await.unwrap();

        assert_eq!(summary.reclaimed_count, 1);
        assert!(!store.exists(111).await.unwrap());
        assert!(store.exists(222).await.unwrap());
    }

    #[tokio::test]
    async fn empty_file_with_no_matches_still_reclaims_down_to_the_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirChunkStore::open(dir.path()).await.unwrap();
        store.write(111, b"stale").await.unwrap();
        store.write(222, b"also stale").await.unwrap();

        let (mut client, mut node) = duplex(1 << 20);

        let client_task = tokio::spawn(async move {
            send_announce(&mut client, "empty.bin", b"").await.unwrap();
            let advertised = dedup_protocol::recv_fp_list(&mut client).await.unwrap();
            assert_eq!(advertised.len(), 2);

            send_weak_fp_set(&mut client, &[]).await.unwrap();
            send_match_candidates(&mut client, &[]).await.unwrap();
            let _ = dedup_protocol::recv_digests(&mut client, 0).await.unwrap();

            send_uploads(&mut client, &[]).await.unwrap();
        });

        let summary = handle_round(&mut node, &store, 1).await.unwrap();
        client_task.await.unwrap();

        assert_eq!(summary.matched_count, 0);
        assert_eq!(summary.uploaded_count, 0);
        assert_eq!(summary.reclaimed_count, 2);
        assert!(!store.exists(111).await.unwrap());
        assert!(!store.exists(222).await.unwrap());
    }
}
