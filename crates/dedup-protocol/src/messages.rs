//! Phase-level wire messages for the three-phase dedup protocol
//! Built on the primitives in [`crate::io`].

use std::time::Duration;

use dedup_core::{Error, FpRecord, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::io::{
    discard_exact, read_blob, read_count, read_i32, read_i64, read_u64, write_blob, write_i32,
    write_i64, write_u64,
};

/// Socket send/receive timeout applied to every phase.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on a single uploaded chunk's size.
pub const MAX_UPLOAD_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// A generous cap on a filename's length, applied before allocating a
/// buffer for it.
pub const MAX_FILENAME_LEN: usize = 8192;

/// A generous cap on the number of `(weak_fp, node_id)` records in one
/// list, applied before allocating a buffer for them.
pub const MAX_RECORD_COUNT: usize = 64 * 1024 * 1024;

/// Length in bytes of one `{u64 weak_fp, i32 node_id}` wire record.
const RECORD_SIZE: usize = 12;

/// Length in bytes of a SHA-1 digest.
pub const DIGEST_SIZE: usize = 20;

// ---------------------------------------------------------------------
// Phase A — Announce
// ---------------------------------------------------------------------

/// Client side: send the file preamble (name, size, content).
///
/// `file_bytes.len()` must equal `file_size`; this is an invariant of the
/// caller, not re-validated here.
pub async fn send_announce<W: AsyncWrite + Unpin>(
    w: &mut W,
    filename: &str,
    file_bytes: &[u8],
) -> Result<()> {
    if filename.as_bytes().contains(&0) {
        return Err(Error::protocol("filename must not contain a NUL byte"));
    }
    write_i32(w, filename.len() as i32).await?;
    w.write_all(filename.as_bytes()).await?;
    write_i64(w, file_bytes.len() as i64).await?;
    w.write_all(file_bytes).await?;
    Ok(())
}

/// Node side: receive the filename and declared file size. The caller is
/// responsible for then discarding `file_size` bytes of content via
/// [`discard_file_content`].
pub async fn recv_announce_header<R: AsyncRead + Unpin>(r: &mut R) -> Result<(String, u64)> {
    let name_len = read_count(r, "filename").await?;
    if name_len > MAX_FILENAME_LEN {
        return Err(Error::protocol(format!(
            "filename length {name_len} exceeds maximum {MAX_FILENAME_LEN}"
        )));
    }
    let mut name_bytes = vec![0u8; name_len];
    r.read_exact(&mut name_bytes).await?;
    if name_bytes.contains(&0) {
        return Err(Error::protocol("filename contains a NUL byte"));
    }
    let filename = String::from_utf8(name_bytes)
        .map_err(|_| Error::protocol("filename is not valid UTF-8"))?;

    let file_size = read_i64(r).await?;
    if file_size < 0 {
        return Err(Error::protocol(format!("negative file_size: {file_size}")));
    }

    Ok((filename, file_size as u64))
}

/// Node side: consume and discard `file_size` bytes of file content.
pub async fn discard_file_content<R: AsyncRead + Unpin>(r: &mut R, file_size: u64) -> Result<()> {
    discard_exact(r, file_size).await
}

/// Node side: advertise the chunks this node currently stores.
pub async fn send_fp_list<W: AsyncWrite + Unpin>(w: &mut W, records: &[FpRecord]) -> Result<()> {
    write_i32(w, records.len() as i32).await?;
    for rec in records {
        write_u64(w, rec.weak_fp).await?;
        write_i32(w, rec.node_id).await?;
    }
    Ok(())
}

/// Client side: receive a node's advertised fingerprint list.
pub async fn recv_fp_list<R: AsyncRead + Unpin>(r: &mut R) -> Result<Vec<FpRecord>> {
    let count = read_count(r, "fingerprint list").await?;
    if count > MAX_RECORD_COUNT {
        return Err(Error::protocol(format!(
            "fingerprint list count {count} exceeds maximum {MAX_RECORD_COUNT}"
        )));
    }
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let weak_fp = read_u64(r).await?;
        let node_id = read_i32(r).await?;
        records.push(FpRecord::new(weak_fp, node_id));
    }
    Ok(records)
}

// ---------------------------------------------------------------------
// Phase B — Verify
// ---------------------------------------------------------------------

/// Client side: announce the full set of weak fingerprints for the file
/// under processing (Phase B1).
pub async fn send_weak_fp_set<W: AsyncWrite + Unpin>(w: &mut W, weak_fps: &[u64]) -> Result<()> {
    write_i32(w, weak_fps.len() as i32).await?;
    for fp in weak_fps {
        write_u64(w, *fp).await?;
    }
    Ok(())
}

/// Node side: receive the client's full weak-fingerprint set for this
/// file, kept in memory for later reclamation.
pub async fn recv_weak_fp_set<R: AsyncRead + Unpin>(r: &mut R) -> Result<Vec<u64>> {
    let count = read_count(r, "file fingerprint set").await?;
    if count > MAX_RECORD_COUNT {
        return Err(Error::protocol(format!(
            "file fingerprint count {count} exceeds maximum {MAX_RECORD_COUNT}"
        )));
    }
    let mut fps = Vec::with_capacity(count);
    for _ in 0..count {
        fps.push(read_u64(r).await?);
    }
    Ok(fps)
}

/// Client side: send the subset of records believed to match this node
/// (Phase B2). Node side receives with [`recv_fp_list`] (same wire shape).
pub async fn send_match_candidates<W: AsyncWrite + Unpin>(
    w: &mut W,
    candidates: &[FpRecord],
) -> Result<()> {
    send_fp_list(w, candidates).await
}

/// Node side: compute and send SHA-1 digests for each match candidate, in
/// order. Missing chunks are represented as 20 zero bytes.
pub async fn send_digests<W: AsyncWrite + Unpin>(w: &mut W, digests: &[[u8; DIGEST_SIZE]]) -> Result<()> {
    for digest in digests {
        w.write_all(digest).await?;
    }
    Ok(())
}

/// Client side: receive exactly `count` SHA-1 digests. A short read (the
/// connection drops mid-reply) is a hard protocol error — callers must
/// never treat missing digests as "matched".
pub async fn recv_digests<R: AsyncRead + Unpin>(
    r: &mut R,
    count: usize,
) -> Result<Vec<[u8; DIGEST_SIZE]>> {
    let mut digests = Vec::with_capacity(count);
    for _ in 0..count {
        let mut buf = [0u8; DIGEST_SIZE];
        r.read_exact(&mut buf).await?;
        digests.push(buf);
    }
    Ok(digests)
}

// ---------------------------------------------------------------------
// Phase C — Ingest
// ---------------------------------------------------------------------

/// One chunk upload: its weak fingerprint and bytes.
#[derive(Clone, Debug)]
pub struct UploadRecord {
    pub weak_fp: u64,
    pub bytes: Vec<u8>,
}

/// Client side: send the set of chunks this node must store.
pub async fn send_uploads<W: AsyncWrite + Unpin>(
    w: &mut W,
    uploads: &[(u64, &[u8])],
) -> Result<()> {
    write_i32(w, uploads.len() as i32).await?;
    for (weak_fp, bytes) in uploads {
        write_u64(w, *weak_fp).await?;
        write_blob(w, bytes).await?;
    }
    Ok(())
}

/// Node side: receive the uploaded chunks. Rejects any chunk outside
/// `0 < chunk_size <= MAX_UPLOAD_CHUNK_SIZE` by aborting.
pub async fn recv_uploads<R: AsyncRead + Unpin>(r: &mut R) -> Result<Vec<UploadRecord>> {
    let count = read_count(r, "upload").await?;
    let mut uploads = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let weak_fp = read_u64(r).await?;
        let bytes = read_blob(r, MAX_UPLOAD_CHUNK_SIZE, "chunk").await?;
        if bytes.is_empty() {
            return Err(Error::protocol("uploaded chunk_size must be > 0"));
        }
        uploads.push(UploadRecord { weak_fp, bytes });
    }
    Ok(uploads)
}
