//! Primitive framing: length-prefixed, fully-drained send/receive of
//! integers and byte blobs over a reliable byte stream.
//!
//! Every routine here either fully transmits/receives the requested byte
//! count or returns an error — partial I/O that would desynchronize the
//! framing is treated as a protocol violation by the caller, never
//! silently tolerated.

use dedup_core::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub async fn write_i32<W: AsyncWrite + Unpin>(w: &mut W, v: i32) -> Result<()> {
    w.write_all(&v.to_le_bytes()).await?;
    Ok(())
}

pub async fn read_i32<R: AsyncRead + Unpin>(r: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).await?;
    Ok(i32::from_le_bytes(buf))
}

pub async fn write_i64<W: AsyncWrite + Unpin>(w: &mut W, v: i64) -> Result<()> {
    w.write_all(&v.to_le_bytes()).await?;
    Ok(())
}

pub async fn read_i64<R: AsyncRead + Unpin>(r: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).await?;
    Ok(i64::from_le_bytes(buf))
}

pub async fn write_u64<W: AsyncWrite + Unpin>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes()).await?;
    Ok(())
}

pub async fn read_u64<R: AsyncRead + Unpin>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).await?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads a non-negative count, rejecting implausible (negative) values
/// before the caller sizes any buffer from it.
pub async fn read_count<R: AsyncRead + Unpin>(r: &mut R, what: &str) -> Result<usize> {
    let n = read_i32(r).await?;
    if n < 0 {
        return Err(Error::protocol(format!("negative {what} count: {n}")));
    }
    Ok(n as usize)
}

/// Reads a length-prefixed byte blob (i32 length, then that many bytes),
/// rejecting negative lengths and lengths above `max_len` before
/// allocating.
pub async fn read_blob<R: AsyncRead + Unpin>(
    r: &mut R,
    max_len: usize,
    what: &str,
) -> Result<Vec<u8>> {
    let len = read_count(r, what).await?;
    if len > max_len {
        return Err(Error::protocol(format!(
            "{what} length {len} exceeds maximum {max_len}"
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_blob<W: AsyncWrite + Unpin>(w: &mut W, bytes: &[u8]) -> Result<()> {
    write_i32(w, bytes.len() as i32).await?;
    w.write_all(bytes).await?;
    Ok(())
}

/// Discards exactly `len` bytes from the stream without buffering them
/// (the node consumes and discards the file
/// content, it never stores the file monolithically).
pub async fn discard_exact<R: AsyncRead + Unpin>(r: &mut R, mut len: u64) -> Result<()> {
    let mut sink = [0u8; 64 * 1024];
    while len > 0 {
        let want = len.min(sink.len() as u64) as usize;
        r.read_exact(&mut sink[..want]).await?;
        len -= want as u64;
    }
    Ok(())
}
