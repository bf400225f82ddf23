//! # dedup-storage
//!
//! The node-side chunk store: a content-addressed directory
//! where each chunk file is named by its weak fingerprint, supporting
//! existence checks, read-back for verification, write-on-upload, and
//! reclamation of chunks the current file doesn't reference.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dedup_core::{Error, Result};
use tokio::io::AsyncWriteExt;

/// Storage backend trait. One implementation (`DirChunkStore`) backs onto a
/// real filesystem directory; the trait exists so the node service and its
/// tests can be written against an abstract content-addressed store rather
/// than hard-coding filesystem paths.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Unordered list of weak fingerprints currently stored.
    async fn list_fingerprints(&self) -> Result<Vec<u64>>;

    /// Whether a chunk with this fingerprint exists and is readable.
    async fn exists(&self, weak_fp: u64) -> Result<bool>;

    /// Read a chunk's bytes. `Ok(None)` signals absence distinctly from an
    /// I/O error (`Err`).
    async fn read(&self, weak_fp: u64) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite the chunk file for `weak_fp` with `bytes`.
    /// Atomic with respect to concurrent `exists`/`read` calls (write to a
    /// temp file, then rename).
    async fn write(&self, weak_fp: u64, bytes: &[u8]) -> Result<()>;

    /// Delete every chunk file whose fingerprint is not in `keep`. Returns
    /// the fingerprints actually removed.
    async fn reclaim(&self, keep: &HashSet<u64>) -> Result<Vec<u64>>;
}

/// Renders a weak fingerprint as the lowercase, zero-padded 16-hex-digit
/// filename stem used throughout the store.
pub fn chunk_filename(weak_fp: u64) -> String {
    format!("{weak_fp:016x}.chunk")
}

/// Parses a directory entry name back into a weak fingerprint, returning
/// `None` for anything not matching `^[0-9a-f]{16}\.chunk$` — those files
/// are ignored by `list_fingerprints` and preserved by `reclaim`.
fn parse_chunk_filename(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".chunk")?;
    if stem.len() != 16 || !stem.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
    {
        return None;
    }
    u64::from_str_radix(stem, 16).ok()
}

/// Filesystem-backed chunk store: one flat directory per node.
pub struct DirChunkStore {
    dir: PathBuf,
}

impl DirChunkStore {
    /// Opens (creating if absent) a chunk store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn chunk_path(&self, weak_fp: u64) -> PathBuf {
        self.dir.join(chunk_filename(weak_fp))
    }
}

#[async_trait]
impl ChunkStore for DirChunkStore {
    async fn list_fingerprints(&self) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(fp) = parse_chunk_filename(&name) {
                out.push(fp);
            }
        }
        Ok(out)
    }

    async fn exists(&self, weak_fp: u64) -> Result<bool> {
        match tokio::fs::metadata(self.chunk_path(weak_fp)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn read(&self, weak_fp: u64) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.chunk_path(weak_fp)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn write(&self, weak_fp: u64, bytes: &[u8]) -> Result<()> {
        let suffix: u64 = rand::random();
        let tmp_path = self.dir.join(format!(".{weak_fp:016x}.tmp-{suffix:016x}"));

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, self.chunk_path(weak_fp)).await?;
        Ok(())
    }

    async fn reclaim(&self, keep: &HashSet<u64>) -> Result<Vec<u64>> {
        let mut removed = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(fp) = parse_chunk_filename(&name) else {
                continue;
            };
            if keep.contains(&fp) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed.push(fp),
                Err(e) => {
                    tracing::warn!(fingerprint = %format!("{fp:016x}"), error = %e, "failed to reclaim chunk file");
                }
            }
        }
        Ok(removed)
    }
}
