//! Chunk and manifest types.
//!
//! A [`ChunkSpan`] is what the chunker emits: a byte range plus its weak
//! fingerprint. A [`FileManifest`] is the ordered sequence of spans for the
//! file currently being processed; it is transient client-side state,
//! discarded once the upload phase completes.

/// Minimum chunk length produced by the chunker, except possibly the final
/// chunk of a short file.
pub const MIN_CHUNK_SIZE: usize = 6144;
/// Maximum chunk length produced by the chunker.
pub const MAX_CHUNK_SIZE: usize = 32768;

/// 20-byte SHA-1 digest used as the strong fingerprint.
pub type StrongFp = [u8; 20];

/// One chunk boundary as produced by the chunker: an offset and length into
/// the source buffer, plus the 64-bit weak fingerprint of its bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSpan {
    pub offset: usize,
    pub length: usize,
    pub weak_fp: u64,
}

impl ChunkSpan {
    pub fn new(offset: usize, length: usize, weak_fp: u64) -> Self {
        Self {
            offset,
            length,
            weak_fp,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Ordered sequence of chunk spans for one file under processing.
///
/// Owns no bytes itself — callers index back into their own file buffer
/// using `offset`/`length`. Lifecycle: created when the client begins
/// processing a file, discarded when the upload phase completes.
#[derive(Clone, Debug, Default)]
pub struct FileManifest {
    pub spans: Vec<ChunkSpan>,
    pub file_size: u64,
}

impl FileManifest {
    pub fn from_spans(spans: Vec<ChunkSpan>, file_size: u64) -> Self {
        Self { spans, file_size }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// All distinct weak fingerprints referenced by this manifest, in
    /// manifest order, including duplicates (two chunks may legitimately
    /// share a weak_fp even with different content, a rare collision).
    pub fn weak_fingerprints(&self) -> Vec<u64> {
        self.spans.iter().map(|s| s.weak_fp).collect()
    }

    pub fn bytes_of<'a>(&self, span: &ChunkSpan, file: &'a [u8]) -> &'a [u8] {
        &file[span.offset..span.end()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_tracks_weak_fingerprints_in_order() {
        let spans = vec![
            ChunkSpan::new(0, 10, 1),
            ChunkSpan::new(10, 20, 2),
            ChunkSpan::new(30, 5, 1),
        ];
        let manifest = FileManifest::from_spans(spans, 35);
        assert_eq!(manifest.weak_fingerprints(), vec![1, 2, 1]);
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn bytes_of_slices_the_backing_buffer() {
        let data = b"hello world".to_vec();
        let span = ChunkSpan::new(6, 5, 0);
        let manifest = FileManifest::from_spans(vec![span], data.len() as u64);
        assert_eq!(manifest.bytes_of(&span, &data), b"world");
    }
}
