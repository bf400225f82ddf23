//! Normalized FastCDC-64 content-defined chunking.

use dedup_core::ChunkSpan;

use crate::gear_table::GEAR;

/// Lower bound, upper bound, and normalization midpoint for a chunk's length.
pub const MIN_SIZE: usize = 6144;
pub const MAX_SIZE: usize = 32768;
pub const MID_SIZE: usize = 8192;

/// Mask used while the candidate boundary is still short of `MID_SIZE` —
/// selects boundaries more reluctantly (more 1-bits to match).
const MASK_STRICT: u64 = 0x0000_d9f0_0353_0000;
/// Mask used past `MID_SIZE` — selects boundaries more eagerly.
const MASK_LENIENT: u64 = 0x0000_d900_0353_0000;

/// Deterministic content-defined splitter. Pure: holds only its fixed
/// parameters, never mutates them mid-call. The size bounds and masks are
/// `const`, not process-wide mutable state re-assigned per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cdc64;

impl Cdc64 {
    pub fn new() -> Self {
        Self
    }

    /// Split `buffer` into an ordered sequence of chunk spans.
    ///
    /// Empty input yields no spans. Every interior span's length is in
    /// `[MIN_SIZE, MAX_SIZE]`; the final span may be shorter than
    /// `MIN_SIZE` if the remaining tail of the file is short.
    pub fn split(&self, buffer: &[u8]) -> Vec<ChunkSpan> {
        let mut spans = Vec::new();
        let mut pos = 0usize;
        while pos < buffer.len() {
            let span = self.next_chunk(&buffer[pos..]);
            spans.push(ChunkSpan::new(pos, span.length, span.weak_fp));
            pos += span.length;
        }
        spans
    }

    /// One chunk starting at the front of `p`.
    fn next_chunk(&self, p: &[u8]) -> RawSpan {
        let n = p.len();

        if n <= MIN_SIZE {
            let mut fp = 0u64;
            for &byte in p.iter() {
                fp = (fp << 1).wrapping_add(GEAR[byte as usize]);
            }
            return RawSpan {
                length: n,
                weak_fp: fp,
            };
        }

        let n = n.min(MAX_SIZE);
        let mid = MID_SIZE.min(n);

        let mut fp = 0u64;
        let mut i = MIN_SIZE;

        while i < mid {
            fp = (fp << 1).wrapping_add(GEAR[p[i] as usize]);
            if fp & MASK_STRICT == 0 {
                return RawSpan {
                    length: i,
                    weak_fp: fp,
                };
            }
            i += 1;
        }

        while i < n {
            fp = (fp << 1).wrapping_add(GEAR[p[i] as usize]);
            if fp & MASK_LENIENT == 0 {
                return RawSpan {
                    length: i,
                    weak_fp: fp,
                };
            }
            i += 1;
        }

        RawSpan {
            length: n,
            weak_fp: fp,
        }
    }
}

struct RawSpan {
    length: usize,
    weak_fp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_buffer(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn empty_input_emits_nothing() {
        let spans = Cdc64::new().split(&[]);
        assert!(spans.is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let data = vec![0x41u8; 4096];
        let spans = Cdc64::new().split(&data);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].length, 4096);
        assert_eq!(spans[0].offset, 0);
    }

    #[test]
    fn concatenation_reconstructs_the_buffer() {
        let data = random_buffer(10 * 1024 * 1024, 42);
        let spans = Cdc64::new().split(&data);

        let mut reconstructed = Vec::with_capacity(data.len());
        for span in &spans {
            reconstructed.extend_from_slice(&data[span.offset..span.end()]);
        }
        assert_eq!(reconstructed, data);
    }

    #[test]
    fn interior_chunks_respect_size_bounds() {
        let data = random_buffer(5 * 1024 * 1024, 7);
        let spans = Cdc64::new().split(&data);

        for (idx, span) in spans.iter().enumerate() {
            if idx + 1 < spans.len() {
                assert!(span.length >= MIN_SIZE, "chunk {idx} too small: {}", span.length);
            }
            assert!(span.length <= MAX_SIZE, "chunk {idx} too large: {}", span.length);
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let data = random_buffer(2 * 1024 * 1024, 99);
        let chunker = Cdc64::new();
        let a = chunker.split(&data);
        let b = chunker.split(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn boundaries_are_stable_after_an_insertion() {
        let mut original = random_buffer(4 * 1024 * 1024, 5);
        let insertion_point = 2 * 1024 * 1024;
        let inserted: Vec<u8> = random_buffer(1024, 1234);

        let mut edited = original[..insertion_point].to_vec();
        edited.extend_from_slice(&inserted);
        edited.extend_from_slice(&original[insertion_point..]);

        let chunker = Cdc64::new();
        let spans_a = chunker.split(&original);
        let spans_b = chunker.split(&edited);

        let weak_fps_a: std::collections::HashSet<u64> =
            spans_a.iter().map(|s| s.weak_fp).collect();
        let tail_b: Vec<u64> = spans_b
            .iter()
            .rev()
            .take(4)
            .map(|s| s.weak_fp)
            .collect();

        let matches = tail_b.iter().filter(|fp| weak_fps_a.contains(fp)).count();
        assert!(
            matches >= 1,
            "expected re-synchronization to recover at least one shared trailing boundary"
        );

        original.clear();
    }

    #[test]
    fn weak_fp_is_computed_from_unsigned_byte_values() {
        let data = vec![0xFFu8; MIN_SIZE];
        let spans = Cdc64::new().split(&data);
        assert_eq!(spans.len(), 1);
        assert_ne!(spans[0].weak_fp, 0);
    }
}
