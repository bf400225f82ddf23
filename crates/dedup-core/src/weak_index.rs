//! Client-side weak-fingerprint index.
//!
//! Built once per advertised list per protocol round from the
//! `(weak_fp, node_id)` records a node sends back in Phase A. Multiple
//! entries per key are legal: two nodes (or two distinct chunks) can claim
//! the same weak fingerprint, and the protocol resolves the ambiguity with
//! SHA-1, not here.

use std::collections::HashMap;

/// One `(weak_fp, node_id)` record as advertised by a node or announced by
/// a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FpRecord {
    pub weak_fp: u64,
    pub node_id: i32,
}

impl FpRecord {
    pub fn new(weak_fp: u64, node_id: i32) -> Self {
        Self { weak_fp, node_id }
    }
}

/// Hash map from weak fingerprint to the node ids that claim it.
#[derive(Clone, Debug, Default)]
pub struct WeakIndex {
    buckets: HashMap<u64, Vec<i32>>,
}

impl WeakIndex {
    /// Build an index from a list of advertised records in expected
    /// linear time.
    pub fn build(records: &[FpRecord]) -> Self {
        let mut buckets: HashMap<u64, Vec<i32>> = HashMap::with_capacity(records.len());
        for rec in records {
            buckets.entry(rec.weak_fp).or_default().push(rec.node_id);
        }
        Self { buckets }
    }

    /// Node ids that advertised this weak fingerprint, if any.
    pub fn node_ids_for(&self, weak_fp: u64) -> &[i32] {
        self.buckets.get(&weak_fp).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, weak_fp: u64) -> bool {
        self.buckets.contains_key(&weak_fp)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
