//! # dedup-chunker
//!
//! Content-defined chunking and strong hashing for the deduplicating chunk
//! store.
//!
//! - [`Cdc64`] implements the Normalized FastCDC-64 splitter, the only
//!   chunking strategy the core protocol requires.
//! - [`strong_hash`] wraps SHA-1 to compute the strong fingerprint the
//!   protocol uses to resolve weak-fingerprint collisions.

pub mod fastcdc;
mod gear_table;
pub mod strong_hash;

pub use fastcdc::{Cdc64, MAX_SIZE, MID_SIZE, MIN_SIZE};
pub use strong_hash::strong_hash;
