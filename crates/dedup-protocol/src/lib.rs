//! # dedup-protocol
//!
//! Wire framing for the three-phase deduplication protocol between the
//! client orchestrator and a storage node.
//!
//! [`io`] provides the primitive, fully-drained send/receive building
//! blocks. [`messages`] composes them into the Announce/Verify/Ingest phase
//! messages so the node and client binaries never hand-roll framing.

pub mod io;
pub mod messages;

pub use messages::{
    discard_file_content, recv_announce_header, recv_digests, recv_fp_list, recv_uploads,
    recv_weak_fp_set, send_announce, send_digests, send_fp_list, send_match_candidates,
    send_uploads, send_weak_fp_set, UploadRecord, DIGEST_SIZE, MAX_FILENAME_LEN,
    MAX_RECORD_COUNT, MAX_UPLOAD_CHUNK_SIZE, SOCKET_TIMEOUT,
};
