//! Wire messages and framing constants shared by server and client.

use serde::{Deserialize, Serialize};

/// Chunk size for streamed transfers in both directions. A policy
/// constant: correctness never depends on it, only throughput.
pub const CHUNK_SIZE: usize = 256;

/// Request header carrying the caller's remaining deadline budget in
/// milliseconds. Handlers convert it to a monotonic deadline on arrival.
pub const DEADLINE_HEADER: &str = "x-sync-deadline";

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    /// Modification time, whole seconds since the Unix epoch.
    pub mtime: i64,
}

/// Reply to a list call or a completed watch subscription. Entries appear
/// in directory-enumeration order; callers must not depend on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingResponse {
    pub files: Vec<FileInfo>,
}

/// Write-lock acquisition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    pub filename: String,
    /// Opaque non-empty id of the requesting client.
    pub cid: String,
}

/// Write-lock acquisition reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResponse {
    pub locked: bool,
}
