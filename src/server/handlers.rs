//! RPC handlers for the canonical file store.
//!
//! Each handler converts the caller's deadline header into a monotonic
//! deadline on arrival and polls it at the top of short handlers and
//! between chunks of a stream. Mutating handlers release the file's write
//! lock on every exit path through a drop guard.

use super::ServerState;
use crate::messages::{
    FileInfo, ListingResponse, LockRequest, LockResponse, CHUNK_SIZE, DEADLINE_HEADER,
};
use crate::meta::{read_file_status, unix_mtime, FileStatus};
use crate::path::{resolve_in_mount, InvalidName};
use crate::server::locks::WriteLockRegistry;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Handler-level error, mapped onto the wire status codes.
pub enum ApiError {
    /// The caller's deadline expired server-side.
    DeadlineExceeded,
    /// The requested file is absent.
    NotFound,
    /// The write lock is held by another client.
    LockBusy,
    /// The filename failed mount resolution.
    BadName(String),
    /// Everything else; the client normalizes this to Cancelled.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::DeadlineExceeded => {
                (StatusCode::REQUEST_TIMEOUT, "deadline exceeded").into_response()
            }
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, "the requested file is not found").into_response()
            }
            ApiError::LockBusy => (
                StatusCode::TOO_MANY_REQUESTS,
                "write lock cannot be obtained",
            )
                .into_response(),
            ApiError::BadName(name) => {
                (StatusCode::BAD_REQUEST, format!("invalid filename: {name}")).into_response()
            }
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

impl From<InvalidName> for ApiError {
    fn from(e: InvalidName) -> Self {
        ApiError::BadName(e.0)
    }
}

/// Convert the deadline header (milliseconds of budget) into a monotonic
/// deadline. Absent or malformed headers mean no server-side deadline.
fn deadline_from(headers: &HeaderMap) -> Option<Instant> {
    let ms = headers
        .get(DEADLINE_HEADER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()?;
    Instant::now().checked_add(Duration::from_millis(ms))
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Releases a file's write lock when dropped, making release unconditional
/// at every exit of a mutating handler — success, deadline expiry,
/// mid-stream abort, or the handler future being dropped outright.
struct LockReleaser {
    locks: Arc<WriteLockRegistry>,
    filename: String,
}

impl LockReleaser {
    fn new(locks: Arc<WriteLockRegistry>, filename: String) -> Self {
        Self { locks, filename }
    }
}

impl Drop for LockReleaser {
    fn drop(&mut self) {
        self.locks.release(&self.filename);
    }
}

/// GET /files — enumerate regular files with their mtimes.
///
/// All-or-nothing: a metadata failure on any entry fails the whole call.
pub async fn list_files(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<ListingResponse>, ApiError> {
    if past(deadline_from(&headers)) {
        return Err(ApiError::DeadlineExceeded);
    }

    let entries = std::fs::read_dir(&state.mount)
        .map_err(|e| ApiError::Internal(format!("reading mount: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ApiError::Internal(format!("reading mount: {e}")))?;
        let kind = entry
            .file_type()
            .map_err(|e| ApiError::Internal(format!("reading mount: {e}")))?;
        if !kind.is_file() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| ApiError::Internal(format!("listing files: {e}")))?;
        files.push(FileInfo {
            filename: entry.file_name().to_string_lossy().into_owned(),
            mtime: unix_mtime(&meta),
        });
    }

    Ok(Json(ListingResponse { files }))
}

/// GET /stat/:filename — full status record, CRC computed on demand.
pub async fn stat_file(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FileStatus>, ApiError> {
    if past(deadline_from(&headers)) {
        return Err(ApiError::DeadlineExceeded);
    }

    let path = resolve_in_mount(&state.mount, &filename)?;
    match read_file_status(&path, &filename).await {
        Ok(status) => Ok(Json(status)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Internal(format!("stat {filename}: {e}"))),
    }
}

/// GET /files/:filename — stream the file to the caller in ≤256-byte
/// frames, checking the deadline between frames.
pub async fn fetch_file(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let deadline = deadline_from(&headers);
    if past(deadline) {
        return Err(ApiError::DeadlineExceeded);
    }

    let path = resolve_in_mount(&state.mount, &filename)?;
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return Err(ApiError::NotFound),
    };

    debug!("serving fetch of {filename}");
    let pause = state.chunk_pause;
    let stream = async_stream::stream! {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            if past(deadline) {
                yield Err(io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded"));
                break;
            }
            if let Some(pause) = pause {
                tokio::time::sleep(pause).await;
            }
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };

    Ok(Body::from_stream(stream).into_response())
}

/// POST /files/:filename — consume the streamed body into the mount.
///
/// The destination opens for truncating write before the first frame
/// lands, so a zero-frame stream still produces an empty file. On
/// cancellation mid-stream the partial file is left as-is; callers that
/// need atomicity retry. The write lock is released on every exit.
pub async fn store_file(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let path = resolve_in_mount(&state.mount, &filename)?;
    let deadline = deadline_from(&headers);
    let _release = LockReleaser::new(Arc::clone(&state.locks), filename.clone());

    if past(deadline) {
        return Err(ApiError::DeadlineExceeded);
    }

    let mut dest = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("creating {filename}: {e}")))?;

    let mut frames = body.into_data_stream();
    while let Some(frame) = frames.next().await {
        if past(deadline) {
            warn!("store of {filename} abandoned at deadline, partial file left in place");
            return Err(ApiError::DeadlineExceeded);
        }
        // A body error means the caller went away; treat it as the
        // caller's deadline firing.
        let chunk = frame.map_err(|_| ApiError::DeadlineExceeded)?;
        if let Some(pause) = state.chunk_pause {
            tokio::time::sleep(pause).await;
        }
        dest.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("writing {filename}: {e}")))?;
    }

    dest.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("writing {filename}: {e}")))?;

    info!("stored {filename}");
    state.changes.kick();
    Ok(StatusCode::OK)
}

/// DELETE /files/:filename — remove the file under the registry mutex so
/// no lock grant can interleave with the removal; release the lock on
/// success and on failure alike.
pub async fn delete_file(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let path = resolve_in_mount(&state.mount, &filename)?;
    let deadline = deadline_from(&headers);

    let removed = {
        let mut owners = state.locks.guard();
        if past(deadline) {
            owners.remove(&filename);
            return Err(ApiError::DeadlineExceeded);
        }
        let removed = std::fs::remove_file(&path);
        owners.remove(&filename);
        removed
    };

    match removed {
        Ok(()) => {
            info!("deleted {filename}");
            state.changes.kick();
            Ok(StatusCode::OK)
        }
        Err(e) => Err(ApiError::Internal(format!("deleting {filename}: {e}"))),
    }
}

/// POST /locks — grant or refuse the per-file write lock.
pub async fn request_lock(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(request): Json<LockRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    if past(deadline_from(&headers)) {
        return Err(ApiError::DeadlineExceeded);
    }
    if request.cid.is_empty() {
        return Err(ApiError::BadName(String::from("empty client id")));
    }

    if state.locks.request(&request.filename, &request.cid) {
        debug!("lock on {} granted to {}", request.filename, request.cid);
        Ok(Json(LockResponse { locked: true }))
    } else {
        debug!("lock on {} refused for {}", request.filename, request.cid);
        Err(ApiError::LockBusy)
    }
}

/// GET /watch — park the subscription; the dispatcher completes it.
///
/// Deliberately no deadline: this is the long-running notification call.
pub async fn watch_changes(
    State(state): State<ServerState>,
) -> Result<Json<ListingResponse>, ApiError> {
    let (tx, rx) = oneshot::channel();
    state.changes.park(tx);

    match rx.await {
        Ok(listing) => Ok(Json(listing)),
        Err(_) => Err(ApiError::Internal(String::from("dispatcher shut down"))),
    }
}
