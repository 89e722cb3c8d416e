//! Typed invocations of each server operation.
//!
//! Every call (except the open-ended watch subscription) carries the
//! caller's deadline twice: as the request timeout and as the
//! deadline-budget header the server polls. Status translation happens
//! here and nowhere else, so the rest of the client only ever sees the
//! narrow taxonomy.

use crate::messages::{
    FileInfo, ListingResponse, LockRequest, LockResponse, CHUNK_SIZE, DEADLINE_HEADER,
};
use crate::meta::FileStatus;
use crate::status::{SyncError, SyncResult};
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

fn translate_transport(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::DeadlineExceeded
    } else {
        SyncError::cancelled(e)
    }
}

fn check_status(resp: &reqwest::Response) -> SyncResult<()> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(SyncError::from_http(resp.status().as_u16()))
    }
}

fn header_ms(deadline: Duration) -> String {
    deadline.as_millis().to_string()
}

/// Fetch the server's status record for one file.
pub async fn fetch_status(
    http: &Client,
    server: &str,
    filename: &str,
    deadline: Duration,
) -> SyncResult<FileStatus> {
    let resp = http
        .get(format!("{server}/stat/{filename}"))
        .timeout(deadline)
        .header(DEADLINE_HEADER, header_ms(deadline))
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)?;
    resp.json::<FileStatus>().await.map_err(translate_transport)
}

/// Fetch the server's full file listing.
pub async fn list_files(
    http: &Client,
    server: &str,
    deadline: Duration,
) -> SyncResult<Vec<FileInfo>> {
    let resp = http
        .get(format!("{server}/files"))
        .timeout(deadline)
        .header(DEADLINE_HEADER, header_ms(deadline))
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)?;
    let listing = resp
        .json::<ListingResponse>()
        .await
        .map_err(translate_transport)?;
    Ok(listing.files)
}

/// Request the write lock for `filename` on behalf of `cid`.
///
/// `Ok(())` means granted; a refusal surfaces as [`SyncError::LockBusy`].
pub async fn request_lock(
    http: &Client,
    server: &str,
    filename: &str,
    cid: &str,
    deadline: Duration,
) -> SyncResult<()> {
    let resp = http
        .post(format!("{server}/locks"))
        .timeout(deadline)
        .header(DEADLINE_HEADER, header_ms(deadline))
        .json(&LockRequest {
            filename: filename.to_string(),
            cid: cid.to_string(),
        })
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)?;
    let reply = resp
        .json::<LockResponse>()
        .await
        .map_err(translate_transport)?;
    if reply.locked {
        Ok(())
    } else {
        Err(SyncError::LockBusy)
    }
}

/// Stream an already-open local file to the server in ≤256-byte frames.
pub async fn store_file(
    http: &Client,
    server: &str,
    filename: &str,
    source: tokio::fs::File,
    deadline: Duration,
) -> SyncResult<()> {
    let frames = ReaderStream::with_capacity(source, CHUNK_SIZE);
    let resp = http
        .post(format!("{server}/files/{filename}"))
        .timeout(deadline)
        .header(DEADLINE_HEADER, header_ms(deadline))
        .body(reqwest::Body::wrap_stream(frames))
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)
}

/// Stream a server file into `dest`, opened for truncating binary write
/// only after the server has accepted the request.
pub async fn fetch_file(
    http: &Client,
    server: &str,
    filename: &str,
    dest: &Path,
    deadline: Duration,
) -> SyncResult<()> {
    let resp = http
        .get(format!("{server}/files/{filename}"))
        .timeout(deadline)
        .header(DEADLINE_HEADER, header_ms(deadline))
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)?;

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(SyncError::cancelled)?;
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(translate_transport)?;
        file.write_all(&chunk).await.map_err(SyncError::cancelled)?;
    }
    file.flush().await.map_err(SyncError::cancelled)?;
    debug!("fetched {filename} into {}", dest.display());
    Ok(())
}

/// Delete one file on the server.
pub async fn delete_file(
    http: &Client,
    server: &str,
    filename: &str,
    deadline: Duration,
) -> SyncResult<()> {
    let resp = http
        .delete(format!("{server}/files/{filename}"))
        .timeout(deadline)
        .header(DEADLINE_HEADER, header_ms(deadline))
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)
}

/// Park a watch subscription on the server and await its completion.
///
/// Deliberately carries no deadline; the reply arrives whenever the
/// server's dispatcher next completes parked subscriptions.
pub async fn await_change_list(http: &Client, server: &str) -> SyncResult<Vec<FileInfo>> {
    let resp = http
        .get(format!("{server}/watch"))
        .send()
        .await
        .map_err(translate_transport)?;
    check_status(&resp)?;
    let listing = resp
        .json::<ListingResponse>()
        .await
        .map_err(translate_transport)?;
    Ok(listing.files)
}
