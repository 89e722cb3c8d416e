//! Client reconciliation engine.
//!
//! [`ClientNode`] exposes the five user operations (store, fetch, delete,
//! list, stat) and the callback loop that keeps the local mount coherent
//! with the server. Transfer decisions follow the CRC/mtime tables: equal
//! content is never re-sent, only mtimes are aligned.

use crate::checksum::file_crc32;
use crate::client::gate::SyncGate;
use crate::client::transport;
use crate::messages::FileInfo;
use crate::meta::{unix_mtime, FileStatus};
use crate::path::resolve_in_mount;
use crate::status::{SyncError, SyncResult, Transfer};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Backoff before re-arming the watch subscription after a failed
/// completion. Fixed in source; the subscription loop is the only place
/// the client retries anything.
pub const CALLBACK_RETRY_MS: u64 = 3000;

/// Client construction parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mount: PathBuf,
    pub server: String,
    /// Opaque non-empty id presented in lock requests.
    pub client_id: String,
    pub deadline_ms: u64,
}

/// One client instance bound to a local mount and a server.
pub struct ClientNode {
    http: reqwest::Client,
    server: String,
    mount: PathBuf,
    client_id: String,
    deadline: Duration,
}

impl ClientNode {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: config.server.trim_end_matches('/').to_string(),
            mount: config.mount,
            client_id: config.client_id,
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }

    fn local_path(&self, filename: &str) -> SyncResult<PathBuf> {
        resolve_in_mount(&self.mount, filename).map_err(SyncError::cancelled)
    }

    /// Server status record for one file.
    pub async fn stat(&self, filename: &str) -> SyncResult<FileStatus> {
        self.local_path(filename)?;
        transport::fetch_status(&self.http, &self.server, filename, self.deadline).await
    }

    /// Server file listing as filename → mtime.
    pub async fn list(&self) -> SyncResult<BTreeMap<String, i64>> {
        let files = transport::list_files(&self.http, &self.server, self.deadline).await?;
        Ok(files.into_iter().map(|f| (f.filename, f.mtime)).collect())
    }

    /// Upload the local copy of `filename` unless the server already holds
    /// identical content, in which case only the local mtime is aligned.
    pub async fn store(&self, filename: &str) -> SyncResult<Transfer> {
        let path = self.local_path(filename)?;

        match transport::fetch_status(&self.http, &self.server, filename, self.deadline).await {
            Ok(status) => {
                let local_crc = file_crc32(&path).await.ok();
                if local_crc == Some(status.crc) {
                    align_mtime(&path, status.mtime).map_err(SyncError::cancelled)?;
                    debug!("{filename} matches the server, aligned mtime to {}", status.mtime);
                    return Ok(Transfer::AlreadyInSync);
                }
                self.push(filename, &path).await?;
                Ok(Transfer::Completed)
            }
            // Absent on the server: the store will create it.
            Err(SyncError::NotFound) => {
                self.push(filename, &path).await?;
                Ok(Transfer::Completed)
            }
            Err(e) => Err(e),
        }
    }

    /// Acquire the write lock, then stream the local file up.
    ///
    /// The local source opens before the lock request: a missing local
    /// file must fail without stranding a server-side lock that no
    /// mutation would ever release.
    async fn push(&self, filename: &str, path: &Path) -> SyncResult<()> {
        let source = tokio::fs::File::open(path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SyncError::NotFound
            } else {
                SyncError::cancelled(e)
            }
        })?;

        transport::request_lock(
            &self.http,
            &self.server,
            filename,
            &self.client_id,
            self.deadline,
        )
        .await?;

        info!("storing {filename}");
        transport::store_file(&self.http, &self.server, filename, source, self.deadline).await
    }

    /// Download `filename` unless the local copy already holds identical
    /// content, in which case only the local mtime is aligned.
    pub async fn fetch(&self, filename: &str) -> SyncResult<Transfer> {
        let path = self.local_path(filename)?;
        let status =
            transport::fetch_status(&self.http, &self.server, filename, self.deadline).await?;

        let local_crc = file_crc32(&path).await.ok();
        if local_crc == Some(status.crc) {
            align_mtime(&path, status.mtime).map_err(SyncError::cancelled)?;
            debug!("{filename} matches the server, aligned mtime to {}", status.mtime);
            return Ok(Transfer::AlreadyInSync);
        }

        info!("fetching {filename}");
        transport::fetch_file(&self.http, &self.server, filename, &path, self.deadline).await?;
        Ok(Transfer::Completed)
    }

    /// Acquire the write lock, then delete `filename` on the server.
    pub async fn delete(&self, filename: &str) -> SyncResult<()> {
        self.local_path(filename)?;
        transport::request_lock(
            &self.http,
            &self.server,
            filename,
            &self.client_id,
            self.deadline,
        )
        .await?;

        info!("deleting {filename}");
        transport::delete_file(&self.http, &self.server, filename, self.deadline).await
    }

    /// One reconciliation pass over a pushed listing.
    ///
    /// Per entry: absent locally → fetch; local mtime newer → store;
    /// server mtime newer → fetch; equal → nothing. Individual failures
    /// are logged and do not stop the pass.
    pub async fn reconcile(&self, files: &[FileInfo]) {
        for info in files {
            let path = match self.local_path(&info.filename) {
                Ok(path) => path,
                Err(e) => {
                    warn!("skipping pushed entry: {e}");
                    continue;
                }
            };

            match std::fs::metadata(&path) {
                Ok(meta) => {
                    let local_mtime = unix_mtime(&meta);
                    if local_mtime > info.mtime {
                        debug!("local {} is newer, storing", info.filename);
                        if let Err(e) = self.store(&info.filename).await {
                            warn!("store of {} failed: {e}", info.filename);
                        }
                    } else if local_mtime < info.mtime {
                        debug!("server {} is newer, fetching", info.filename);
                        if let Err(e) = self.fetch(&info.filename).await {
                            warn!("fetch of {} failed: {e}", info.filename);
                        }
                    }
                }
                Err(_) => {
                    debug!("{} absent locally, fetching", info.filename);
                    if let Err(e) = self.fetch(&info.filename).await {
                        warn!("fetch of {} failed: {e}", info.filename);
                    }
                }
            }
        }
    }

    /// The server-push half of the reconciliation loop.
    ///
    /// Parks a watch subscription, and on each completion runs one
    /// reconcile pass under the gate so it cannot interleave with
    /// watcher-driven operations. On a failed completion, sleeps
    /// [`CALLBACK_RETRY_MS`] and re-arms.
    pub async fn run_callback_loop(self: Arc<Self>, gate: Arc<SyncGate>) {
        loop {
            match transport::await_change_list(&self.http, &self.server).await {
                Ok(files) => {
                    gate.run(|| async {
                        self.reconcile(&files).await;
                    })
                    .await;
                }
                Err(e) => {
                    warn!("watch subscription failed: {e}; retrying in {CALLBACK_RETRY_MS} ms");
                    tokio::time::sleep(Duration::from_millis(CALLBACK_RETRY_MS)).await;
                }
            }
        }
    }
}

/// Set a file's mtime to the server-reported value so subsequent
/// comparisons agree.
fn align_mtime(path: &Path, mtime: i64) -> io::Result<()> {
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    let target = UNIX_EPOCH + Duration::from_secs(mtime.max(0) as u64);
    file.set_modified(target)
}
