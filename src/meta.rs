//! File metadata reading.
//!
//! [`FileStatus`] is the full per-file record the stat operation returns:
//! size, timestamps as recorded by the underlying filesystem, and the
//! content CRC computed on demand.

use crate::checksum::file_crc32;
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Server-side status of a single file, as reported by stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub filename: String,
    pub size: u64,
    /// Modification time, whole seconds since the Unix epoch.
    pub mtime: i64,
    /// Change time as the filesystem records it; mtime on platforms
    /// without a ctime.
    pub ctime: i64,
    /// CRC-32 of the file bytes.
    pub crc: u32,
}

/// Modification time in whole seconds since the Unix epoch.
pub fn unix_mtime(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
pub fn unix_ctime(meta: &Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;
    meta.ctime()
}

#[cfg(not(unix))]
pub fn unix_ctime(meta: &Metadata) -> i64 {
    unix_mtime(meta)
}

/// Read the full status record for the file at `path`.
///
/// The CRC is computed from the current bytes on every call; there is no
/// sidecar index to go stale.
pub async fn read_file_status(path: &Path, filename: &str) -> io::Result<FileStatus> {
    let meta = tokio::fs::metadata(path).await?;
    let crc = file_crc32(path).await?;
    Ok(FileStatus {
        filename: filename.to_string(),
        size: meta.len(),
        mtime: unix_mtime(&meta),
        ctime: unix_ctime(&meta),
        crc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::crc32;

    #[tokio::test]
    async fn status_reports_size_and_crc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let content = b"quarterly numbers";
        tokio::fs::write(&path, content).await.unwrap();

        let status = read_file_status(&path, "report.txt").await.unwrap();
        assert_eq!(status.filename, "report.txt");
        assert_eq!(status.size, content.len() as u64);
        assert_eq!(status.crc, crc32(content));
        assert!(status.mtime > 0);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file_status(&dir.path().join("gone"), "gone")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
