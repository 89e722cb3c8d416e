//! Content fingerprinting.
//!
//! Change detection compares a CRC-32 over the full file bytes (reflected
//! polynomial 0xEDB88320, init and xor-out 0xFFFFFFFF — the crc32fast
//! default). Equal checksums mean equal content for sync purposes.

use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// CRC-32 of an in-memory byte slice.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// CRC-32 over the full contents of a file.
///
/// Reads in buffered chunks so large files never sit in memory whole.
/// A missing file surfaces as `io::ErrorKind::NotFound`; callers decide
/// whether that means "no match" or a hard error.
pub async fn file_crc32(path: &Path) -> io::Result<u32> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; 8192];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn standard_check_vector() {
        // The canonical CRC-32 check value for "123456789".
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[tokio::test]
    async fn file_crc_matches_slice_crc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let content = b"some file content that spans\nmultiple lines\n";
        tokio::fs::write(&path, content).await.unwrap();

        assert_eq!(file_crc32(&path).await.unwrap(), crc32(content));
    }

    #[tokio::test]
    async fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_crc32(&dir.path().join("absent")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
