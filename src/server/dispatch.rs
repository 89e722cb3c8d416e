//! Push-notification dispatcher.
//!
//! Clients subscribe by issuing a long-running watch call. The handler
//! never answers inline: it parks a reply slot in the pending vector and
//! signals the dispatcher. A dedicated dispatcher task drains the vector,
//! synthesizes one current directory listing, and completes every parked
//! subscription with it. Mutating handlers signal the same dispatcher after
//! they finish, so parked clients learn about changes promptly.

use crate::messages::{FileInfo, ListingResponse};
use crate::meta::unix_mtime;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

/// A parked watch subscription: the reply slot its handler is awaiting.
struct PendingWatch {
    reply: oneshot::Sender<ListingResponse>,
}

/// Pending-subscription registry plus the dispatcher's wakeup signal.
#[derive(Default)]
pub struct ChangeDispatcher {
    pending: Mutex<Vec<PendingWatch>>,
    wake: Notify,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a subscription and wake the dispatcher. Called by the watch
    /// handler, which then awaits the receiving half.
    pub fn park(&self, reply: oneshot::Sender<ListingResponse>) {
        self.pending
            .lock()
            .expect("pending subscriptions poisoned")
            .push(PendingWatch { reply });
        self.wake.notify_one();
    }

    /// Wake the dispatcher without parking anything. Mutating handlers call
    /// this after a store or delete completes.
    pub fn kick(&self) {
        self.wake.notify_one();
    }

    fn drain(&self) -> Vec<PendingWatch> {
        let mut pending = self
            .pending
            .lock()
            .expect("pending subscriptions poisoned");
        std::mem::take(&mut *pending)
    }

    /// Dispatcher loop. Runs until the process exits: waits for a signal,
    /// drains the pending vector, and completes each parked subscription
    /// with a freshly synthesized listing.
    pub async fn run(&self, mount: PathBuf) {
        loop {
            self.wake.notified().await;

            let parked = self.drain();
            if parked.is_empty() {
                continue;
            }

            let listing = scan_listing(&mount);
            debug!(
                subscriptions = parked.len(),
                files = listing.files.len(),
                "completing parked watch subscriptions"
            );
            for watch in parked {
                // The handler may have given up (client disconnect);
                // a dead slot is not an error.
                let _ = watch.reply.send(listing.clone());
            }
        }
    }
}

/// Enumerate the regular files in `mount` with their mtimes.
///
/// Entries whose metadata cannot be read are still listed with mtime 0;
/// the push path tolerates racing with a concurrent writer.
pub fn scan_listing(mount: &Path) -> ListingResponse {
    let mut files = Vec::new();
    let entries = match std::fs::read_dir(mount) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to read mount {}: {}", mount.display(), e);
            return ListingResponse::default();
        }
    };

    for entry in entries.flatten() {
        let is_file = entry
            .file_type()
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        let mtime = entry.metadata().map(|meta| unix_mtime(&meta)).unwrap_or(0);
        files.push(FileInfo { filename, mtime });
    }
    ListingResponse { files }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn parked_subscription_completes_with_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("seen.txt"), b"payload").unwrap();

        let dispatcher = Arc::new(ChangeDispatcher::new());
        let mount = dir.path().to_path_buf();
        let runner = Arc::clone(&dispatcher);
        let task = tokio::spawn(async move { runner.run(mount).await });

        let (tx, rx) = oneshot::channel();
        dispatcher.park(tx);

        let listing = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("dispatcher did not complete the subscription")
            .unwrap();
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].filename, "seen.txt");

        task.abort();
    }

    #[tokio::test]
    async fn kick_completes_subscriptions_parked_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(ChangeDispatcher::new());

        // Park before the dispatcher task exists; the permit is retained.
        let (tx, rx) = oneshot::channel();
        dispatcher.park(tx);

        let mount = dir.path().to_path_buf();
        let runner = Arc::clone(&dispatcher);
        let task = tokio::spawn(async move { runner.run(mount).await });
        dispatcher.kick();

        let listing = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("dispatcher did not complete the subscription")
            .unwrap();
        assert!(listing.files.is_empty());

        task.abort();
    }

    #[test]
    fn scan_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let listing = scan_listing(dir.path());
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].filename, "file.txt");
    }
}
