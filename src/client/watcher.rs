//! Mount directory watcher task.
//!
//! Watches the client's flat mount (non-recursive) with `notify`, collapses
//! event bursts with a debounce window, and emits one [`MountEvent`] per
//! settled filename. Renames become remove/modify pairs so the sync side
//! only ever sees two verbs.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Debounce window for mount events (editors write in several steps).
pub const WATCH_DEBOUNCE_MS: u64 = 200;

/// A settled local change to one file in the mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEvent {
    /// The file was created or its content changed.
    Modified(String),
    /// The file disappeared from the mount.
    Removed(String),
}

/// Extract the bare filename if `path` names a direct child of `mount`.
fn mount_child(mount: &Path, path: &Path) -> Option<String> {
    if path.parent() != Some(mount) {
        return None;
    }
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Task that watches `mount` and sends debounced [`MountEvent`]s.
///
/// Exits when the receiver is dropped; logs and keeps going on watcher
/// errors.
pub async fn mount_watcher_task(mount: PathBuf, tx: mpsc::Sender<MountEvent>) {
    let (notify_tx, mut notify_rx) = mpsc::channel::<Result<Event, notify::Error>>(100);

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = notify_tx.blocking_send(res);
        },
        Config::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("failed to create mount watcher: {e}");
            return;
        }
    };

    if let Err(e) = watcher.watch(&mount, RecursiveMode::NonRecursive) {
        error!("failed to watch mount {}: {e}", mount.display());
        return;
    }

    info!("watching mount: {}", mount.display());

    let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
    let mut pending: HashMap<String, MountEvent> = HashMap::new();
    let mut debounce_timer: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            Some(res) = notify_rx.recv() => {
                match res {
                    Ok(event) => {
                        for path in &event.paths {
                            let Some(filename) = mount_child(&mount, path) else {
                                continue;
                            };

                            let mount_event = match event.kind {
                                EventKind::Create(_) => Some(MountEvent::Modified(filename.clone())),
                                EventKind::Remove(_) => Some(MountEvent::Removed(filename.clone())),
                                EventKind::Modify(ModifyKind::Name(rename_mode)) => match rename_mode {
                                    RenameMode::From => Some(MountEvent::Removed(filename.clone())),
                                    RenameMode::To => Some(MountEvent::Modified(filename.clone())),
                                    RenameMode::Both | RenameMode::Any | RenameMode::Other => {
                                        if path.exists() {
                                            Some(MountEvent::Modified(filename.clone()))
                                        } else {
                                            Some(MountEvent::Removed(filename.clone()))
                                        }
                                    }
                                },
                                _ if event.kind.is_modify() => Some(MountEvent::Modified(filename.clone())),
                                _ => None,
                            };

                            if let Some(evt) = mount_event {
                                debug!("mount event: {evt:?}");
                                // Within the window the latest verb per file wins.
                                pending.insert(filename, evt);
                                debounce_timer = Some(tokio::time::Instant::now() + debounce);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("mount watcher error: {e}");
                    }
                }
            }
            _ = async {
                match debounce_timer {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                debounce_timer = None;
                for (_, event) in pending.drain() {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_child_accepts_direct_children_only() {
        let mount = Path::new("/data/mount");
        assert_eq!(
            mount_child(mount, Path::new("/data/mount/a.txt")),
            Some("a.txt".to_string())
        );
        assert_eq!(mount_child(mount, Path::new("/data/mount/sub/a.txt")), None);
        assert_eq!(mount_child(mount, Path::new("/elsewhere/a.txt")), None);
    }

    #[tokio::test]
    async fn writes_are_reported_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(mount_watcher_task(dir.path().to_path_buf(), tx));

        // Give the watcher time to register before mutating.
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::write(dir.path().join("note.txt"), b"hello").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event before timeout")
            .expect("watcher task ended early");
        assert_eq!(event, MountEvent::Modified("note.txt".to_string()));

        task.abort();
    }

    #[tokio::test]
    async fn removals_are_reported_as_removed() {
        let dir = tempfile::tempdir().unwrap();
        let victim = dir.path().join("victim.txt");
        std::fs::write(&victim, b"bytes").unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(mount_watcher_task(dir.path().to_path_buf(), tx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::remove_file(&victim).unwrap();

        let mut saw_removed = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
        {
            if event == MountEvent::Removed("victim.txt".to_string()) {
                saw_removed = true;
                break;
            }
        }
        assert!(saw_removed, "expected a Removed event for victim.txt");

        task.abort();
    }
}
