//! Serialization between the two producers of sync work.
//!
//! The filesystem watcher and the server-push callback loop both mutate
//! the local mount; this mediator owns the one mutex that keeps their work
//! from interleaving. Each side is handed the gate and runs its handler
//! inside [`SyncGate::run`]; neither knows the other exists.

use tokio::sync::Mutex;

/// The watcher-handle mutex, as an explicit mediator.
#[derive(Default)]
pub struct SyncGate {
    inner: Mutex<()>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` while holding the gate. Held across the whole handler
    /// body, including every transfer it performs.
    pub async fn run<F, Fut>(&self, work: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future,
    {
        let _guard = self.inner.lock().await;
        work().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn handlers_never_overlap() {
        let gate = Arc::new(SyncGate::new());
        let inside = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            tasks.push(tokio::spawn(async move {
                gate.run(|| async {
                    if inside.swap(true, Ordering::SeqCst) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.store(false, Ordering::SeqCst);
                })
                .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_returns_the_handler_output() {
        let gate = SyncGate::new();
        let value = gate.run(|| async { 7 }).await;
        assert_eq!(value, 7);
    }
}
