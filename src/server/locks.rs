//! Per-file write-lock registry.
//!
//! A single mutex over the whole filename → owner map. Critical sections
//! are O(1) map operations; long transfers hold only the logical ownership
//! recorded here, never the mutex itself.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Registry mapping each filename to the client id currently holding its
/// write lock. A missing entry means the lock is free.
#[derive(Debug, Default)]
pub struct WriteLockRegistry {
    owners: Mutex<HashMap<String, String>>,
}

impl WriteLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant the lock for `filename` to `cid` iff it is free or already
    /// owned by `cid`. Re-granting to the current owner is idempotent, so
    /// a client may request the lock more than once during a single store
    /// without deadlocking itself.
    pub fn request(&self, filename: &str, cid: &str) -> bool {
        let mut owners = self.owners.lock().expect("lock registry poisoned");
        match owners.get(filename) {
            Some(owner) if owner != cid => false,
            _ => {
                owners.insert(filename.to_string(), cid.to_string());
                true
            }
        }
    }

    /// Release the lock for `filename`, whoever holds it. Releasing a free
    /// lock is a no-op; mutating handlers call this unconditionally on
    /// every exit path.
    pub fn release(&self, filename: &str) {
        let mut owners = self.owners.lock().expect("lock registry poisoned");
        owners.remove(filename);
    }

    /// Current owner of `filename`, if any.
    pub fn owner(&self, filename: &str) -> Option<String> {
        let owners = self.owners.lock().expect("lock registry poisoned");
        owners.get(filename).cloned()
    }

    /// Hold the registry mutex across a short critical section. The delete
    /// handler removes the file and releases its lock under this guard so
    /// no grant can interleave with the removal.
    pub(crate) fn guard(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.owners.lock().expect("lock registry poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_lock_is_granted() {
        let registry = WriteLockRegistry::new();
        assert!(registry.request("a.txt", "client-1"));
        assert_eq!(registry.owner("a.txt"), Some("client-1".to_string()));
    }

    #[test]
    fn held_lock_rejects_other_clients() {
        let registry = WriteLockRegistry::new();
        assert!(registry.request("a.txt", "client-1"));
        assert!(!registry.request("a.txt", "client-2"));
        assert_eq!(registry.owner("a.txt"), Some("client-1".to_string()));
    }

    #[test]
    fn regrant_to_owner_is_idempotent() {
        let registry = WriteLockRegistry::new();
        assert!(registry.request("a.txt", "client-1"));
        assert!(registry.request("a.txt", "client-1"));
    }

    #[test]
    fn distinct_files_lock_independently() {
        let registry = WriteLockRegistry::new();
        assert!(registry.request("a.txt", "client-1"));
        assert!(registry.request("b.txt", "client-2"));
    }

    #[test]
    fn release_frees_and_is_idempotent() {
        let registry = WriteLockRegistry::new();
        assert!(registry.request("a.txt", "client-1"));
        registry.release("a.txt");
        assert_eq!(registry.owner("a.txt"), None);
        registry.release("a.txt");
        assert!(registry.request("a.txt", "client-2"));
    }

    #[test]
    fn at_most_one_owner_under_contention() {
        use std::sync::Arc;

        let registry = Arc::new(WriteLockRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.request("contended", &format!("client-{i}")))
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|granted| *granted)
            .count();

        assert_eq!(granted, 1, "exactly one requester may win the lock");
        assert!(registry.owner("contended").is_some());
    }
}
