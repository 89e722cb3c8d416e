//! Client side: transport, reconciliation engine, watcher, and the gate
//! that serializes the two sync triggers.

pub mod gate;
pub mod node;
pub mod transport;
pub mod watcher;

pub use gate::SyncGate;
pub use node::{ClientConfig, ClientNode, CALLBACK_RETRY_MS};
pub use watcher::{mount_watcher_task, MountEvent, WATCH_DEBOUNCE_MS};
