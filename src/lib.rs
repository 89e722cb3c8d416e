pub mod checksum;
pub mod cli;
pub mod client;
pub mod messages;
pub mod meta;
pub mod path;
pub mod server;
pub mod status;

pub use client::{ClientConfig, ClientNode, SyncGate};
pub use server::{create_router, ServerConfig, ServerState};
pub use status::{SyncError, SyncResult, Transfer};
