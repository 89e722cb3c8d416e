use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for flatsync-server
#[derive(Parser, Debug)]
#[clap(name = "flatsync-server")]
#[clap(about = "Canonical file store for a flat sync mount", long_about = None)]
pub struct ServerArgs {
    /// Directory holding the canonical copy of every file
    #[clap(short, long, value_name = "DIR")]
    pub mount: PathBuf,

    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[clap(short, long, default_value = "4310")]
    pub port: u16,

    /// Number of runtime worker threads handling requests
    #[clap(long, default_value = "4", value_name = "N")]
    pub worker_threads: usize,
}

/// CLI arguments for flatsync (the client)
#[derive(Parser, Debug)]
#[clap(name = "flatsync")]
#[clap(about = "Keep a local mount directory coherent with a flatsync server", long_about = None)]
pub struct ClientArgs {
    /// Local mount directory
    #[clap(short, long, value_name = "DIR")]
    pub mount: PathBuf,

    /// Server base URL (e.g., http://127.0.0.1:4310)
    #[clap(short, long, value_name = "URL")]
    pub server: String,

    /// Client id presented in lock requests (defaults to a generated UUID)
    #[clap(long, value_name = "ID")]
    pub client_id: Option<String>,

    /// Per-call deadline in milliseconds
    #[clap(long, default_value = "5000", value_name = "MS")]
    pub deadline_ms: u64,

    #[clap(subcommand)]
    pub command: ClientCommand,
}

#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Upload one file to the server
    Store { filename: String },
    /// Download one file from the server
    Fetch { filename: String },
    /// Delete one file on the server
    Delete { filename: String },
    /// List the files the server holds
    List,
    /// Show the server's status record for one file
    Stat { filename: String },
    /// Run the reconciliation loop (filesystem watcher + server push)
    Watch,
}
