//! flatsync client binary.
//!
//! One-shot subcommands invoke a single client operation; `watch` runs the
//! full reconciliation loop: a filesystem watcher on the local mount plus
//! the server's push subscription, serialized through one gate.

use clap::Parser;
use flatsync::cli::{ClientArgs, ClientCommand};
use flatsync::client::{mount_watcher_task, MountEvent, SyncGate};
use flatsync::{ClientConfig, ClientNode, SyncError, Transfer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args = ClientArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flatsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client_id = args
        .client_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let node = Arc::new(ClientNode::new(ClientConfig {
        mount: args.mount.clone(),
        server: args.server.clone(),
        client_id,
        deadline_ms: args.deadline_ms,
    }));

    let outcome = match &args.command {
        ClientCommand::Store { filename } => report_transfer("store", node.store(filename).await),
        ClientCommand::Fetch { filename } => report_transfer("fetch", node.fetch(filename).await),
        ClientCommand::Delete { filename } => match node.delete(filename).await {
            Ok(()) => {
                println!("deleted {filename}");
                Ok(())
            }
            Err(e) => Err(e),
        },
        ClientCommand::Stat { filename } => match node.stat(filename).await {
            Ok(status) => {
                println!("filename: {}", status.filename);
                println!("size: {}", status.size);
                println!("mtime: {}", status.mtime);
                println!("ctime: {}", status.ctime);
                println!("crc: {:#010x}", status.crc);
                Ok(())
            }
            Err(e) => Err(e),
        },
        ClientCommand::List => match node.list().await {
            Ok(files) => {
                for (filename, mtime) in files {
                    println!("filename: {filename}, mtime: {mtime}");
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        ClientCommand::Watch => {
            run_watch(node).await;
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn report_transfer(verb: &str, result: Result<Transfer, SyncError>) -> Result<(), SyncError> {
    match result? {
        Transfer::Completed => println!("{verb} completed"),
        Transfer::AlreadyInSync => println!("already in sync, mtime aligned"),
    }
    Ok(())
}

/// Run the dual-trigger reconciliation loop until interrupted.
async fn run_watch(node: Arc<ClientNode>) {
    let gate = Arc::new(SyncGate::new());

    let (events_tx, mut events_rx) = mpsc::channel::<MountEvent>(100);
    let watcher = tokio::spawn(mount_watcher_task(
        node.mount().to_path_buf(),
        events_tx,
    ));

    let callback = tokio::spawn(Arc::clone(&node).run_callback_loop(Arc::clone(&gate)));

    info!("reconciliation loop running; ctrl-c to stop");
    while let Some(event) = events_rx.recv().await {
        match event {
            MountEvent::Modified(filename) => {
                gate.run(|| async {
                    if let Err(e) = node.store(&filename).await {
                        warn!("store of {filename} failed: {e}");
                    }
                })
                .await;
            }
            MountEvent::Removed(filename) => {
                gate.run(|| async {
                    if let Err(e) = node.delete(&filename).await {
                        warn!("delete of {filename} failed: {e}");
                    }
                })
                .await;
            }
        }
    }

    watcher.abort();
    callback.abort();
}
