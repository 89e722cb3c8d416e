use clap::Parser;
use flatsync::cli::ServerArgs;
use flatsync::server::{create_router, ServerConfig, ServerState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let args = ServerArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flatsync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.worker_threads)
        .enable_all()
        .build()
        .expect("failed to build runtime");

    runtime.block_on(async move {
        if !args.mount.is_dir() {
            tracing::error!("mount {} is not a directory", args.mount.display());
            std::process::exit(1);
        }

        let state = ServerState::new(ServerConfig::new(args.mount.clone()));
        state.spawn_dispatcher();
        let app = create_router(state);

        let addr: SocketAddr = format!("{}:{}", args.host, args.port)
            .parse()
            .expect("invalid address");

        tracing::info!(
            "serving mount {} on {} ({} worker threads)",
            args.mount.display(),
            addr,
            args.worker_threads
        );
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });
}
