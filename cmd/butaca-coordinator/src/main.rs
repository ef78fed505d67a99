mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use pkg_constants::network::{DEFAULT_COORDINATOR_PORT, DEFAULT_STORE_URI};
use pkg_locks::LockCoordinator;
use pkg_state::mongo::MongoStore;

use api::CoordinatorState;

#[derive(Parser, Debug)]
#[command(name = "butaca-coordinator", about = "butaca lock coordinator")]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_COORDINATOR_PORT)]
    port: u16,

    /// MongoDB connection string
    #[arg(long)]
    store_uri: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // Flag > STORE_URI > MONGO_URI > default.
    let store_uri = cli
        .store_uri
        .or_else(|| std::env::var("STORE_URI").ok())
        .or_else(|| std::env::var("MONGO_URI").ok())
        .unwrap_or_else(|| DEFAULT_STORE_URI.to_string());

    info!("Starting butaca-coordinator");
    info!("  Port:  {}", cli.port);
    info!("  Store: {}", store_uri);

    let store = Arc::new(
        MongoStore::connect(&store_uri)
            .await
            .context("failed to connect to the store")?,
    );

    let coordinator = Arc::new(LockCoordinator::new(store.clone()));
    let sweeper = coordinator.start_sweeper();

    let app = api::router(CoordinatorState { coordinator });
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!("Lock coordinator listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sweeper.abort();
    store.close().await;
    info!("Coordinator stopped");

    Ok(())
}
