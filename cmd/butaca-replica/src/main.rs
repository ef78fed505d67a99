use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use pkg_api::{server::start_server, AppState};
use pkg_clock::LamportClock;
use pkg_constants::network::{DEFAULT_COORDINATOR_URL, DEFAULT_REPLICA_PORT, DEFAULT_STORE_URI};
use pkg_constants::seats::DEFAULT_SEAT_COUNT;
use pkg_mutex::{HttpTransport, PeerDirectory, RaNode};
use pkg_reservation::{CoordinatorLock, RaLock, ReservationService, SeatLock};
use pkg_state::mongo::MongoStore;
use pkg_state::SeatStore;

#[derive(Parser, Debug)]
#[command(name = "butaca-replica", about = "butaca seat-reservation replica")]
struct Cli {
    /// Replica identity, unique within the deployment
    #[arg(long, env = "SERVER_ID", default_value = "server-1")]
    server_id: String,

    /// Base URL of the lock coordinator (centralized variant)
    #[arg(long, env = "COORDINATOR_URL", default_value = DEFAULT_COORDINATOR_URL)]
    coordinator_url: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_REPLICA_PORT)]
    port: u16,

    /// MongoDB connection string
    #[arg(long)]
    store_uri: Option<String>,

    /// Peer replicas as comma-separated `id` or `id=base_url` entries.
    /// A non-empty list switches the replica to decentralized locking.
    #[arg(long, env = "PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Number of seats seeded into an empty store
    #[arg(long, env = "SEATS", default_value_t = DEFAULT_SEAT_COUNT)]
    seats: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // Flag > STORE_URI > MONGO_URI > default.
    let store_uri = cli
        .store_uri
        .clone()
        .or_else(|| std::env::var("STORE_URI").ok())
        .or_else(|| std::env::var("MONGO_URI").ok())
        .unwrap_or_else(|| DEFAULT_STORE_URI.to_string());

    info!("Starting butaca-replica {}", cli.server_id);
    info!("  Port:  {}", cli.port);
    info!("  Store: {}", store_uri);
    info!("  Seats: {}", cli.seats);

    let store = Arc::new(
        MongoStore::connect(&store_uri)
            .await
            .context("failed to connect to the store")?,
    );

    let directory = PeerDirectory::parse(&cli.peers);
    let (lock, node): (Arc<dyn SeatLock>, _) = if directory.ids().is_empty() {
        info!("  Mode:  centralized (coordinator at {})", cli.coordinator_url);
        let lock = CoordinatorLock::new(&cli.coordinator_url, &cli.server_id)
            .context("failed to build the coordinator client")?;
        (Arc::new(lock), None)
    } else {
        let clock = Arc::new(LamportClock::new());
        let transport =
            Arc::new(HttpTransport::new(directory.clone()).context("failed to build transport")?);
        let node = Arc::new(RaNode::new(
            cli.server_id.clone(),
            directory.ids(),
            clock,
            transport,
        ));
        info!("  Mode:  decentralized (peers: {:?})", node.peers());
        (Arc::new(RaLock::new(node.clone())), Some(node))
    };

    let seat_store: Arc<dyn SeatStore> = store.clone();
    let service = Arc::new(ReservationService::new(
        cli.server_id.clone(),
        seat_store,
        lock,
    ));
    service
        .seed(cli.seats)
        .await
        .context("failed to seed seats")?;

    let state = AppState { service, node };
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    start_server(addr, state).await?;

    store.close().await;
    info!("Replica {} stopped", cli.server_id);

    Ok(())
}
