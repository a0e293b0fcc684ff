//! Groundbook Sync - local gateway and background sync for the booking client.
//!
//! Serves the record cache over HTTP and WebSocket while background tasks
//! track connectivity, push pending writes and advance booking statuses.

use std::sync::Arc;

use groundbook_engine::{Clock, SystemClock};
use groundbook_sync::config::Config;
use groundbook_sync::websocket::{spawn_change_forwarder, ConnectionManager};
use groundbook_sync::{
    app, connectivity, AppState, Connectivity, ConnectivityMonitor, HttpRemote, LifecycleWorker,
    LocalStore, NetworkState, ReachabilityProbe, RemoteApi, Reservations, SyncManager,
};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "groundbook_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(remote = %config.remote_url, "Starting Groundbook Sync on {}:{}", config.host, config.port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    tracing::info!("Opening local store and running migrations...");
    let store = LocalStore::open(&config.database_url, clock.clone()).await?;

    let remote = Arc::new(HttpRemote::new(&config.remote())?);
    let initial = if remote.is_reachable().await {
        NetworkState::Online
    } else {
        NetworkState::Offline
    };
    tracing::info!(network = ?initial, "Initial connectivity");

    let sync = Arc::new(
        SyncManager::new(
            store.clone(),
            remote.clone() as Arc<dyn RemoteApi>,
            Connectivity::new(initial),
        )
        .with_parallelism(config.sync_parallelism),
    );
    let reservations = Arc::new(Reservations::new(sync.clone(), clock.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Connectivity: probe the remote periodically and sync on reconnect
    let (signal_tx, signal_rx) = mpsc::channel(16);
    let probe: Arc<dyn ReachabilityProbe> = remote.clone();
    tokio::spawn(connectivity::poll_reachability(
        probe.clone(),
        config.probe_interval,
        signal_tx,
        shutdown_rx.clone(),
    ));
    tokio::spawn(
        ConnectivityMonitor::new(sync.clone(), probe, config.stabilization)
            .run(signal_rx, shutdown_rx.clone()),
    );

    // Booking lifecycle
    tokio::spawn(
        LifecycleWorker::new(sync.clone(), clock.clone())
            .run(config.lifecycle_interval, shutdown_rx.clone()),
    );

    // Catch up on anything left from the last session
    if initial == NetworkState::Online {
        let sync = sync.clone();
        tokio::spawn(async move {
            let pulled = sync.refresh_all().await;
            tracing::info!(pulled = pulled.pulled, errors = pulled.errors, "Initial refresh done");
            sync.sync_all().await;
        });
    }

    let conn_manager = ConnectionManager::new_shared();
    spawn_change_forwarder(&store, conn_manager.clone(), shutdown_rx.clone());

    let state = AppState {
        store,
        sync,
        reservations,
        conn_manager,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
