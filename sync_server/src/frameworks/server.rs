// Framework bootstrap for the sync server runtime.

use crate::frameworks::config;
use crate::interface_adapters::http::not_found;
use crate::interface_adapters::net::{
    encode_snapshot, health_handler, spawn_snapshot_serializer, state_handler, ws_handler,
};
use crate::interface_adapters::state::{AppState, SnapshotFrame};
use crate::interface_adapters::utils::clock::SystemClock;
use crate::use_cases::{SessionSettings, spawn_session};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{broadcast, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/state", get(state_handler))
        .route("/health", get(health_handler))
        .fallback(not_found)
        .with_state(state)
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // One session per process: a single TV paired with a single Remote.
    let state = build_state()?;
    let app = router(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_host(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Result<Arc<AppState>> {
    // The session task is the only writer of shared state.
    let session = spawn_session(&SessionSettings {
        command_channel_capacity: config::COMMAND_CHANNEL_CAPACITY,
        snapshot_broadcast_capacity: config::SNAPSHOT_BROADCAST_CAPACITY,
    });
    let clock = Arc::new(SystemClock);

    // Seed the latest frame so late joiners always have a snapshot to start from.
    let initial = encode_snapshot(&session.latest_snapshot(), clock.as_ref())
        .map_err(|e| std::io::Error::other(format!("failed to encode initial snapshot: {e}")))?;
    let (frames_tx, _frames_rx) =
        broadcast::channel::<SnapshotFrame>(config::SNAPSHOT_BROADCAST_CAPACITY);
    let (frame_latest_tx, _frame_latest_rx) = watch::channel(initial);
    tracing::debug!(
        version = session.latest_snapshot().version,
        "session initialized"
    );

    let state = Arc::new(AppState {
        session,
        frames_tx,
        frame_latest_tx,
        clock,
    });
    spawn_snapshot_serializer(&state);
    Ok(state)
}
