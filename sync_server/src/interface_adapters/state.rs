use crate::domain::ports::Clock;
use crate::use_cases::SessionHandle;
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// A `state_sync` envelope encoded once and shared by every connection.
#[derive(Debug, Clone)]
pub struct SnapshotFrame {
    // Version of the snapshot inside `bytes`.
    pub version: u64,
    pub bytes: Utf8Bytes,
}

#[derive(Clone)]
pub struct AppState {
    // Command/snapshot channels of the single TV/Remote session.
    pub session: SessionHandle,
    // Serialized snapshots, shared across all connections.
    pub frames_tx: broadcast::Sender<SnapshotFrame>,
    // Latest serialized snapshot for lag recovery and late joiners.
    pub frame_latest_tx: watch::Sender<SnapshotFrame>,
    // Time source for outbound envelope timestamps.
    pub clock: Arc<dyn Clock>,
}
