// Session orchestration: one task owns the coordinator and publishes snapshots.

use super::coordinator::Coordinator;
use super::types::{RegisterReply, SessionClosed, SessionCommand};
use crate::domain::{ApplicationState, ClientInfo, ClientRole};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Channel sizing for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity for inbound commands from all connections.
    pub command_channel_capacity: usize,
    /// Capacity for broadcast state snapshots.
    pub snapshot_broadcast_capacity: usize,
}

/// Channels connecting the network layer to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    /// Sender for commands into the session task.
    pub command_tx: mpsc::Sender<SessionCommand>,
    /// Broadcast sender for snapshots produced after each committed mutation.
    pub snapshot_tx: broadcast::Sender<ApplicationState>,
    /// Watch sender holding the latest snapshot.
    pub latest_tx: watch::Sender<ApplicationState>,
}

impl SessionHandle {
    /// Asks the session to register `role`; resolves once the coordinator decided.
    pub async fn register(
        &self,
        role: ClientRole,
        info: ClientInfo,
    ) -> Result<RegisterReply, SessionClosed> {
        let (reply, reply_rx) = oneshot::channel();
        self.submit(SessionCommand::Register { role, info, reply })
            .await?;
        reply_rx.await.map_err(|_| SessionClosed)
    }

    pub async fn submit(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionClosed)
    }

    /// Returns a copy of the most recently published snapshot.
    pub fn latest_snapshot(&self) -> ApplicationState {
        self.latest_tx.borrow().clone()
    }
}

/// Creates the session channels and spawns the task that owns the coordinator.
pub fn spawn_session(settings: &SessionSettings) -> SessionHandle {
    let coordinator = Coordinator::new();
    let (command_tx, command_rx) =
        mpsc::channel::<SessionCommand>(settings.command_channel_capacity);
    let (snapshot_tx, _snapshot_rx) =
        broadcast::channel::<ApplicationState>(settings.snapshot_broadcast_capacity);
    let (latest_tx, _latest_rx) = watch::channel(coordinator.snapshot());

    tokio::spawn(session_task(
        coordinator,
        command_rx,
        snapshot_tx.clone(),
        latest_tx.clone(),
    ));

    SessionHandle {
        command_tx,
        snapshot_tx,
        latest_tx,
    }
}

/// Applies commands one at a time so the coordinator never sees interleaved writers.
pub async fn session_task(
    mut coordinator: Coordinator,
    mut command_rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: broadcast::Sender<ApplicationState>,
    latest_tx: watch::Sender<ApplicationState>,
) {
    while let Some(command) = command_rx.recv().await {
        let before = coordinator.version();

        match command {
            SessionCommand::Register { role, info, reply } => {
                let device_id = info.device_id.clone();
                let outcome = coordinator.register_client(role, info);
                match &outcome {
                    Ok(version) => info!(%role, %device_id, version, "client registered"),
                    Err(e) => warn!(%role, %device_id, reason = e.reason(), "registration rejected"),
                }
                // The requester may have gone away; the registration still stands.
                if reply.send(outcome).is_err() {
                    debug!(%role, "register reply dropped");
                }
            }
            SessionCommand::Deregister { role } => {
                if let Some(version) = coordinator.deregister_client(role) {
                    info!(%role, version, "client deregistered");
                }
            }
            SessionCommand::Navigate(command) => {
                coordinator.navigation_command(command);
            }
            SessionCommand::Control(command) => {
                coordinator.control_command(command);
            }
            SessionCommand::Confirm(confirmation) => {
                coordinator.action_confirmation(confirmation);
            }
        }

        if coordinator.version() == before {
            continue;
        }

        // Publish only after the version bump so every snapshot carries its own version.
        let snapshot = coordinator.snapshot();
        debug!(
            version = snapshot.version,
            phase = ?snapshot.fsm_state,
            "state committed"
        );
        latest_tx.send_replace(snapshot.clone());
        let _ = snapshot_tx.send(snapshot);
    }

    info!("session command channel closed; session task exiting");
}
