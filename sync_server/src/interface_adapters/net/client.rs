use crate::domain::ports::Clock;
use crate::domain::{ApplicationState, ClientRole, NavigationCommand, VersionGate};
use crate::interface_adapters::protocol::{
    ALREADY_REGISTERED, AckPayload, Envelope, HeartbeatPayload, INVALID_MESSAGE, Message,
    MessageSource, MessageType, REGISTRATION_REJECTED, RegisterPayload, StateSyncPayload,
    UNSUPPORTED_MESSAGE,
};
use crate::interface_adapters::state::{AppState, SnapshotFrame};
use crate::use_cases::{SessionClosed, SessionCommand, SessionHandle};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures_util::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    SessionClosed,
    SnapshotsClosed,
    SnapshotSend,
    RegisterRequired,
    RegisterTimeout,
    RegistrationRejected,
    ClosedBeforeRegister,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

impl From<SessionClosed> for NetError {
    fn from(_: SessionClosed) -> Self {
        NetError::SessionClosed
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_MESSAGES: u32 = 10;
const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Encodes a snapshot as a server `state_sync` envelope.
pub fn encode_snapshot(
    snapshot: &ApplicationState,
    clock: &dyn Clock,
) -> Result<SnapshotFrame, serde_json::Error> {
    let envelope = Envelope::from_server(
        clock.now_epoch_millis(),
        Message::StateSync(StateSyncPayload::from(snapshot)),
    );
    Ok(SnapshotFrame {
        version: snapshot.version,
        bytes: Utf8Bytes::from(envelope.encode()?),
    })
}

pub async fn snapshot_serializer(
    mut snapshot_rx: broadcast::Receiver<ApplicationState>,
    frames_tx: broadcast::Sender<SnapshotFrame>,
    frame_latest_tx: watch::Sender<SnapshotFrame>,
    clock: Arc<dyn Clock>,
) {
    // Serialize each snapshot once and broadcast the shared bytes.
    loop {
        match snapshot_rx.recv().await {
            Ok(snapshot) => {
                let frame = match encode_snapshot(&snapshot, clock.as_ref()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!(error = ?e, version = snapshot.version, "failed to serialize snapshot");
                        continue;
                    }
                };

                // Store the latest frame for lag recovery.
                let _ = frame_latest_tx.send(frame.clone());
                let _ = frames_tx.send(frame);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "snapshot serializer lagged; skipping to latest snapshot");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("snapshot channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_snapshot_serializer(state: &AppState) {
    tokio::spawn(snapshot_serializer(
        state.session.snapshot_tx.subscribe(),
        state.frames_tx.clone(),
        state.frame_latest_tx.clone(),
        state.clock.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Connection id for correlating logs before/after a role exists.
    let conn_id = Uuid::new_v4();
    let span = info_span!("conn", %conn_id, role = tracing::field::Empty);

    async move {
        let mut ctx = match bootstrap_connection(&mut socket, &state).await {
            Ok(ctx) => ctx,
            Err(NetError::ClosedBeforeRegister) => {
                info!("client disconnected before register handshake");
                return;
            }
            Err(NetError::RegistrationRejected) => {
                info!("registration rejected; connection closed");
                return;
            }
            Err(e) => {
                error!(error = ?e, "failed to bootstrap connection");
                let _ = send_close_with_reason(&mut socket, close_code::POLICY, "bootstrap failed")
                    .await;
                return;
            }
        };

        tracing::Span::current().record("role", ctx.role.as_str());
        info!(
            role = %ctx.role,
            device_id = %ctx.device_id,
            "client connected"
        );

        // Main Client Loop
        if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
            warn!(error = ?e, "client loop exited with error");
        }
    }
    .instrument(span)
    .await
}

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<usize, NetError> {
    let txt = envelope.encode().map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(WsMessage::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub role: ClientRole,
    pub device_id: String,
    pub session: SessionHandle,
    pub clock: Arc<dyn Clock>,
    pub frames_rx: broadcast::Receiver<SnapshotFrame>,
    pub frame_latest_rx: watch::Receiver<SnapshotFrame>,
    // Keeps outbound snapshots strictly increasing on this connection.
    pub gate: VersionGate,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_messages: u32,

    pub last_snapshot_lag_log: Instant,
    pub last_invalid_message_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn server_envelope(&self, message: Message) -> Envelope {
        Envelope::from_server(self.clock.now_epoch_millis(), message)
    }
}

#[derive(Debug)]
struct RegisterHandshake {
    payload: RegisterPayload,
    bytes_in: u64,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    // Subscribe to snapshots *before* registering so the registration snapshot is not missed.
    let frames_rx = state.frames_tx.subscribe();
    let frame_latest_rx = state.frame_latest_tx.subscribe();

    let handshake = match timeout(REGISTER_TIMEOUT, read_register_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "register timeout").await;
            return Err(NetError::RegisterTimeout);
        }
    };

    let (role, client_info) = handshake.payload.into_parts();
    let device_id = client_info.device_id.clone();

    // The session task decides; concurrent registrations for one role are serialized there.
    if let Err(rejected) = state.session.register(role, client_info).await? {
        let envelope = Envelope::from_server(
            state.clock.now_epoch_millis(),
            Message::error(REGISTRATION_REJECTED, rejected.reason()),
        );
        let _ = send_envelope(socket, &envelope).await;
        let _ = send_close_with_reason(socket, close_code::POLICY, "registration rejected").await;
        return Err(NetError::RegistrationRejected);
    }

    let now = Instant::now() - LOG_THROTTLE;
    let mut ctx = ConnCtx {
        role,
        device_id,
        session: state.session.clone(),
        clock: state.clock.clone(),
        frames_rx,
        frame_latest_rx,
        gate: VersionGate::new(),
        lag_recovery_count: 0,

        msgs_in: 1,
        msgs_out: 0,
        bytes_in: handshake.bytes_in,
        bytes_out: 0,

        invalid_messages: 0,

        last_snapshot_lag_log: now,
        last_invalid_message_log: now,

        close_frame: None,
    };

    if let Err(e) = send_handshake_replies(socket, &mut ctx).await {
        // Release the role if the handshake could not be completed.
        state
            .session
            .submit(SessionCommand::Deregister { role })
            .await?;
        return Err(e);
    }

    Ok(ctx)
}

// Confirms the role, then sends the latest state the client has not seen yet.
async fn send_handshake_replies(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let ack = ctx.server_envelope(Message::Ack(AckPayload::of(MessageType::Register)));
    let bytes = send_envelope(socket, &ack).await?;
    ctx.msgs_out += 1;
    ctx.bytes_out += bytes as u64;

    let latest = ctx.frame_latest_rx.borrow().clone();
    match forward_frame(latest, socket, ctx).await {
        LoopControl::Continue => Ok(()),
        LoopControl::Disconnect => Err(NetError::SnapshotSend),
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(WsMessage::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_register_handshake(socket: &mut WebSocket) -> Result<RegisterHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeRegister);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            WsMessage::Text(text) => {
                let bytes_in = text.len() as u64;
                return match Envelope::decode(&text) {
                    Ok(Envelope {
                        message: Message::Register(payload),
                        ..
                    }) => Ok(RegisterHandshake { payload, bytes_in }),
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "register required")
                            .await;
                        Err(NetError::RegisterRequired)
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid register payload",
                        )
                        .await;
                        Err(NetError::RegisterRequired)
                    }
                };
            }
            WsMessage::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::RegisterRequired);
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => return Err(NetError::ClosedBeforeRegister),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(socket, incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing Snapshot
            frame = ctx.frames_rx.recv() => {
                match frame {
                    Ok(frame) => matches!(
                        forward_frame(frame, socket, ctx).await,
                        LoopControl::Disconnect
                    ),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut ctx.last_snapshot_lag_log) {
                            warn!(missed = n, "snapshots lagged; sending latest");
                        }

                        // Resync strategy: send the latest snapshot.
                        let latest = ctx.frame_latest_rx.borrow().clone();
                        ctx.lag_recovery_count += 1;
                        matches!(
                            forward_frame(latest, socket, ctx).await,
                            LoopControl::Disconnect
                        )
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::SnapshotsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(WsMessage::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    incoming: Option<Result<WsMessage, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            WsMessage::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match Envelope::decode(&text) {
                    Ok(envelope) => handle_envelope(socket, envelope, ctx).await,
                    Err(parse_err) => {
                        reject_invalid(socket, ctx, parse_err.to_string(), text.len()).await
                    }
                }
            }
            WsMessage::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(LoopControl::Continue),
            WsMessage::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(role = %ctx.role, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(role = %ctx.role, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

// Routes one decoded envelope; only command messages reach the session.
async fn handle_envelope(
    socket: &mut WebSocket,
    envelope: Envelope,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    if envelope.source != MessageSource::from(ctx.role) {
        debug!(role = %ctx.role, source = ?envelope.source, "envelope source differs from registered role");
    }

    let message_type = envelope.message.message_type();
    let command = match envelope.message {
        Message::NavigationCommand(payload) => match NavigationCommand::try_from(payload) {
            Ok(command) => SessionCommand::Navigate(command),
            Err(e) => return reject_invalid(socket, ctx, e.to_string(), 0).await,
        },
        Message::ControlCommand(payload) => SessionCommand::Control(payload.into()),
        Message::ActionConfirmation(payload) => SessionCommand::Confirm(payload.into()),
        Message::Heartbeat(_) => {
            let reply = ctx.server_envelope(Message::Heartbeat(Some(HeartbeatPayload::default())));
            return Ok(reply_to_client(socket, ctx, &reply).await);
        }
        Message::Ack(_) | Message::Data(_) => {
            debug!(role = %ctx.role, ?message_type, "ignoring informational message");
            return Ok(LoopControl::Continue);
        }
        Message::Register(_) => {
            let reply = ctx.server_envelope(Message::error(
                ALREADY_REGISTERED,
                format!("connection is already registered as {}", ctx.role),
            ));
            return Ok(reply_to_client(socket, ctx, &reply).await);
        }
        Message::StateSync(_) | Message::Error(_) => {
            let reply = ctx.server_envelope(Message::error(
                UNSUPPORTED_MESSAGE,
                format!("{message_type:?} is sent by the server only"),
            ));
            return Ok(reply_to_client(socket, ctx, &reply).await);
        }
    };

    // Commands must not be dropped; wait for room in the session queue.
    ctx.session.submit(command).await?;
    Ok(LoopControl::Continue)
}

// Sends an `error` back to the offending client only; shared state is untouched.
async fn reject_invalid(
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
    reason: String,
    bytes: usize,
) -> Result<LoopControl, NetError> {
    ctx.invalid_messages += 1;
    if should_log(&mut ctx.last_invalid_message_log) {
        warn!(role = %ctx.role, bytes, error = %reason, "rejected client message");
    }

    if ctx.invalid_messages > MAX_INVALID_MESSAGES {
        ctx.close_frame = Some(CloseFrame {
            code: close_code::POLICY,
            reason: "too many invalid messages".into(),
        });
        return Ok(LoopControl::Disconnect);
    }

    let reply = ctx.server_envelope(Message::error(INVALID_MESSAGE, reason));
    Ok(reply_to_client(socket, ctx, &reply).await)
}

async fn reply_to_client(
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
    envelope: &Envelope,
) -> LoopControl {
    match send_envelope(socket, envelope).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send reply");
            LoopControl::Disconnect
        }
    }
}

async fn forward_frame(
    frame: SnapshotFrame,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> LoopControl {
    // Stale or repeated frames are skipped.
    if !ctx.gate.accept(frame.version) {
        return LoopControl::Continue;
    }

    let bytes_len = frame.bytes.len();
    match socket
        .send(WsMessage::Text(frame.bytes))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send snapshot");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    // Losing either device resets the session; the coordinator handles the phase.
    ctx.session
        .submit(SessionCommand::Deregister { role: ctx.role })
        .await?;

    debug!(
        role = %ctx.role,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_messages = ctx.invalid_messages,
        lag_recovery_count = ctx.lag_recovery_count,
        last_version = ?ctx.gate.last_accepted(),
        "connection stats"
    );
    info!(role = %ctx.role, "client disconnected");
    Ok(())
}
