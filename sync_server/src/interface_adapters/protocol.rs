// Wire protocol DTOs and conversions for messages exchanged with the TV and Remote.
//
// Every frame is one JSON envelope `{type, timestamp, source, payload}`. The `type` tag
// selects exactly one payload shape; frames outside this closed set fail to decode.

use crate::domain::{
    ApplicationState, ClientInfo, ClientRole, ControlCommand, FsmState, NavigationCommand,
    NavigationLevel, NavigationState, PlayerState, SessionError,
};
use crate::use_cases::ActionConfirmation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// Error codes sent back to a single client in `error` messages.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
pub const REGISTRATION_REJECTED: &str = "REGISTRATION_REJECTED";
pub const ALREADY_REGISTERED: &str = "ALREADY_REGISTERED";
pub const UNSUPPORTED_MESSAGE: &str = "UNSUPPORTED_MESSAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Tv,
    Remote,
    Server,
}

impl From<ClientRole> for MessageSource {
    fn from(role: ClientRole) -> Self {
        match role {
            ClientRole::Tv => MessageSource::Tv,
            ClientRole::Remote => MessageSource::Remote,
        }
    }
}

/// Discriminator values of the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Register,
    Data,
    NavigationCommand,
    ControlCommand,
    ActionConfirmation,
    Ack,
    StateSync,
    Error,
    Heartbeat,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Register => "register",
            MessageType::Data => "data",
            MessageType::NavigationCommand => "navigation_command",
            MessageType::ControlCommand => "control_command",
            MessageType::ActionConfirmation => "action_confirmation",
            MessageType::Ack => "ack",
            MessageType::StateSync => "state_sync",
            MessageType::Error => "error",
            MessageType::Heartbeat => "heartbeat",
        }
    }
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    // Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub source: MessageSource,
    #[serde(flatten)]
    pub message: Message,
}

impl Envelope {
    pub fn from_server(timestamp: u64, message: Message) -> Self {
        Self {
            timestamp,
            source: MessageSource::Server,
            message,
        }
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages keyed by the envelope `type`, each with its own payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    Register(RegisterPayload),
    // Legacy free-form key/value data; accepted but not interpreted.
    Data(BTreeMap<String, String>),
    NavigationCommand(NavigationCommandPayload),
    ControlCommand(ControlCommandPayload),
    ActionConfirmation(ActionConfirmationPayload),
    Ack(AckPayload),
    StateSync(StateSyncPayload),
    Error(ErrorPayload),
    // Clients may omit the payload or send null.
    Heartbeat(Option<HeartbeatPayload>),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Register(_) => MessageType::Register,
            Message::Data(_) => MessageType::Data,
            Message::NavigationCommand(_) => MessageType::NavigationCommand,
            Message::ControlCommand(_) => MessageType::ControlCommand,
            Message::ActionConfirmation(_) => MessageType::ActionConfirmation,
            Message::Ack(_) => MessageType::Ack,
            Message::StateSync(_) => MessageType::StateSync,
            Message::Error(_) => MessageType::Error,
            Message::Heartbeat(_) => MessageType::Heartbeat,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Message::Error(ErrorPayload {
            code: code.to_string(),
            message: message.into(),
        })
    }
}

/// Handshake payload a client sends to claim a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub client_type: ClientRole,
    pub device_id: String,
    pub device_name: String,
}

impl RegisterPayload {
    pub fn into_parts(self) -> (ClientRole, ClientInfo) {
        (
            self.client_type,
            ClientInfo {
                device_id: self.device_id,
                device_name: self.device_name,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationAction {
    NavigateToPerformer,
    NavigateToVideo,
    NavigateToScene,
    NavigateBack,
    NavigateHome,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationCommandPayload {
    pub action: NavigationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Play,
    Pause,
    Seek,
    SetVolume,
    Mute,
    Unmute,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCommandPayload {
    pub action: ControlAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seek_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfirmationPayload {
    pub status: ConfirmationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Acknowledges a message. Clients may put any value under `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub acked: Option<Value>,
}

impl AckPayload {
    pub fn of(acked: MessageType) -> Self {
        Self {
            acked: Some(Value::from(acked.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {}

/// Full session state broadcast to every client after each mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSyncPayload {
    pub version: u64,
    pub fsm_state: FsmState,
    pub connected_clients: BTreeMap<ClientRole, ClientInfoDto>,
    pub navigation: NavigationDto,
    pub player: PlayerDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl From<&ApplicationState> for StateSyncPayload {
    fn from(state: &ApplicationState) -> Self {
        Self {
            version: state.version,
            fsm_state: state.fsm_state,
            connected_clients: state
                .connected_clients
                .iter()
                .map(|(role, info)| (*role, ClientInfoDto::from(info)))
                .collect(),
            navigation: NavigationDto::from(&state.navigation),
            player: PlayerDto::from(&state.player),
            error: state.error.as_ref().map(ErrorPayload::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfoDto {
    pub device_id: String,
    pub device_name: String,
}

impl From<&ClientInfo> for ClientInfoDto {
    fn from(info: &ClientInfo) -> Self {
        Self {
            device_id: info.device_id.clone(),
            device_name: info.device_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDto {
    pub current_level: NavigationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    pub breadcrumb: Vec<String>,
}

impl From<&NavigationState> for NavigationDto {
    fn from(nav: &NavigationState) -> Self {
        Self {
            current_level: nav.current_level,
            performer_id: nav.performer_id.clone(),
            video_id: nav.video_id.clone(),
            scene_id: nav.scene_id.clone(),
            breadcrumb: nav.breadcrumb.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
}

impl From<&PlayerState> for PlayerDto {
    fn from(player: &PlayerState) -> Self {
        Self {
            is_playing: player.is_playing,
            current_time: player.current_time,
            duration: player.duration,
            volume: player.volume,
            muted: player.muted,
            youtube_id: player.youtube_id.clone(),
        }
    }
}

impl From<&SessionError> for ErrorPayload {
    fn from(error: &SessionError) -> Self {
        Self {
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }
}

/// A decoded frame that cannot be turned into a session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    MissingTargetId(NavigationAction),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MissingTargetId(action) => {
                write!(f, "targetId is required for {action:?}")
            }
        }
    }
}

impl TryFrom<NavigationCommandPayload> for NavigationCommand {
    type Error = ProtocolError;

    fn try_from(payload: NavigationCommandPayload) -> Result<Self, Self::Error> {
        let action = payload.action;
        let target = || payload.target_id.ok_or(ProtocolError::MissingTargetId(action));
        Ok(match action {
            NavigationAction::NavigateHome => NavigationCommand::Home,
            NavigationAction::NavigateBack => NavigationCommand::Back,
            NavigationAction::NavigateToPerformer => NavigationCommand::ToPerformer(target()?),
            NavigationAction::NavigateToVideo => NavigationCommand::ToVideo(target()?),
            NavigationAction::NavigateToScene => NavigationCommand::ToScene(target()?),
            NavigationAction::Unsupported => NavigationCommand::Unsupported,
        })
    }
}

impl From<ControlCommandPayload> for ControlCommand {
    fn from(payload: ControlCommandPayload) -> Self {
        match payload.action {
            ControlAction::Play => ControlCommand::Play {
                youtube_id: payload.youtube_id,
                start_time: payload.start_time,
            },
            ControlAction::Pause => ControlCommand::Pause,
            ControlAction::Seek => ControlCommand::Seek {
                seek_time: payload.seek_time,
            },
            ControlAction::SetVolume => ControlCommand::SetVolume {
                volume: payload.volume,
            },
            ControlAction::Mute => ControlCommand::Mute,
            ControlAction::Unmute => ControlCommand::Unmute,
            ControlAction::Unsupported => ControlCommand::Unsupported,
        }
    }
}

impl From<ActionConfirmationPayload> for ActionConfirmation {
    fn from(payload: ActionConfirmationPayload) -> Self {
        match payload.status {
            ConfirmationStatus::Success => ActionConfirmation::Success,
            ConfirmationStatus::Failure => ActionConfirmation::Failure {
                error_message: payload.error_message,
            },
        }
    }
}
