// Domain-level shared session state: presence, navigation, and player.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error code recorded when a client reports a failed command.
pub const COMMAND_FAILED: &str = "COMMAND_FAILED";

/// The two fixed client kinds the session tracks presence for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    Tv,
    Remote,
}

impl ClientRole {
    pub const ALL: [ClientRole; 2] = [ClientRole::Tv, ClientRole::Remote];

    pub fn as_str(self) -> &'static str {
        match self {
            ClientRole::Tv => "tv",
            ClientRole::Remote => "remote",
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse session phase derived from presence, playback, and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsmState {
    Initializing,
    Ready,
    Playing,
    Paused,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub device_id: String,
    pub device_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationLevel {
    Performers,
    Videos,
    Scenes,
}

/// Catalog position shared by both devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub current_level: NavigationLevel,
    pub performer_id: Option<String>,
    pub video_id: Option<String>,
    pub scene_id: Option<String>,
    // One token per forward step, e.g. `performer:<id>`.
    pub breadcrumb: Vec<String>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_level: NavigationLevel::Performers,
            performer_id: None,
            video_id: None,
            scene_id: None,
            breadcrumb: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub is_playing: bool,
    // Seconds.
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64, // 0.0..=1.0
    pub muted: bool,
    pub youtube_id: Option<String>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            youtube_id: None,
        }
    }
}

/// Client-reported failure shown to every connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub code: String,
    pub message: String,
}

/// The single shared state of one TV/Remote session.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationState {
    pub version: u64,
    pub fsm_state: FsmState,
    pub connected_clients: BTreeMap<ClientRole, ClientInfo>,
    pub navigation: NavigationState,
    pub player: PlayerState,
    // Present only while `fsm_state` is `Error`.
    pub error: Option<SessionError>,
}

impl ApplicationState {
    pub fn new() -> Self {
        Self {
            version: 1,
            fsm_state: FsmState::Initializing,
            connected_clients: BTreeMap::new(),
            navigation: NavigationState::default(),
            player: PlayerState::default(),
            error: None,
        }
    }

    /// Returns true when both the TV and the Remote are registered.
    pub fn is_paired(&self) -> bool {
        ClientRole::ALL
            .iter()
            .all(|role| self.connected_clients.contains_key(role))
    }

    /// Moves to `phase`, dropping any recorded error when leaving the error phase.
    pub(crate) fn set_phase(&mut self, phase: FsmState) {
        self.fsm_state = phase;
        if phase != FsmState::Error {
            self.error = None;
        }
    }
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_state_is_created_then_it_starts_initializing_at_version_one() {
        let state = ApplicationState::new();

        assert_eq!(state.version, 1);
        assert_eq!(state.fsm_state, FsmState::Initializing);
        assert!(state.connected_clients.is_empty());
        assert_eq!(state.navigation, NavigationState::default());
        assert!(!state.player.is_playing);
        assert!(state.error.is_none());
    }

    #[test]
    fn when_only_one_role_is_present_then_state_is_not_paired() {
        let mut state = ApplicationState::new();
        state.connected_clients.insert(
            ClientRole::Tv,
            ClientInfo {
                device_id: "tv-1".to_string(),
                device_name: "Living Room".to_string(),
            },
        );

        assert!(!state.is_paired());
    }

    #[test]
    fn when_leaving_error_phase_then_error_is_dropped() {
        let mut state = ApplicationState::new();
        state.set_phase(FsmState::Error);
        state.error = Some(SessionError {
            code: COMMAND_FAILED.to_string(),
            message: "boom".to_string(),
        });

        state.set_phase(FsmState::Initializing);

        assert!(state.error.is_none());
    }
}
