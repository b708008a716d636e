// Playback transitions for the shared player.

use crate::domain::state::{FsmState, PlayerState};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Play {
        youtube_id: Option<String>,
        start_time: Option<f64>,
    },
    Pause,
    Seek {
        seek_time: Option<f64>,
    },
    SetVolume {
        volume: Option<f64>,
    },
    Mute,
    Unmute,
    // Action name outside the known set; applied as a no-op.
    Unsupported,
}

impl PlayerState {
    /// Applies a control command and returns the session phase it implies, if any.
    pub fn apply(&mut self, command: ControlCommand) -> Option<FsmState> {
        match command {
            ControlCommand::Play {
                youtube_id,
                start_time,
            } => {
                self.is_playing = true;
                if let Some(youtube_id) = youtube_id {
                    self.youtube_id = Some(youtube_id);
                }
                if let Some(start_time) = start_time.filter(|t| t.is_finite()) {
                    self.current_time = start_time;
                }
                Some(FsmState::Playing)
            }
            ControlCommand::Pause => {
                self.is_playing = false;
                Some(FsmState::Paused)
            }
            ControlCommand::Seek { seek_time } => {
                if let Some(seek_time) = seek_time.filter(|t| t.is_finite()) {
                    self.current_time = seek_time;
                }
                None
            }
            ControlCommand::SetVolume { volume } => {
                if let Some(volume) = volume.filter(|v| !v.is_nan()) {
                    self.volume = volume.clamp(0.0, 1.0);
                }
                None
            }
            ControlCommand::Mute => {
                self.muted = true;
                None
            }
            ControlCommand::Unmute => {
                self.muted = false;
                None
            }
            ControlCommand::Unsupported => None,
        }
    }
}
