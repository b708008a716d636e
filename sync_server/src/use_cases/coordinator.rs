// Single writer of the shared session state.

use super::types::ActionConfirmation;
use crate::domain::{
    ApplicationState, COMMAND_FAILED, ClientInfo, ClientRole, ControlCommand, FsmState,
    NavigationCommand, RegisterError, SessionError, StateStore,
};

const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Owns the state store and applies every session operation to it.
///
/// Each successful operation commits exactly one version bump. Rejected registrations and
/// deregistrations of an empty role leave the state and version untouched.
#[derive(Debug, Default)]
pub struct Coordinator {
    store: StateStore,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            store: StateStore::new(),
        }
    }

    pub fn snapshot(&self) -> ApplicationState {
        self.store.snapshot()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    pub fn register_client(
        &mut self,
        role: ClientRole,
        info: ClientInfo,
    ) -> Result<u64, RegisterError> {
        if self.store.current().connected_clients.contains_key(&role) {
            return Err(RegisterError::DuplicateClientType);
        }

        let version = self.store.commit(|state| {
            state.connected_clients.insert(role, info);
            recalc_fsm(state);
        });
        Ok(version)
    }

    /// Removes the client for `role`. Returns `None` when no client held the role.
    pub fn deregister_client(&mut self, role: ClientRole) -> Option<u64> {
        if !self.store.current().connected_clients.contains_key(&role) {
            return None;
        }

        let version = self.store.commit(|state| {
            state.connected_clients.remove(&role);
            recalc_fsm(state);
        });
        Some(version)
    }

    pub fn navigation_command(&mut self, command: NavigationCommand) -> u64 {
        self.store.commit(|state| state.navigation.apply(command))
    }

    pub fn control_command(&mut self, command: ControlCommand) -> u64 {
        self.store.commit(|state| {
            if let Some(phase) = state.player.apply(command) {
                state.set_phase(phase);
            }
        })
    }

    /// Records a client-reported command outcome.
    ///
    /// Success only clears the error; the phase stays whatever it was.
    pub fn action_confirmation(&mut self, confirmation: ActionConfirmation) -> u64 {
        self.store.commit(|state| match confirmation {
            ActionConfirmation::Success => state.error = None,
            ActionConfirmation::Failure { error_message } => {
                state.set_phase(FsmState::Error);
                state.error = Some(SessionError {
                    code: COMMAND_FAILED.to_string(),
                    message: error_message.unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
                });
            }
        })
    }
}

// Presence drives the phase: a missing role always resets to initializing, and a
// completed pair promotes initializing to ready. Playback phases are otherwise kept.
fn recalc_fsm(state: &mut ApplicationState) {
    if !state.is_paired() {
        state.set_phase(FsmState::Initializing);
    } else if state.fsm_state == FsmState::Initializing {
        state.set_phase(FsmState::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NavigationLevel;

    fn info(device_id: &str) -> ClientInfo {
        ClientInfo {
            device_id: device_id.to_string(),
            device_name: format!("{device_id} device"),
        }
    }

    fn paired() -> Coordinator {
        let mut coordinator = Coordinator::new();
        coordinator
            .register_client(ClientRole::Tv, info("tv-1"))
            .expect("tv should register");
        coordinator
            .register_client(ClientRole::Remote, info("remote-1"))
            .expect("remote should register");
        coordinator
    }

    #[test]
    fn when_tv_then_remote_register_then_phase_becomes_ready() {
        let mut coordinator = Coordinator::new();

        coordinator
            .register_client(ClientRole::Tv, info("tv-1"))
            .expect("tv should register");
        assert_eq!(coordinator.snapshot().fsm_state, FsmState::Initializing);

        let version = coordinator
            .register_client(ClientRole::Remote, info("remote-1"))
            .expect("remote should register");

        let state = coordinator.snapshot();
        assert_eq!(version, 3);
        assert_eq!(state.fsm_state, FsmState::Ready);
        assert_eq!(state.connected_clients[&ClientRole::Tv].device_id, "tv-1");
        assert_eq!(
            state.connected_clients[&ClientRole::Remote].device_name,
            "remote-1 device"
        );
    }

    #[test]
    fn when_role_is_registered_twice_then_duplicate_is_rejected_without_bump() {
        let mut coordinator = Coordinator::new();
        coordinator
            .register_client(ClientRole::Tv, info("tv-1"))
            .expect("tv should register");
        let before = coordinator.snapshot();

        let result = coordinator.register_client(ClientRole::Tv, info("tv-2"));

        assert_eq!(result, Err(RegisterError::DuplicateClientType));
        assert_eq!(RegisterError::DuplicateClientType.reason(), "duplicate_client_type");
        assert_eq!(coordinator.snapshot(), before);
    }

    #[test]
    fn when_either_client_leaves_then_phase_returns_to_initializing() {
        for role in ClientRole::ALL {
            let mut coordinator = paired();

            let version = coordinator.deregister_client(role);

            assert_eq!(version, Some(4));
            let state = coordinator.snapshot();
            assert_eq!(state.fsm_state, FsmState::Initializing);
            assert!(!state.connected_clients.contains_key(&role));
        }
    }

    #[test]
    fn when_unregistered_role_leaves_then_nothing_changes() {
        let mut coordinator = Coordinator::new();

        assert_eq!(coordinator.deregister_client(ClientRole::Remote), None);
        assert_eq!(coordinator.version(), 1);
    }

    #[test]
    fn when_client_leaves_while_playing_then_player_fields_survive_the_reset() {
        let mut coordinator = paired();
        coordinator.control_command(ControlCommand::Play {
            youtube_id: Some("yt-1".to_string()),
            start_time: Some(10.0),
        });
        coordinator.control_command(ControlCommand::SetVolume { volume: Some(0.3) });

        coordinator.deregister_client(ClientRole::Tv);

        let state = coordinator.snapshot();
        assert_eq!(state.fsm_state, FsmState::Initializing);
        assert_eq!(state.player.current_time, 10.0);
        assert_eq!(state.player.volume, 0.3);
        assert!(state.player.is_playing);
    }

    #[test]
    fn when_client_returns_after_reset_then_phase_is_ready_again() {
        let mut coordinator = paired();
        coordinator.control_command(ControlCommand::Pause);
        coordinator.deregister_client(ClientRole::Remote);

        coordinator
            .register_client(ClientRole::Remote, info("remote-2"))
            .expect("remote should register again");

        assert_eq!(coordinator.snapshot().fsm_state, FsmState::Ready);
    }

    #[test]
    fn when_playing_and_pausing_then_phase_follows_playback() {
        let mut coordinator = paired();

        coordinator.control_command(ControlCommand::Play {
            youtube_id: None,
            start_time: None,
        });
        assert_eq!(coordinator.snapshot().fsm_state, FsmState::Playing);

        coordinator.control_command(ControlCommand::Pause);
        assert_eq!(coordinator.snapshot().fsm_state, FsmState::Paused);

        coordinator.control_command(ControlCommand::Seek {
            seek_time: Some(3.0),
        });
        assert_eq!(coordinator.snapshot().fsm_state, FsmState::Paused);
    }

    #[test]
    fn when_command_fails_then_error_is_recorded_and_phase_is_error() {
        let mut coordinator = paired();

        coordinator.action_confirmation(ActionConfirmation::Failure {
            error_message: Some("boom".to_string()),
        });

        let state = coordinator.snapshot();
        assert_eq!(state.fsm_state, FsmState::Error);
        assert_eq!(
            state.error,
            Some(SessionError {
                code: "COMMAND_FAILED".to_string(),
                message: "boom".to_string(),
            })
        );
    }

    #[test]
    fn when_failure_is_followed_by_success_then_error_clears_but_phase_stays() {
        let mut coordinator = paired();
        coordinator.action_confirmation(ActionConfirmation::Failure {
            error_message: Some("boom".to_string()),
        });

        let version = coordinator.action_confirmation(ActionConfirmation::Success);

        let state = coordinator.snapshot();
        assert_eq!(version, 5);
        assert!(state.error.is_none());
        assert_eq!(state.fsm_state, FsmState::Error);
    }

    #[test]
    fn when_failure_has_no_message_then_a_generic_message_is_used() {
        let mut coordinator = Coordinator::new();

        coordinator.action_confirmation(ActionConfirmation::Failure {
            error_message: None,
        });

        let error = coordinator.snapshot().error.expect("error should be recorded");
        assert_eq!(error.message, UNKNOWN_ERROR_MESSAGE);
    }

    #[test]
    fn when_client_leaves_during_error_then_error_is_dropped_with_the_phase() {
        let mut coordinator = paired();
        coordinator.action_confirmation(ActionConfirmation::Failure {
            error_message: Some("boom".to_string()),
        });

        coordinator.deregister_client(ClientRole::Remote);

        let state = coordinator.snapshot();
        assert_eq!(state.fsm_state, FsmState::Initializing);
        assert!(state.error.is_none());
    }

    #[test]
    fn when_unsupported_actions_arrive_then_only_the_version_moves() {
        let mut coordinator = paired();
        let before = coordinator.snapshot();

        coordinator.navigation_command(NavigationCommand::Unsupported);
        coordinator.control_command(ControlCommand::Unsupported);

        let after = coordinator.snapshot();
        assert_eq!(after.version, before.version + 2);
        assert_eq!(after.navigation, before.navigation);
        assert_eq!(after.player, before.player);
        assert_eq!(after.fsm_state, before.fsm_state);
    }

    #[test]
    fn when_navigating_then_every_command_bumps_the_version() {
        let mut coordinator = Coordinator::new();

        coordinator.navigation_command(NavigationCommand::ToPerformer("1".to_string()));
        coordinator.navigation_command(NavigationCommand::ToVideo("2".to_string()));
        coordinator.navigation_command(NavigationCommand::ToScene("3".to_string()));
        coordinator.navigation_command(NavigationCommand::Back);
        let version = coordinator.navigation_command(NavigationCommand::Back);

        let nav = coordinator.snapshot().navigation;
        assert_eq!(version, 6);
        assert_eq!(nav.current_level, NavigationLevel::Performers);
        assert_eq!(nav.breadcrumb, vec!["performer:1"]);
    }

    #[test]
    fn when_operations_succeed_then_version_counts_them_from_one() {
        let mut coordinator = Coordinator::new();
        let mut applied = 0;

        coordinator
            .register_client(ClientRole::Tv, info("tv-1"))
            .expect("tv should register");
        applied += 1;
        coordinator.navigation_command(NavigationCommand::Home);
        applied += 1;
        coordinator.control_command(ControlCommand::Mute);
        applied += 1;
        coordinator.action_confirmation(ActionConfirmation::Success);
        applied += 1;
        coordinator.deregister_client(ClientRole::Tv);
        applied += 1;

        assert_eq!(coordinator.version(), 1 + applied);
    }
}
