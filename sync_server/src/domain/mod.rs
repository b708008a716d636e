// Domain layer: shared session state and its transition rules.

pub mod errors;
pub mod navigation;
pub mod playback;
pub mod ports;
pub mod state;
pub mod store;
pub mod version;

pub use errors::RegisterError;
pub use navigation::NavigationCommand;
pub use playback::ControlCommand;
pub use state::{
    ApplicationState, COMMAND_FAILED, ClientInfo, ClientRole, FsmState, NavigationLevel,
    NavigationState, PlayerState, SessionError,
};
pub use store::StateStore;
pub use version::VersionGate;
