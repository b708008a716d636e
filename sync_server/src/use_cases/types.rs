// Use-case level inputs/outputs for the session task.

use crate::domain::{ClientInfo, ClientRole, ControlCommand, NavigationCommand, RegisterError};
use tokio::sync::oneshot;

/// Client-reported outcome of the last command it executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionConfirmation {
    Success,
    Failure { error_message: Option<String> },
}

/// Result delivered to the connection that asked to register.
pub type RegisterReply = Result<u64, RegisterError>;

#[derive(Debug)]
pub enum SessionCommand {
    Register {
        role: ClientRole,
        info: ClientInfo,
        reply: oneshot::Sender<RegisterReply>,
    },
    Deregister {
        role: ClientRole,
    },
    Navigate(NavigationCommand),
    Control(ControlCommand),
    Confirm(ActionConfirmation),
}

/// The session task has stopped and no longer accepts commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClosed;
