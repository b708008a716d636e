// Use cases layer: the session coordinator and the task that serializes access to it.

pub mod coordinator;
pub mod session;
pub mod types;

pub use coordinator::Coordinator;
pub use session::{SessionHandle, SessionSettings, spawn_session};
pub use types::{ActionConfirmation, RegisterReply, SessionClosed, SessionCommand};
