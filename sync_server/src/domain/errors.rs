// Domain-level errors for session workflows.

/// Registration rejected without touching shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    DuplicateClientType,
}

impl RegisterError {
    /// Machine-readable reason sent back to the rejected client.
    pub fn reason(self) -> &'static str {
        match self {
            RegisterError::DuplicateClientType => "duplicate_client_type",
        }
    }
}
