// Owner of the single shared application state.

use crate::domain::state::ApplicationState;

/// Holds the session state and its version counter.
///
/// Reads hand out detached copies. Writes go through [`StateStore::commit`], which the
/// coordinator uses so that every committed mutation bumps the version exactly once.
#[derive(Debug, Default)]
pub struct StateStore {
    state: ApplicationState,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            state: ApplicationState::new(),
        }
    }

    /// Returns a copy of the current state suitable for serialization.
    pub fn snapshot(&self) -> ApplicationState {
        self.state.clone()
    }

    pub fn current(&self) -> &ApplicationState {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Applies one mutation and bumps the version. Returns the new version.
    pub(crate) fn commit<F>(&mut self, mutate: F) -> u64
    where
        F: FnOnce(&mut ApplicationState),
    {
        mutate(&mut self.state);
        self.state.version += 1;
        self.state.version
    }
}
