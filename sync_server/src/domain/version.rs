// Client-side ordering rule for state snapshots.

/// Accepts only snapshots newer than the last one accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionGate {
    last_accepted: Option<u64>,
}

impl VersionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `version` if it is newer than anything seen so far.
    pub fn accept(&mut self, version: u64) -> bool {
        match self.last_accepted {
            Some(last) if version <= last => false,
            _ => {
                self.last_accepted = Some(version);
                true
            }
        }
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }
}
