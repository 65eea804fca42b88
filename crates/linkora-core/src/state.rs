//! Externally observable sync state.

/// Phase of the sync orchestrator.
///
/// Only start/stop and failures are meant for users; the intermediate phases
/// exist so callers can show a spinner.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Connecting,
    FlushingPending,
    Pulling,
    Live,
    Failed(String),
}

impl SyncState {
    /// Whether a sync run is currently in progress (not idle, live, or failed).
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::FlushingPending | Self::Pulling)
    }
}
