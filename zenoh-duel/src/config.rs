//! Configuration for a duel session

use std::time::Duration;

/// Main configuration for a [`DuelSession`](crate::DuelSession)
#[derive(Debug, Clone, Default)]
pub struct DuelConfig {
    /// Display name published for the local member (generated if None)
    pub display_name: Option<String>,

    /// How long a loaded peer waits for the begin signal before the round
    /// is ended as a forfeit in its favour. None waits indefinitely and
    /// relies on disconnect detection alone.
    pub load_barrier_timeout: Option<Duration>,
}

impl DuelConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the load barrier timeout
    pub fn with_load_barrier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_barrier_timeout = timeout;
        self
    }
}
