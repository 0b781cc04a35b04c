/// Error types for the zenoh-duel library
use thiserror::Error;

/// Result type alias for duel operations
pub type Result<T> = std::result::Result<T, DuelError>;

/// Errors that can occur while managing a duel session
///
/// Only lifecycle operations (creating stores, creating or joining sessions)
/// report errors. Protocol operations on an established session never fail;
/// they degrade to no-ops and signal rejection through their return values.
#[derive(Debug, Error)]
pub enum DuelError {
    /// Zenoh-related errors
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    /// Invalid member identifier provided
    #[error("Invalid member id: {0}. Must be a valid single-chunk keyexpr (no /, *, $, ?, #, @)")]
    InvalidMemberId(String),

    /// Invalid session identifier provided
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Invalid keyexpr pattern
    #[error("Invalid keyexpr: {0}")]
    InvalidKeyexpr(String),

    /// The underlying session store is not initialized
    #[error("Session store unavailable")]
    StoreUnavailable,

    /// Already a member of a session
    #[error("Already in session {0}")]
    AlreadyInSession(String),

    /// No session with this id exists
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session no longer accepts members (a member already left)
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Session already has both peers
    #[error("Session full: {0}")]
    SessionFull(String),
}
