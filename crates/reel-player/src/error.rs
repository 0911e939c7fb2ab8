//! Error taxonomy for the player core.

use thiserror::Error;

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors surfaced by the player core.
///
/// Only construction failures reach callers as `Err`; command failures are
/// absorbed into [`PlaybackState::Error`](crate::PlaybackState::Error) and
/// skipped frames are reported as outcomes.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// No compatible GPU context could be acquired. The surface cannot exist.
    #[error("graphics context creation failed: {0}")]
    ContextCreation(String),

    /// The playback engine could not be created or started.
    #[error("playback engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine rejected a command.
    #[error("engine command failed: {0}")]
    EngineCommand(String),

    /// Operation requires an attached controller.
    #[error("playback controller is not attached")]
    NotAttached,
}

impl PlayerError {
    /// Terminal, non-retryable failures that must reach the UI layer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlayerError::ContextCreation(_) | PlayerError::EngineUnavailable(_))
    }
}
