//! Error types for the engine binding.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MpvError>;

/// Errors that can occur while driving the embedded engine.
#[derive(Error, Debug)]
pub enum MpvError {
    /// Engine library failed to load.
    #[error("failed to load mpv library: {0}")]
    LibraryLoad(String),

    /// Symbol lookup failed.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// Engine creation or initialization failed.
    #[error("mpv initialization failed: {0}")]
    InitFailed(String),

    /// Render context creation failed.
    #[error("render context creation failed: {0}")]
    RenderContext(String),

    /// A command or property request was rejected by the engine.
    #[error("mpv command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// The render call itself reported an error.
    #[error("render failed: {0}")]
    Render(String),

    /// Argument contained an interior NUL byte.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Engine has already been terminated.
    #[error("mpv has been terminated")]
    Terminated,
}

impl From<std::ffi::NulError> for MpvError {
    fn from(err: std::ffi::NulError) -> Self {
        MpvError::InvalidArgument(err.to_string())
    }
}
