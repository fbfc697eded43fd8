use core_playback::PlaybackError;
use thiserror::Error;

/// Failures while assembling a [`crate::MusicService`].
///
/// Per-command outcomes are reported as [`PlaybackError`] directly.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

impl CoreError {
    /// Whether the host can fix this by changing its configuration.
    pub fn is_setup_error(&self) -> bool {
        match self {
            CoreError::InitializationFailed(_) => true,
            CoreError::Runtime(err) => err.is_setup_error(),
            CoreError::Playback(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
