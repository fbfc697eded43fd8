//! # Playback Error Types
//!
//! The closed set of outcomes a playback operation can report to the command
//! surface. Bridge failures are folded into these before they leave the crate.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Coarse classification used by hosts to pick a reply style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request from the user; reported directly, never retried.
    UserInput,
    /// Nothing could be found, after the direct-link fallback already ran.
    Resolution,
    /// Voice connection or audio stream failure.
    Transport,
    /// The command does not apply to the current playback state.
    InvalidState,
    /// The engine itself is unavailable (e.g. during shutdown).
    Internal,
}

/// Why a state-dependent command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    NotPlaying,
    NotPaused,
    NothingToSkipTo,
}

impl std::fmt::Display for StateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StateViolation::NotPlaying => "nothing is playing",
            StateViolation::NotPaused => "playback is not paused",
            StateViolation::NothingToSkipTo => "there is no next track to skip to",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // User input
    // ========================================================================
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("You need to be in a voice channel to play music")]
    NoVoiceChannel,

    // ========================================================================
    // Resolution
    // ========================================================================
    #[error("No results found for: {query}")]
    NoResults { query: String },

    // ========================================================================
    // Transport
    // ========================================================================
    #[error("Could not join the voice channel: {0}")]
    ConnectFailed(String),

    #[error("Could not play {title}: {reason}")]
    StreamUnavailable { title: String, reason: String },

    #[error("Voice transport error: {0}")]
    Transport(String),

    // ========================================================================
    // State
    // ========================================================================
    #[error("Invalid state: {0}")]
    InvalidState(StateViolation),

    // ========================================================================
    // Engine
    // ========================================================================
    #[error("Playback session for guild {guild_id} is closed")]
    SessionClosed { guild_id: String },
}

impl PlaybackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::EmptyQuery | PlaybackError::NoVoiceChannel => ErrorKind::UserInput,
            PlaybackError::NoResults { .. } => ErrorKind::Resolution,
            PlaybackError::ConnectFailed(_)
            | PlaybackError::StreamUnavailable { .. }
            | PlaybackError::Transport(_) => ErrorKind::Transport,
            PlaybackError::InvalidState(_) => ErrorKind::InvalidState,
            PlaybackError::SessionClosed { .. } => ErrorKind::Internal,
        }
    }

    /// Returns `true` if repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::ConnectFailed(_) | PlaybackError::Transport(_)
        )
    }

    /// Returns `true` for state refusals that hosts usually render as a
    /// gentle "nothing to do" reply instead of an error.
    pub fn is_no_op(&self) -> bool {
        matches!(self, PlaybackError::InvalidState(_))
    }

    /// Returns `true` if the message can be shown to the user as is.
    pub fn is_user_facing(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

impl From<StateViolation> for PlaybackError {
    fn from(violation: StateViolation) -> Self {
        PlaybackError::InvalidState(violation)
    }
}

/// Map a voice-transport failure. Stream failures are reported per track and
/// never through this path.
impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ConnectFailed(reason) => PlaybackError::ConnectFailed(reason),
            other => PlaybackError::Transport(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
