//! Playback state and the read-only views handed to callers.

use bridge_traits::{GuildId, Track};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session is in its lifecycle.
///
/// `Stopped` is transient: `stop` passes through it on the way back to
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No voice binding. The queue is empty or holds tracks waiting for a
    /// retry.
    Idle,
    /// Joining the voice channel and opening the first stream.
    Connecting,
    Playing,
    Paused,
    /// Binding released and queue cleared.
    Stopped,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Connecting => "Connecting",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }

    /// Returns `true` while a track is loaded on the voice binding.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consistent copy of a session's queue and settings.
///
/// Published after every state change; readers never see a half-applied
/// command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub guild_id: GuildId,
    pub state: PlaybackState,
    /// Head of the queue. `None` while idle.
    pub now_playing: Option<Track>,
    /// Tracks after the head, or the whole queue while idle.
    pub upcoming: Vec<Track>,
    pub loop_enabled: bool,
    pub volume: u8,
}

impl QueueSnapshot {
    /// Snapshot of a session that does not exist yet.
    pub fn empty(guild_id: GuildId, volume: u8) -> Self {
        Self {
            guild_id,
            state: PlaybackState::Idle,
            now_playing: None,
            upcoming: Vec::new(),
            loop_enabled: false,
            volume,
        }
    }

    /// Number of tracks in the queue, including the head.
    pub fn len(&self) -> usize {
        self.upcoming.len() + usize::from(self.now_playing.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of known durations across the queue, in seconds.
    pub fn total_duration_seconds(&self) -> u64 {
        self.now_playing
            .iter()
            .chain(self.upcoming.iter())
            .map(Track::duration_seconds)
            .sum()
    }
}

/// Successful outcome of `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayAccepted {
    /// 1-based position of the new track in the queue.
    pub position: usize,
    /// Whether this request started playback (as opposed to only enqueueing).
    pub started: bool,
}
