//! Real-time voice transport contract.
//!
//! A [`VoiceTransport`] produces one [`VoiceConnection`] per guild. The
//! connection pairs a [`VoiceBinding`] (the command side) with a signal
//! receiver (the event side) so lifecycle events arrive on a typed channel
//! scoped to that binding instead of through registered callbacks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use core_async::sync::mpsc;

use crate::error::Result;
use crate::ids::{ChannelRef, GuildId};
use crate::media::AudioStream;

/// Identifies one `play` hand-off. Signals carry the token of the stream they
/// refer to so stale completions can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaybackToken(u64);

impl PlaybackToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for PlaybackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle events emitted by a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSignal {
    /// The stream started with `token` reached its end (or was stopped).
    Finished { token: PlaybackToken },
    /// The stream started with `token` failed mid-playback.
    Errored { token: PlaybackToken, reason: String },
    /// The connection dropped without being asked to.
    Disconnected,
    /// The transport re-established a dropped connection on its own.
    Reconnected,
}

/// Command side of a live voice connection. At most one stream plays at a
/// time; `play` replaces whatever was playing.
#[async_trait]
pub trait VoiceBinding: Send + Sync {
    async fn play(&self, stream: AudioStream, token: PlaybackToken) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// `level` is already clamped to `0..=100`.
    async fn set_volume(&self, level: u8) -> Result<()>;

    /// Leave the channel. Signals stop after this returns.
    async fn disconnect(&self) -> Result<()>;
}

/// A freshly established connection.
pub struct VoiceConnection {
    pub binding: Arc<dyn VoiceBinding>,
    pub signals: mpsc::UnboundedReceiver<VoiceSignal>,
}

impl VoiceConnection {
    pub fn new(
        binding: Arc<dyn VoiceBinding>,
        signals: mpsc::UnboundedReceiver<VoiceSignal>,
    ) -> Self {
        Self { binding, signals }
    }
}

impl fmt::Debug for VoiceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceConnection").finish_non_exhaustive()
    }
}

/// Host-provided factory for voice connections.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Join `channel` on behalf of `guild`.
    ///
    /// Implementations must release any half-open connection if the returned
    /// future is dropped before completion.
    async fn connect(&self, guild: &GuildId, channel: &ChannelRef) -> Result<VoiceConnection>;
}
