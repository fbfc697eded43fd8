//! Status messages pushed to a guild's text channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::ids::GuildId;
use crate::media::Track;

/// Fire-and-forget status the engine emits while playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Notification {
    NowPlaying { track: Track },
    TrackFailed { track: Track, reason: String },
    QueueEnded,
    ConnectionLost,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::NowPlaying { track } => {
                write!(f, "🎵 Now playing: **{}**", track.title())
            }
            Notification::TrackFailed { track, reason } => {
                write!(f, "❌ Error playing **{}**: {}", track.title(), reason)
            }
            Notification::QueueEnded => {
                f.write_str("🎵 Queue ended. Add more songs to keep the party going!")
            }
            Notification::ConnectionLost => {
                f.write_str("🔌 Lost the voice connection. Playback stopped and the queue was cleared.")
            }
        }
    }
}

/// Host-provided delivery of [`Notification`]s.
///
/// Failures are logged by the caller and never propagated.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, guild: &GuildId, notification: Notification) -> Result<()>;
}
