//! # Host Bridge Traits
//!
//! Contracts between the playback engine and the bot host.
//!
//! ## Overview
//!
//! The engine owns queues and the playback state machine. Everything that
//! touches the outside world is injected through the traits in this crate:
//!
//! - [`TrackResolver`](resolver::TrackResolver) - query/link to track metadata,
//!   and track to decodable audio
//! - [`VoiceTransport`](voice::VoiceTransport) - joins a voice channel and hands
//!   back a [`VoiceBinding`](voice::VoiceBinding) plus a typed
//!   [`VoiceSignal`](voice::VoiceSignal) receiver
//! - [`NotificationSink`](notify::NotificationSink) - status text for a guild
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to the host
//!
//! `bridge-desktop` ships a yt-dlp resolver and a log-backed notifier. The
//! voice transport always comes from the host's gateway library.
//!
//! ## Error Handling
//!
//! Every bridge returns [`BridgeError`](error::BridgeError). The engine maps
//! these into its own closed outcome set; bridge errors never reach the
//! command surface directly.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; one bridge instance serves every guild.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::{NotificationSink, Notification, GuildId};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct ChannelNotifier { http: MyChatClient }
//!
//! #[async_trait]
//! impl NotificationSink for ChannelNotifier {
//!     async fn send(&self, guild: &GuildId, notification: Notification) -> Result<()> {
//!         self.http.post_status(guild.as_str(), &notification.to_string()).await?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
pub mod ids;
pub mod logging;
pub mod media;
pub mod notify;
pub mod resolver;
pub mod voice;

pub use error::BridgeError;

pub use ids::{ChannelRef, GuildId};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{AudioStream, DynAsyncRead, SourceRef, Track};
pub use notify::{Notification, NotificationSink};
pub use resolver::TrackResolver;
pub use voice::{PlaybackToken, VoiceBinding, VoiceConnection, VoiceSignal, VoiceTransport};
