//! # Core Configuration
//!
//! Builder for the bridges and engine-wide settings a bot host hands to the
//! playback engine.
//!
//! ## Required Bridges
//!
//! - `VoiceTransport` - always supplied by the host's gateway library
//! - `TrackResolver` - desktop default: yt-dlp
//! - `NotificationSink` - desktop default: notifications written to the log
//!
//! With the `desktop-shims` feature the resolver and notifier defaults from
//! `bridge-desktop` are injected when not provided. Without it, every
//! missing bridge fails fast with [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .voice_transport(Arc::new(MyGatewayVoice::new(shard)))
//!     .notification_sink(Arc::new(MyChannelNotifier::new(http)))
//!     .event_buffer_size(512)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{LoggerSink, NotificationSink, TrackResolver, VoiceTransport};
use std::sync::Arc;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;

const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Bridges and engine-wide settings. Build with [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    pub track_resolver: Arc<dyn TrackResolver>,
    pub voice_transport: Arc<dyn VoiceTransport>,
    pub notification_sink: Arc<dyn NotificationSink>,
    /// Mirrors engine logs to the host when set.
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Backlog per event bus subscriber.
    pub event_buffer_size: usize,
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("track_resolver", &"TrackResolver { ... }")
            .field("voice_transport", &"VoiceTransport { ... }")
            .field("notification_sink", &"NotificationSink { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Which status notifications reach the guild's text channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// "Now playing" on every track start.
    pub announce_now_playing: bool,
    /// Per-track failure messages during a skip cascade.
    pub announce_track_failures: bool,
    /// "Queue ended" when playback runs out of tracks.
    pub announce_queue_end: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            announce_now_playing: true,
            announce_track_failures: true,
            announce_queue_end: true,
        }
    }
}

impl FeatureFlags {
    /// Only the final outcome of a play request is reported.
    pub fn quiet() -> Self {
        Self {
            announce_now_playing: false,
            announce_track_failures: false,
            announce_queue_end: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// `logging` with this config's logger sink filled in, unless the
    /// logging config already names its own.
    pub fn logging_config(&self, mut logging: LoggingConfig) -> LoggingConfig {
        if logging.logger_sink.is_none() {
            logging.logger_sink = self.logger_sink.clone();
        }
        logging
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn voice_transport_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "VoiceTransport".to_string(),
        message: "A VoiceTransport implementation is required to join voice channels. \
                 Inject an adapter over your chat gateway's voice client."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_track_resolver() -> Result<Arc<dyn TrackResolver>> {
    use bridge_desktop::YtDlpResolver;

    let resolver: Arc<dyn TrackResolver> = Arc::new(YtDlpResolver::default());
    Ok(resolver)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_track_resolver() -> Result<Arc<dyn TrackResolver>> {
    Err(Error::CapabilityMissing {
        capability: "TrackResolver".to_string(),
        message: "A TrackResolver implementation is required for search and streaming. \
                 Enable the 'desktop-shims' feature to use the yt-dlp resolver, \
                 or inject your own."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    use bridge_desktop::TracingNotifier;

    let sink: Arc<dyn NotificationSink> = Arc::new(TracingNotifier);
    Ok(sink)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    Err(Error::CapabilityMissing {
        capability: "NotificationSink".to_string(),
        message: "A NotificationSink implementation is required for status messages. \
                 Enable the 'desktop-shims' feature to log notifications, \
                 or inject a sink that posts to the guild's text channel."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    track_resolver: Option<Arc<dyn TrackResolver>>,
    voice_transport: Option<Arc<dyn VoiceTransport>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn track_resolver(mut self, resolver: Arc<dyn TrackResolver>) -> Self {
        self.track_resolver = Some(resolver);
        self
    }

    pub fn voice_transport(mut self, transport: Arc<dyn VoiceTransport>) -> Self {
        self.voice_transport = Some(transport);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn announce_now_playing(mut self, enabled: bool) -> Self {
        self.features.announce_now_playing = enabled;
        self
    }

    pub fn announce_track_failures(mut self, enabled: bool) -> Self {
        self.features.announce_track_failures = enabled;
        self
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   default is available
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let voice_transport = self
            .voice_transport
            .ok_or_else(voice_transport_missing_error)?;

        let track_resolver = match self.track_resolver {
            Some(resolver) => resolver,
            None => provide_default_track_resolver()?,
        };

        let notification_sink = match self.notification_sink {
            Some(sink) => sink,
            None => provide_default_notification_sink()?,
        };

        let config = CoreConfig {
            track_resolver,
            voice_transport,
            notification_sink,
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
