//! Music service façade and bootstrap helpers.
//!
//! [`MusicService`] is what a chat command layer talks to. Every operation
//! is keyed by guild id and returns the closed outcome set of
//! [`PlaybackError`], so a host can render any reply without knowing engine
//! internals. Server hosts typically enable the `desktop-shims` feature
//! (which depends on `bridge-desktop`) to get the yt-dlp resolver and a
//! log-only notifier by default; they always provide their own voice
//! transport.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{ChannelRef, GuildId, Track};
use core_playback::config::MAX_SEARCH_LIMIT;
use core_playback::{
    PlayAccepted, PlaybackConfig, PlaybackError, QueueSnapshot, ResolutionPipeline,
    SessionContext, SessionHandle, SessionStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_runtime::logging::LoggingConfig;
use tracing::{info, instrument};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{TracingNotifier, YtDlpConfig, YtDlpResolver};

type PlaybackResult<T> = core_playback::Result<T>;

struct Inner {
    store: SessionStore,
    pipeline: ResolutionPipeline,
    events: EventBus,
    config: PlaybackConfig,
}

/// Primary façade exposed to the command layer. Clone to share.
#[derive(Clone)]
pub struct MusicService {
    inner: Arc<Inner>,
}

impl MusicService {
    /// Assemble the engine from validated bridge and playback settings.
    pub fn new(core: CoreConfig, playback: PlaybackConfig) -> Result<Self> {
        core.validate()?;
        playback
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let events = EventBus::new(core.event_buffer_size);
        let pipeline =
            ResolutionPipeline::new(Arc::clone(&core.track_resolver), playback.resolve_timeout);
        let store = SessionStore::new(SessionContext {
            resolver: core.track_resolver,
            transport: core.voice_transport,
            notifier: core.notification_sink,
            events: events.clone(),
            features: core.features,
            config: playback.clone(),
        });

        info!(
            search_limit = playback.search_limit,
            default_volume = playback.default_volume,
            "music service ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                pipeline,
                events,
                config: playback,
            }),
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    /// Stream of every session and playback event.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    /// Live session of `guild`, e.g. to watch its snapshots. Never creates
    /// one.
    pub fn session(&self, guild: &GuildId) -> Option<SessionHandle> {
        self.inner.store.get(guild)
    }

    pub fn session_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Resolve `query` into candidates for the user to pick from.
    ///
    /// `max_results` defaults to the configured search limit and is capped at
    /// [`MAX_SEARCH_LIMIT`]. Creates the guild's session if needed.
    #[instrument(skip(self), fields(guild_id = %guild))]
    pub async fn search(
        &self,
        guild: &GuildId,
        query: &str,
        max_results: Option<usize>,
    ) -> PlaybackResult<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlaybackError::EmptyQuery);
        }
        self.inner.store.get_or_create(guild);

        let limit = max_results
            .unwrap_or(self.inner.config.search_limit)
            .clamp(1, MAX_SEARCH_LIMIT);
        let candidates = self.inner.pipeline.resolve(query, limit).await;
        if candidates.is_empty() {
            return Err(PlaybackError::NoResults {
                query: query.to_string(),
            });
        }
        Ok(candidates)
    }

    /// Queue `track` for the guild. `channel` is the caller's current voice
    /// channel; `None` means the caller is not in one.
    #[instrument(skip(self, track), fields(guild_id = %guild, title = %track.title()))]
    pub async fn play(
        &self,
        guild: &GuildId,
        channel: Option<ChannelRef>,
        track: Track,
    ) -> PlaybackResult<PlayAccepted> {
        let channel = channel.ok_or(PlaybackError::NoVoiceChannel)?;
        self.inner
            .store
            .get_or_create(guild)
            .play(channel, track)
            .await
    }

    /// Resolve `query` and play the best candidate.
    #[instrument(skip(self), fields(guild_id = %guild))]
    pub async fn play_query(
        &self,
        guild: &GuildId,
        channel: Option<ChannelRef>,
        query: &str,
        requested_by: Option<&str>,
    ) -> PlaybackResult<(Track, PlayAccepted)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlaybackError::EmptyQuery);
        }
        let channel = channel.ok_or(PlaybackError::NoVoiceChannel)?;

        let session = self.inner.store.get_or_create(guild);
        let Some(track) = self.inner.pipeline.resolve(query, 1).await.into_iter().next() else {
            return Err(PlaybackError::NoResults {
                query: query.to_string(),
            });
        };
        let track = match requested_by {
            Some(who) => track.with_requested_by(who),
            None => track,
        };

        let accepted = session.play(channel, track.clone()).await?;
        Ok((track, accepted))
    }

    pub async fn pause(&self, guild: &GuildId) -> PlaybackResult<()> {
        match self.inner.store.get(guild) {
            Some(session) => session.pause().await,
            None => Err(core_playback::StateViolation::NotPlaying.into()),
        }
    }

    pub async fn resume(&self, guild: &GuildId) -> PlaybackResult<()> {
        match self.inner.store.get(guild) {
            Some(session) => session.resume().await,
            None => Err(core_playback::StateViolation::NotPaused.into()),
        }
    }

    pub async fn skip(&self, guild: &GuildId) -> PlaybackResult<()> {
        match self.inner.store.get(guild) {
            Some(session) => session.skip().await,
            None => Err(core_playback::StateViolation::NotPlaying.into()),
        }
    }

    /// Stop playback and clear the queue. A guild without a session is a
    /// no-op.
    pub async fn stop(&self, guild: &GuildId) -> PlaybackResult<()> {
        match self.inner.store.get(guild) {
            Some(session) => session.stop().await,
            None => Ok(()),
        }
    }

    pub async fn toggle_loop(&self, guild: &GuildId) -> PlaybackResult<bool> {
        self.session_or_create(guild).toggle_loop().await
    }

    /// Returns the level actually applied after clamping to `0..=100`.
    pub async fn set_volume(&self, guild: &GuildId, level: i32) -> PlaybackResult<u8> {
        self.session_or_create(guild).set_volume(level).await
    }

    /// Current queue view. Never creates a session.
    pub fn queue_snapshot(&self, guild: &GuildId) -> QueueSnapshot {
        self.inner
            .store
            .get(guild)
            .map(|session| session.snapshot())
            .unwrap_or_else(|| {
                QueueSnapshot::empty(guild.clone(), self.inner.config.default_volume)
            })
    }

    /// Stop, disconnect and forget the guild's session.
    #[instrument(skip(self), fields(guild_id = %guild))]
    pub async fn leave(&self, guild: &GuildId) -> PlaybackResult<()> {
        if let Some(session) = self.inner.store.get(guild) {
            session.stop().await?;
        }
        // A session whose actor already exited is still registered.
        self.inner.store.remove(guild);
        Ok(())
    }

    /// Stop every session. Returns how many were shut down.
    pub async fn shutdown(&self) -> usize {
        let count = self.inner.store.shutdown_all().await;
        info!(count, "music service shut down");
        count
    }

    fn session_or_create(&self, guild: &GuildId) -> SessionHandle {
        self.inner.store.get_or_create(guild)
    }
}

/// Install the global tracing subscriber, mirroring events to the
/// [`CoreConfig::logger_sink`] when `logging` does not name its own sink.
///
/// Call once, before [`MusicService::new`], so startup is logged too.
pub fn init_logging(core: &CoreConfig, logging: LoggingConfig) -> Result<()> {
    core_runtime::logging::init_logging(core.logging_config(logging))?;
    Ok(())
}

/// Build a service with the desktop default bridges and the host's voice
/// transport.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # fn example(transport: std::sync::Arc<dyn bridge_traits::VoiceTransport>) -> core_service::Result<()> {
/// let service = core_service::bootstrap_desktop(transport)?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    voice_transport: Arc<dyn bridge_traits::VoiceTransport>,
) -> Result<MusicService> {
    let core = CoreConfig::builder()
        .voice_transport(voice_transport)
        .build()?;
    MusicService::new(core, PlaybackConfig::default())
}
