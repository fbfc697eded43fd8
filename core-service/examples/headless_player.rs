//! Plays a query through yt-dlp into a voice transport that only counts
//! bytes. Useful for checking a yt-dlp install and cookies without a bot.
//!
//! ```bash
//! cargo run -p core-service --example headless_player -- "lofi hip hop"
//! ```

use std::env;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioStream, ChannelRef, GuildId, PlaybackToken, VoiceBinding, VoiceConnection, VoiceSignal,
    VoiceTransport,
};
use core_async::io::AsyncReadExt;
use core_async::sync::mpsc;
use core_playback::{PlaybackConfig, PlaybackState};
use core_runtime::config::CoreConfig;
use core_runtime::logging::LoggingConfig;
use core_service::{init_logging, MusicService, TracingNotifier, YtDlpConfig, YtDlpResolver};
use tracing::info;

struct CountingBinding {
    signals: mpsc::UnboundedSender<VoiceSignal>,
}

#[async_trait]
impl VoiceBinding for CountingBinding {
    async fn play(&self, stream: AudioStream, token: PlaybackToken) -> BridgeResult<()> {
        let signals = self.signals.clone();
        core_async::spawn(async move {
            let total = match stream {
                AudioStream::Pipe(mut reader) => {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut total = 0usize;
                    loop {
                        match reader.read(&mut buf).await {
                            Ok(0) => break total,
                            Ok(n) => total += n,
                            Err(err) => {
                                let _ = signals.send(VoiceSignal::Errored {
                                    token,
                                    reason: err.to_string(),
                                });
                                return;
                            }
                        }
                    }
                }
                AudioStream::Memory(bytes) => bytes.len(),
                AudioStream::RemoteUrl { .. } => 0,
            };
            info!(bytes = total, %token, "stream drained");
            let _ = signals.send(VoiceSignal::Finished { token });
        });
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn resume(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_volume(&self, _level: u8) -> BridgeResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        Ok(())
    }
}

struct CountingTransport;

#[async_trait]
impl VoiceTransport for CountingTransport {
    async fn connect(&self, guild: &GuildId, channel: &ChannelRef) -> BridgeResult<VoiceConnection> {
        info!(guild_id = %guild, channel = %channel, "pretending to join voice");
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(VoiceConnection::new(Arc::new(CountingBinding { signals: tx }), rx))
    }
}

#[core_async::main]
async fn main() -> anyhow::Result<()> {
    let query = env::args()
        .nth(1)
        .unwrap_or_else(|| "never gonna give you up".to_string());

    let mut ytdlp = YtDlpConfig::default();
    if let Ok(path) = env::var("YTDLP_COOKIES") {
        ytdlp = ytdlp.with_cookies(path);
    }

    let core = CoreConfig::builder()
        .track_resolver(Arc::new(YtDlpResolver::new(ytdlp)))
        .notification_sink(Arc::new(TracingNotifier))
        .voice_transport(Arc::new(CountingTransport))
        .build()
        .context("core config")?;
    init_logging(&core, LoggingConfig::default()).context("logging setup")?;
    let service = MusicService::new(core, PlaybackConfig::default())?;

    let guild = GuildId::new("demo-guild");
    let (track, accepted) = service
        .play_query(&guild, Some(ChannelRef::new("demo-voice")), &query, Some("demo"))
        .await
        .with_context(|| format!("playing {query:?}"))?;
    info!(title = track.title(), position = accepted.position, "queued");

    let mut queue = service.queue_snapshot(&guild);
    while queue.state != PlaybackState::Idle {
        core_async::sleep(core_async::Duration::from_millis(250)).await;
        queue = service.queue_snapshot(&guild);
    }

    service.shutdown().await;
    Ok(())
}
