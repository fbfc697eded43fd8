//! # Playback Configuration
//!
//! Timeouts and defaults for playback sessions. Loaded from the host's config
//! file (any serde format) or built from a preset.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound accepted for `search_limit`.
pub const MAX_SEARCH_LIMIT: usize = 25;

/// Per-session playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How long to wait for a voice connection before giving up.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Bound on one metadata lookup (direct link or search) during resolution.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout: Duration,

    /// How long to wait for the resolver to open an audio stream.
    ///
    /// Default: 30 seconds (yt-dlp cold starts are slow).
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout: Duration,

    /// Bound on a single call into an established voice binding
    /// (play, pause, volume, disconnect).
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_transport_call_timeout")]
    pub transport_call_timeout: Duration,

    /// How long to wait for the transport to reconnect on its own after an
    /// unexpected disconnect before the session is stopped.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_reconnect_grace")]
    pub reconnect_grace: Duration,

    /// Volume (0-100) a new session starts with.
    ///
    /// Default: 100.
    #[serde(default = "default_volume")]
    pub default_volume: u8,

    /// Candidates returned by a free-text search.
    ///
    /// Default: 5.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Pending commands a session accepts before callers wait.
    ///
    /// Default: 64.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            resolve_timeout: default_resolve_timeout(),
            stream_timeout: default_stream_timeout(),
            transport_call_timeout: default_transport_call_timeout(),
            reconnect_grace: default_reconnect_grace(),
            default_volume: default_volume(),
            search_limit: default_search_limit(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl PlaybackConfig {
    /// Short timeouts for bots on fast links; failures surface quickly.
    pub fn responsive() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            resolve_timeout: Duration::from_secs(8),
            stream_timeout: Duration::from_secs(15),
            transport_call_timeout: Duration::from_secs(2),
            reconnect_grace: Duration::from_secs(3),
            ..Default::default()
        }
    }

    /// Generous timeouts for slow hosts or flaky voice regions.
    pub fn patient() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            resolve_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(60),
            transport_call_timeout: Duration::from_secs(10),
            reconnect_grace: Duration::from_secs(15),
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be > 0".to_string());
        }

        if self.resolve_timeout.is_zero() {
            return Err("resolve_timeout must be > 0".to_string());
        }

        if self.stream_timeout.is_zero() {
            return Err("stream_timeout must be > 0".to_string());
        }

        if self.transport_call_timeout.is_zero() {
            return Err("transport_call_timeout must be > 0".to_string());
        }

        if self.reconnect_grace.is_zero() {
            return Err("reconnect_grace must be > 0".to_string());
        }

        if self.default_volume > 100 {
            return Err("default_volume must be between 0 and 100".to_string());
        }

        if self.search_limit == 0 || self.search_limit > MAX_SEARCH_LIMIT {
            return Err(format!(
                "search_limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            ));
        }

        if self.command_buffer == 0 {
            return Err("command_buffer must be > 0".to_string());
        }

        Ok(())
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_stream_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_transport_call_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_reconnect_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_volume() -> u8 {
    100
}

fn default_search_limit() -> usize {
    5
}

fn default_command_buffer() -> usize {
    64
}
