//! # Desktop Bridge Implementations
//!
//! Default bridges for hosts running on a regular server or desktop.
//!
//! ## Overview
//!
//! - [`YtDlpResolver`] implements `TrackResolver` by shelling out to
//!   `yt-dlp`: `--dump-json` for search and link lookups, `-o -` for audio.
//! - [`TracingNotifier`] implements `NotificationSink` by logging.
//!
//! No voice transport lives here; that always comes from the host's gateway
//! library.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_desktop::{TracingNotifier, YtDlpConfig, YtDlpResolver};
//!
//! let resolver = YtDlpResolver::new(YtDlpConfig::default().with_cookies("cookies.txt"));
//! let core = CoreConfig::builder()
//!     .track_resolver(Arc::new(resolver))
//!     .notification_sink(Arc::new(TracingNotifier))
//!     .voice_transport(my_transport)
//!     .build()?;
//! ```

mod notifier;
mod ytdlp;

pub use notifier::TracingNotifier;
pub use ytdlp::{ProcessStream, YtDlpConfig, YtDlpResolver};
