//! # Playback Engine
//!
//! Per-guild audio playback: a track queue, a state machine driving the voice
//! transport, and the pipeline that turns user queries into tracks.
//!
//! ## Overview
//!
//! - [`queue`]: ordered track storage with loop-aware advance
//! - [`resolution`]: direct-link detection with search fallback
//! - [`session`]: the per-guild actor that owns queue, state and binding
//! - [`store`]: guild id to session registry
//!
//! Sessions for different guilds run as independent tasks and never block
//! each other.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{SessionContext, SessionStore};
//!
//! let store = SessionStore::new(ctx);
//! let session = store.get_or_create(&GuildId::new("1234"));
//! let accepted = session.play(ChannelRef::new("voice-1"), track).await?;
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod resolution;
pub mod session;
pub mod state;
pub mod store;

pub use config::PlaybackConfig;
pub use error::{ErrorKind, PlaybackError, Result, StateViolation};
pub use queue::TrackQueue;
pub use resolution::{QueryKind, ResolutionPipeline};
pub use session::{SessionContext, SessionHandle, SessionId};
pub use state::{PlayAccepted, PlaybackState, QueueSnapshot};
pub use store::SessionStore;
