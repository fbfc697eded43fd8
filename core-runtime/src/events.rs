//! # Event Bus
//!
//! Typed broadcast of engine activity for dashboards, audit logs and tests.
//!
//! The bus is observation only. Sessions never read from it and nothing
//! published here feeds back into playback; voice transport signals reach a
//! session over its own channel.
//!
//! ```text
//! ┌───────────────┐  emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ Session actor ├────────>│ EventBus ├────────────>│ Subscriber │
//! └───────────────┘         │(broadcast│             └────────────┘
//! ┌───────────────┐  emit   │ channel) │  subscribe  ┌────────────┐
//! │ Session store ├────────>│          ├────────────>│ Subscriber │
//! └───────────────┘         └──────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, SessionEvent};
//!
//! # core_async::runtime::block_on(async {
//! let bus = EventBus::new(32);
//! let mut stream = EventStream::new(bus.subscribe()).for_guild("g1");
//!
//! bus.emit(CoreEvent::Session(SessionEvent::Created { guild_id: "g2".into() })).ok();
//! bus.emit(CoreEvent::Session(SessionEvent::Created { guild_id: "g1".into() })).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.guild_id(), "g1");
//! # });
//! ```
//!
//! ## Lagging
//!
//! Slow subscribers get `RecvError::Lagged(n)` and may keep reading;
//! `RecvError::Closed` means every sender is gone.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Session(SessionEvent),
    Playback(PlaybackEvent),
}

impl CoreEvent {
    pub fn guild_id(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.guild_id(),
            CoreEvent::Playback(e) => e.guild_id(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::TrackFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::ConnectionLost { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::GraceExpired { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::TrackStarted { .. })
            | CoreEvent::Playback(PlaybackEvent::QueueEnded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Session lifecycle and voice connection health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A session was registered for a guild.
    Created { guild_id: String },
    /// A session was detached from the store.
    Removed { guild_id: String },
    /// The voice transport reported an unexpected disconnect.
    ConnectionLost { guild_id: String },
    /// The transport recovered inside the grace window.
    Reconnected { guild_id: String },
    /// No reconnect arrived in time; the session was stopped.
    GraceExpired { guild_id: String },
}

impl SessionEvent {
    pub fn guild_id(&self) -> &str {
        match self {
            SessionEvent::Created { guild_id }
            | SessionEvent::Removed { guild_id }
            | SessionEvent::ConnectionLost { guild_id }
            | SessionEvent::Reconnected { guild_id }
            | SessionEvent::GraceExpired { guild_id } => guild_id,
        }
    }

    fn description(&self) -> &str {
        match self {
            SessionEvent::Created { .. } => "Session created",
            SessionEvent::Removed { .. } => "Session removed",
            SessionEvent::ConnectionLost { .. } => "Voice connection lost",
            SessionEvent::Reconnected { .. } => "Voice connection recovered",
            SessionEvent::GraceExpired { .. } => "Reconnect grace period expired",
        }
    }
}

/// State machine progress of one guild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    StateChanged {
        guild_id: String,
        from: String,
        to: String,
    },
    TrackStarted {
        guild_id: String,
        title: String,
        source_ref: String,
    },
    /// A track was dropped after its stream failed.
    TrackFailed {
        guild_id: String,
        title: String,
        reason: String,
    },
    QueueEnded {
        guild_id: String,
    },
    VolumeChanged {
        guild_id: String,
        level: u8,
    },
    LoopToggled {
        guild_id: String,
        enabled: bool,
    },
}

impl PlaybackEvent {
    pub fn guild_id(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { guild_id, .. }
            | PlaybackEvent::TrackStarted { guild_id, .. }
            | PlaybackEvent::TrackFailed { guild_id, .. }
            | PlaybackEvent::QueueEnded { guild_id }
            | PlaybackEvent::VolumeChanged { guild_id, .. }
            | PlaybackEvent::LoopToggled { guild_id, .. } => guild_id,
        }
    }

    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::TrackStarted { .. } => "Track started",
            PlaybackEvent::TrackFailed { .. } => "Track failed",
            PlaybackEvent::QueueEnded { .. } => "Queue ended",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::LoopToggled { .. } => "Loop toggled",
        }
    }
}

/// Central event bus. Clone to share; every clone publishes to the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is the per-subscriber backlog before `Lagged` is reported.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers.
    ///
    /// Errors only when nobody is subscribed, which callers may ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver for future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`. Replaces any previous filter.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only yield events for one guild.
    pub fn for_guild(self, guild_id: impl Into<String>) -> Self {
        let guild_id = guild_id.into();
        self.filter(move |event| event.guild_id() == guild_id)
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if this subscriber fell `n` events behind,
    /// `RecvError::Closed` once every sender is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event that is already buffered, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
