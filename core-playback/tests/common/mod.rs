//! In-process fakes for driving sessions in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioStream, BridgeError, ChannelRef, GuildId, Notification, NotificationSink, PlaybackToken,
    SourceRef, Track, TrackResolver, VoiceBinding, VoiceConnection, VoiceSignal, VoiceTransport,
};
use bytes::Bytes;
use core_async::sync::{broadcast, mpsc, Notify};
use core_async::time::{sleep, timeout, Duration};
use core_playback::{
    PlaybackConfig, PlaybackState, SessionContext, SessionHandle, SessionStore,
};
use core_runtime::config::FeatureFlags;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn guild(id: &str) -> GuildId {
    GuildId::new(id)
}

pub fn channel(id: &str) -> ChannelRef {
    ChannelRef::new(id)
}

pub fn track(title: &str) -> Track {
    Track::new(title, SourceRef::new(format!("fake://{title}")))
}

// ----------------------------------------------------------------------
// Voice
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingCall {
    Play(PlaybackToken),
    Pause,
    Resume,
    Stop,
    SetVolume(u8),
    Disconnect,
}

/// Records every call and lets the test inject signals.
pub struct FakeBinding {
    calls: Mutex<Vec<BindingCall>>,
    signals: mpsc::UnboundedSender<VoiceSignal>,
    last_token: Mutex<Option<PlaybackToken>>,
}

impl FakeBinding {
    pub fn calls(&self) -> Vec<BindingCall> {
        self.calls.lock().clone()
    }

    pub fn play_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, BindingCall::Play(_)))
            .count()
    }

    pub fn last_token(&self) -> Option<PlaybackToken> {
        *self.last_token.lock()
    }

    pub fn is_disconnected(&self) -> bool {
        self.calls.lock().contains(&BindingCall::Disconnect)
    }

    /// Report the current stream as finished.
    pub fn finish(&self) {
        if let Some(token) = self.last_token() {
            self.signal(VoiceSignal::Finished { token });
        }
    }

    pub fn fail(&self, reason: &str) {
        if let Some(token) = self.last_token() {
            self.signal(VoiceSignal::Errored {
                token,
                reason: reason.to_string(),
            });
        }
    }

    pub fn signal(&self, signal: VoiceSignal) {
        let _ = self.signals.send(signal);
    }
}

#[async_trait]
impl VoiceBinding for FakeBinding {
    async fn play(&self, _stream: AudioStream, token: PlaybackToken) -> BridgeResult<()> {
        self.calls.lock().push(BindingCall::Play(token));
        *self.last_token.lock() = Some(token);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.calls.lock().push(BindingCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> BridgeResult<()> {
        self.calls.lock().push(BindingCall::Resume);
        Ok(())
    }

    /// Like a real sink, stopping reports the stopped stream as finished.
    async fn stop(&self) -> BridgeResult<()> {
        self.calls.lock().push(BindingCall::Stop);
        self.finish();
        Ok(())
    }

    async fn set_volume(&self, level: u8) -> BridgeResult<()> {
        self.calls.lock().push(BindingCall::SetVolume(level));
        Ok(())
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        self.calls.lock().push(BindingCall::Disconnect);
        Ok(())
    }
}

/// Connects instantly unless told to fail or to hold a guild's connect
/// until released.
#[derive(Default)]
pub struct FakeTransport {
    connects: AtomicUsize,
    failure: Mutex<Option<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    bindings: Mutex<Vec<(GuildId, Arc<FakeBinding>)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    /// Block connects for `guild` until [`FakeTransport::release`].
    pub fn hold(&self, guild: &str) {
        self.gates
            .lock()
            .insert(guild.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, guild: &str) {
        if let Some(gate) = self.gates.lock().remove(guild) {
            gate.notify_one();
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn bindings(&self) -> Vec<Arc<FakeBinding>> {
        self.bindings
            .lock()
            .iter()
            .map(|(_, binding)| Arc::clone(binding))
            .collect()
    }

    /// Most recent binding handed out for `guild`.
    pub fn binding(&self, guild: &str) -> Option<Arc<FakeBinding>> {
        self.bindings
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id.as_str() == guild)
            .map(|(_, binding)| Arc::clone(binding))
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, guild: &GuildId, _channel: &ChannelRef) -> BridgeResult<VoiceConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().get(guild.as_str()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(reason) = self.failure.lock().clone() {
            return Err(BridgeError::ConnectFailed(reason));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let binding = Arc::new(FakeBinding {
            calls: Mutex::new(Vec::new()),
            signals: tx,
            last_token: Mutex::new(None),
        });
        self.bindings
            .lock()
            .push((guild.clone(), Arc::clone(&binding)));
        Ok(VoiceConnection::new(binding, rx))
    }
}

// ----------------------------------------------------------------------
// Resolver
// ----------------------------------------------------------------------

/// Opens an in-memory stream for every source except the broken ones.
#[derive(Default)]
pub struct FakeResolver {
    broken: Mutex<HashSet<String>>,
    stream_delay: Mutex<Option<Duration>>,
    opened: Mutex<Vec<String>>,
    catalog: Mutex<Vec<Track>>,
    searches: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn break_track(&self, title: &str) {
        self.broken.lock().insert(format!("fake://{title}"));
    }

    /// Make every `open_stream` take `delay` before answering.
    pub fn delay_streams(&self, delay: Duration) {
        *self.stream_delay.lock() = Some(delay);
    }

    pub fn stock(&self, tracks: Vec<Track>) {
        *self.catalog.lock() = tracks;
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve_direct(&self, reference: &SourceRef) -> BridgeResult<Track> {
        Err(BridgeError::NotFound(reference.to_string()))
    }

    async fn search(&self, query: &str, limit: usize) -> BridgeResult<Vec<Track>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let query = query.to_lowercase();
        Ok(self
            .catalog
            .lock()
            .iter()
            .filter(|track| track.title().to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn open_stream(&self, source: &SourceRef) -> BridgeResult<AudioStream> {
        self.opened.lock().push(source.to_string());
        let delay = *self.stream_delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        if self.broken.lock().contains(source.as_str()) {
            return Err(BridgeError::StreamUnavailable(format!(
                "{source} is unavailable"
            )));
        }
        Ok(AudioStream::Memory(Bytes::from_static(b"\x00\x01")))
    }
}

// ----------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(GuildId, Notification)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn sent_to(&self, guild: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| id.as_str() == guild)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, guild: &GuildId, notification: Notification) -> BridgeResult<()> {
        self.sent.lock().push((guild.clone(), notification));
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

pub fn test_config() -> PlaybackConfig {
    PlaybackConfig {
        connect_timeout: Duration::from_millis(500),
        stream_timeout: Duration::from_millis(500),
        transport_call_timeout: Duration::from_millis(200),
        reconnect_grace: Duration::from_millis(50),
        ..PlaybackConfig::default()
    }
}

pub struct Harness {
    pub resolver: Arc<FakeResolver>,
    pub transport: Arc<FakeTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: EventBus,
    pub store: SessionStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        let resolver = FakeResolver::new();
        let transport = FakeTransport::new();
        let notifier = RecordingNotifier::new();
        let events = EventBus::new(256);
        let store = SessionStore::new(SessionContext {
            resolver: resolver.clone(),
            transport: transport.clone(),
            notifier: notifier.clone(),
            events: events.clone(),
            features: FeatureFlags::default(),
            config,
        });
        Self {
            resolver,
            transport,
            notifier,
            events,
            store,
        }
    }

    pub fn session(&self, id: &str) -> SessionHandle {
        self.store.get_or_create(&guild(id))
    }
}

pub async fn wait_for_state(session: &SessionHandle, state: PlaybackState) {
    let mut snapshots = session.subscribe();
    let reached = timeout(WAIT, snapshots.wait_for(|snapshot| snapshot.state == state))
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);
    assert!(
        reached,
        "session never reached {state}, last snapshot: {:?}",
        session.snapshot()
    );
}

/// Poll `check` until it holds or [`WAIT`] runs out.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = core_async::time::Instant::now() + WAIT;
    while !check() {
        assert!(
            core_async::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        sleep(Duration::from_millis(5)).await;
    }
}

pub fn drain_events(events: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// `(from, to)` pairs of the state changes in `events`.
pub fn transitions(events: &[CoreEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Playback(PlaybackEvent::StateChanged { from, to, .. }) => {
                Some((from.clone(), to.clone()))
            }
            _ => None,
        })
        .collect()
}
