//! # Playback Session
//!
//! One actor task per guild owns the queue, the playback state and the voice
//! binding. Commands arrive over a bounded channel and are applied strictly
//! in arrival order; the actor's `select!` loop is the only writer.
//!
//! ## Overview
//!
//! - Connecting to voice and opening a stream run in spawned tasks guarded
//!   by a per-attempt [`CancellationToken`], so `stop` can interrupt either
//!   one without waiting for it.
//! - Every stream handed to the binding carries a fresh [`PlaybackToken`].
//!   `Finished`/`Errored` signals with an older token are ignored, which is
//!   what keeps a `skip` racing a natural finish from advancing twice.
//! - A consistent [`QueueSnapshot`] is published through a `watch` channel
//!   after every handled message.
//! - Notifications go through a separate per-session task so a slow sink
//!   never stalls the actor.

use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult, AudioStream, BridgeError, ChannelRef, GuildId, Notification,
    NotificationSink, PlaybackToken, Track, TrackResolver, VoiceBinding, VoiceConnection,
    VoiceSignal, VoiceTransport,
};
use core_async::select;
use core_async::sync::{mpsc, oneshot, watch, CancellationToken};
use core_async::task::spawn;
use core_async::time::{sleep, timeout, Duration, Sleep};
use core_runtime::config::FeatureFlags;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, SessionEvent};
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result, StateViolation};
use crate::queue::TrackQueue;
use crate::state::{PlayAccepted, PlaybackState, QueueSnapshot};

/// Unique id of one session actor. A guild that is removed and later
/// recreated gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collaborators and settings shared by every session of a store.
#[derive(Clone)]
pub struct SessionContext {
    pub resolver: Arc<dyn TrackResolver>,
    pub transport: Arc<dyn VoiceTransport>,
    pub notifier: Arc<dyn NotificationSink>,
    pub events: EventBus,
    pub features: FeatureFlags,
    pub config: PlaybackConfig,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Play {
        channel: ChannelRef,
        track: Track,
        reply: Reply<PlayAccepted>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Skip {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    SetVolume {
        level: i32,
        reply: oneshot::Sender<u8>,
    },
}

/// Cheap, cloneable front door to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    guild_id: GuildId,
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<QueueSnapshot>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("guild_id", &self.guild_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionHandle {
    /// Start the actor and notifier tasks for `guild_id`.
    ///
    /// Must be called from within the async runtime.
    pub fn spawn(guild_id: GuildId, ctx: SessionContext) -> Self {
        let id = SessionId::new();
        let volume = ctx.config.default_volume.min(100);
        let (command_tx, command_rx) = mpsc::channel(ctx.config.command_buffer.max(1));
        let (snapshot_tx, snapshot_rx) =
            watch::channel(QueueSnapshot::empty(guild_id.clone(), volume));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let span = info_span!("session", guild_id = %guild_id, session_id = %id);

        spawn(
            run_notifier(guild_id.clone(), Arc::clone(&ctx.notifier), notice_rx)
                .instrument(span.clone()),
        );

        let actor = SessionActor {
            guild_id: guild_id.clone(),
            ctx,
            queue: TrackQueue::new(),
            state: PlaybackState::Idle,
            loop_enabled: false,
            volume,
            channel: None,
            binding: None,
            signals: None,
            current: PlaybackToken::new(0),
            connect_attempt: 0,
            in_flight: None,
            connect_waiters: Vec::new(),
            grace: None,
            task_tx,
            task_rx,
            snapshot_tx,
            notices: notice_tx,
            shutdown: shutdown.clone(),
        };
        spawn(actor.run(command_rx).instrument(span));

        Self {
            id,
            guild_id,
            commands: command_tx,
            snapshot: snapshot_rx,
            shutdown,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    /// Enqueue `track`, joining `channel` first if the session is idle.
    ///
    /// When this call starts playback the reply waits for the voice
    /// connection, so a connect failure is reported here. A failure to open
    /// the stream is not: the track is dropped, the sink is notified and the
    /// next track is tried.
    pub async fn play(&self, channel: ChannelRef, track: Track) -> Result<PlayAccepted> {
        self.request(|reply| Command::Play {
            channel,
            track,
            reply,
        })
        .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    /// Resume a paused track. An idle session holding tracks that never
    /// started (after a failed connect) retries the connection instead.
    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(|reply| Command::Skip { reply }).await?
    }

    /// Release the voice binding and clear the queue. Safe to repeat.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    /// Flip loop mode and return the new value.
    pub async fn toggle_loop(&self) -> Result<bool> {
        self.request(|reply| Command::ToggleLoop { reply }).await
    }

    /// Clamp `level` to `0..=100`, store it and apply it to the live binding.
    /// Returns the level actually applied.
    pub async fn set_volume(&self, level: i32) -> Result<u8> {
        self.request(|reply| Command::SetVolume { level, reply })
            .await
    }

    /// Latest published snapshot. Never blocks on the actor.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch every snapshot the actor publishes.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshot.clone()
    }

    /// Ask the actor to release its resources and exit.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.commands.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| self.closed_error())?;
        response.await.map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> PlaybackError {
        PlaybackError::SessionClosed {
            guild_id: self.guild_id.to_string(),
        }
    }
}

/// Long-running work reported back to the actor.
enum TaskOutcome {
    Connected {
        attempt: u64,
        result: Result<VoiceConnection>,
    },
    StreamOpened {
        token: PlaybackToken,
        result: std::result::Result<AudioStream, String>,
    },
}

enum InFlight {
    Connect {
        attempt: u64,
        cancel: CancellationToken,
    },
    Stream {
        token: PlaybackToken,
        cancel: CancellationToken,
    },
}

impl InFlight {
    fn cancel(self) {
        match self {
            InFlight::Connect { cancel, .. } | InFlight::Stream { cancel, .. } => cancel.cancel(),
        }
    }
}

/// A request whose reply is held until the voice connection settles.
enum ConnectWaiter {
    Play {
        position: usize,
        reply: Reply<PlayAccepted>,
    },
    Resume {
        reply: Reply<()>,
    },
}

impl ConnectWaiter {
    fn succeed(self) {
        match self {
            ConnectWaiter::Play { position, reply } => {
                let _ = reply.send(Ok(PlayAccepted {
                    position,
                    started: true,
                }));
            }
            ConnectWaiter::Resume { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn fail(self, err: PlaybackError) {
        match self {
            ConnectWaiter::Play { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            ConnectWaiter::Resume { reply } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

struct SessionActor {
    guild_id: GuildId,
    ctx: SessionContext,
    queue: TrackQueue,
    state: PlaybackState,
    loop_enabled: bool,
    volume: u8,
    /// Channel of the most recent `play`, reused for connect retries.
    channel: Option<ChannelRef>,
    binding: Option<Arc<dyn VoiceBinding>>,
    signals: Option<mpsc::UnboundedReceiver<VoiceSignal>>,
    /// Token of the latest stream attempt.
    current: PlaybackToken,
    connect_attempt: u64,
    in_flight: Option<InFlight>,
    connect_waiters: Vec<ConnectWaiter>,
    /// Armed while waiting for the transport to recover a dropped connection.
    grace: Option<Pin<Box<Sleep>>>,
    task_tx: mpsc::UnboundedSender<TaskOutcome>,
    task_rx: mpsc::UnboundedReceiver<TaskOutcome>,
    snapshot_tx: watch::Sender<QueueSnapshot>,
    notices: mpsc::UnboundedSender<Notification>,
    shutdown: CancellationToken,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        debug!("session actor started");
        self.publish();

        loop {
            select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(outcome) = self.task_rx.recv() => self.handle_outcome(outcome).await,
                signal = next_signal(&mut self.signals) => self.handle_signal(signal).await,
                _ = grace_elapsed(&mut self.grace) => self.handle_grace_expired().await,
            }
            self.publish();
        }

        self.stop().await;
        self.publish();
        debug!("session actor exited");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Play {
                channel,
                track,
                reply,
            } => self.play(channel, track, reply),
            Command::Pause { reply } => {
                let result = self.pause().await;
                self.respond(reply, result);
            }
            Command::Resume { reply } => self.resume(reply).await,
            Command::Skip { reply } => {
                let result = self.skip().await;
                self.respond(reply, result);
            }
            Command::Stop { reply } => {
                self.stop().await;
                self.respond(reply, Ok(()));
            }
            Command::ToggleLoop { reply } => {
                let enabled = self.toggle_loop();
                self.respond(reply, enabled);
            }
            Command::SetVolume { level, reply } => {
                let applied = self.set_volume(level).await;
                self.respond(reply, applied);
            }
        }
    }

    /// Publish first so the caller never reads a snapshot older than its
    /// own command.
    fn respond<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    #[instrument(skip_all, fields(title = %track.title()))]
    fn play(&mut self, channel: ChannelRef, track: Track, reply: Reply<PlayAccepted>) {
        let position = self.queue.append(track);
        self.channel = Some(channel);
        debug!(position, "track enqueued");

        if self.state == PlaybackState::Idle && self.in_flight.is_none() {
            self.connect_waiters
                .push(ConnectWaiter::Play { position, reply });
            self.begin_connect();
        } else {
            self.respond(
                reply,
                Ok(PlayAccepted {
                    position,
                    started: false,
                }),
            );
        }
    }

    async fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Err(StateViolation::NotPlaying.into());
        }
        if let Some(binding) = self.binding.clone() {
            // A stream still opening has nothing to pause yet; it is paused
            // as soon as it reaches the binding.
            if self.in_flight.is_none() {
                bounded(self.call_limit(), "pause", binding.pause()).await?;
            }
        }
        self.set_state(PlaybackState::Paused);
        Ok(())
    }

    async fn resume(&mut self, reply: Reply<()>) {
        match self.state {
            PlaybackState::Paused => {
                let result = self.resume_binding().await;
                self.respond(reply, result);
            }
            PlaybackState::Idle
                if self.in_flight.is_none()
                    && !self.queue.is_empty()
                    && self.channel.is_some() =>
            {
                info!(pending = self.queue.len(), "retrying voice connection");
                self.connect_waiters.push(ConnectWaiter::Resume { reply });
                self.begin_connect();
            }
            _ => self.respond(reply, Err(StateViolation::NotPaused.into())),
        }
    }

    async fn resume_binding(&mut self) -> Result<()> {
        if let Some(binding) = self.binding.clone() {
            if self.in_flight.is_none() {
                bounded(self.call_limit(), "resume", binding.resume()).await?;
            }
        }
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    #[instrument(skip(self), fields(queued = self.queue.len()))]
    async fn skip(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(StateViolation::NotPlaying.into());
        }
        if self.queue.len() <= 1 {
            return Err(StateViolation::NothingToSkipTo.into());
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel();
        }
        // Invalidate the current token before the binding reports the
        // stopped stream as finished.
        self.current = self.current.next();
        if let Some(binding) = self.binding.clone() {
            if let Err(err) = bounded(self.call_limit(), "stop", binding.stop()).await {
                warn!(error = %err, "failed to stop current stream");
            }
        }

        self.queue.advance(self.loop_enabled);
        self.set_state(PlaybackState::Playing);
        self.start_head().await;
        Ok(())
    }

    /// Release everything and settle in `Idle`. Also used for grace expiry
    /// and actor teardown.
    async fn stop(&mut self) {
        let had_work = self.state != PlaybackState::Idle
            || !self.queue.is_empty()
            || self.binding.is_some()
            || self.in_flight.is_some();

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel();
        }
        self.grace = None;
        self.fail_waiters(PlaybackError::ConnectFailed(
            "connection attempt cancelled".to_string(),
        ));
        self.current = self.current.next();
        self.release_binding().await;
        self.queue.clear();

        if had_work {
            info!("playback stopped");
            self.set_state(PlaybackState::Stopped);
            self.publish();
        }
        self.set_state(PlaybackState::Idle);
    }

    fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        debug!(enabled = self.loop_enabled, "loop toggled");
        self.emit(PlaybackEvent::LoopToggled {
            guild_id: self.guild_id.to_string(),
            enabled: self.loop_enabled,
        });
        self.loop_enabled
    }

    async fn set_volume(&mut self, level: i32) -> u8 {
        self.volume = level.clamp(0, 100) as u8;
        self.apply_volume().await;
        self.emit(PlaybackEvent::VolumeChanged {
            guild_id: self.guild_id.to_string(),
            level: self.volume,
        });
        self.volume
    }

    // ------------------------------------------------------------------
    // Connect and stream
    // ------------------------------------------------------------------

    fn begin_connect(&mut self) {
        let Some(channel) = self.channel.clone() else {
            self.fail_waiters(PlaybackError::NoVoiceChannel);
            return;
        };

        self.connect_attempt += 1;
        let attempt = self.connect_attempt;
        let cancel = self.shutdown.child_token();
        self.in_flight = Some(InFlight::Connect {
            attempt,
            cancel: cancel.clone(),
        });
        self.set_state(PlaybackState::Connecting);
        debug!(attempt, channel = %channel, "connecting to voice");

        let transport = Arc::clone(&self.ctx.transport);
        let guild_id = self.guild_id.clone();
        let limit = self.ctx.config.connect_timeout;
        let outcomes = self.task_tx.clone();

        spawn(
            async move {
                let result = select! {
                    _ = cancel.cancelled() => return,
                    result = timeout(limit, transport.connect(&guild_id, &channel)) => match result {
                        Ok(Ok(connection)) => Ok(connection),
                        Ok(Err(err)) => Err(connect_error(err)),
                        Err(_) => Err(PlaybackError::ConnectFailed(format!(
                            "timed out after {}ms",
                            limit.as_millis()
                        ))),
                    },
                };
                let _ = outcomes.send(TaskOutcome::Connected { attempt, result });
            }
            .in_current_span(),
        );
    }

    /// Open the head track's stream under a fresh token.
    async fn start_head(&mut self) {
        let Some(head) = self.queue.head() else {
            self.finish_queue().await;
            return;
        };
        let source = head.source_ref().clone();
        let title = head.title().to_string();

        self.current = self.current.next();
        let token = self.current;
        let cancel = self.shutdown.child_token();
        self.in_flight = Some(InFlight::Stream {
            token,
            cancel: cancel.clone(),
        });
        debug!(%token, %title, "opening stream");

        let resolver = Arc::clone(&self.ctx.resolver);
        let limit = self.ctx.config.stream_timeout;
        let outcomes = self.task_tx.clone();

        spawn(
            async move {
                let result = select! {
                    _ = cancel.cancelled() => return,
                    result = timeout(limit, resolver.open_stream(&source)) => match result {
                        Ok(Ok(stream)) => Ok(stream),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(_) => Err(format!(
                            "stream did not open within {}ms",
                            limit.as_millis()
                        )),
                    },
                };
                let _ = outcomes.send(TaskOutcome::StreamOpened { token, result });
            }
            .in_current_span(),
        );
    }

    async fn handle_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Connected { attempt, result } => self.on_connected(attempt, result).await,
            TaskOutcome::StreamOpened { token, result } => {
                self.on_stream_opened(token, result).await
            }
        }
    }

    async fn on_connected(&mut self, attempt: u64, result: Result<VoiceConnection>) {
        let is_current = matches!(
            &self.in_flight,
            Some(InFlight::Connect { attempt: pending, .. }) if *pending == attempt
        );
        if !is_current {
            if let Ok(connection) = result {
                debug!(attempt, "releasing superseded voice connection");
                let binding = connection.binding;
                let limit = self.ctx.config.transport_call_timeout;
                spawn(
                    async move {
                        let _ = timeout(limit, binding.disconnect()).await;
                    }
                    .in_current_span(),
                );
            }
            return;
        }
        self.in_flight = None;

        match result {
            Ok(connection) => {
                info!("voice connection established");
                self.binding = Some(connection.binding);
                self.signals = Some(connection.signals);
                self.apply_volume().await;
                self.publish();
                for waiter in self.connect_waiters.drain(..) {
                    waiter.succeed();
                }
                self.start_head().await;
            }
            Err(err) => {
                warn!(error = %err, pending = self.queue.len(), "voice connection failed");
                self.set_state(PlaybackState::Idle);
                self.fail_waiters(err);
            }
        }
    }

    async fn on_stream_opened(
        &mut self,
        token: PlaybackToken,
        result: std::result::Result<AudioStream, String>,
    ) {
        let is_current = matches!(
            &self.in_flight,
            Some(InFlight::Stream { token: pending, .. }) if *pending == token
        );
        if !is_current {
            debug!(%token, "discarding stale stream");
            return;
        }
        self.in_flight = None;

        let Some(binding) = self.binding.clone() else {
            return;
        };
        let outcome = match result {
            Ok(stream) => bounded(self.call_limit(), "play", binding.play(stream, token))
                .await
                .map_err(|err| err.to_string()),
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(()) => self.on_track_started(binding).await,
            Err(reason) => self.on_track_failed(reason).await,
        }
    }

    async fn on_track_started(&mut self, binding: Arc<dyn VoiceBinding>) {
        if self.state == PlaybackState::Paused {
            if let Err(err) = bounded(self.call_limit(), "pause", binding.pause()).await {
                warn!(error = %err, "could not keep new track paused");
                self.set_state(PlaybackState::Playing);
            }
        } else {
            self.set_state(PlaybackState::Playing);
        }

        let Some(track) = self.queue.head().cloned() else {
            return;
        };
        info!(title = %track.title(), token = %self.current, "now playing");
        self.emit(PlaybackEvent::TrackStarted {
            guild_id: self.guild_id.to_string(),
            title: track.title().to_string(),
            source_ref: track.source_ref().to_string(),
        });
        if self.ctx.features.announce_now_playing {
            self.notify(Notification::NowPlaying { track });
        }
    }

    /// Drop the head (never requeued, even in loop mode) and move on.
    async fn on_track_failed(&mut self, reason: String) {
        let Some(track) = self.queue.discard_head() else {
            return;
        };
        warn!(title = %track.title(), %reason, remaining = self.queue.len(), "dropping unplayable track");
        self.emit(PlaybackEvent::TrackFailed {
            guild_id: self.guild_id.to_string(),
            title: track.title().to_string(),
            reason: reason.clone(),
        });
        if self.ctx.features.announce_track_failures {
            self.notify(Notification::TrackFailed { track, reason });
        }
        self.start_head().await;
    }

    async fn finish_queue(&mut self) {
        info!("queue ended");
        self.release_binding().await;
        self.set_state(PlaybackState::Idle);
        self.emit(PlaybackEvent::QueueEnded {
            guild_id: self.guild_id.to_string(),
        });
        if self.ctx.features.announce_queue_end {
            self.notify(Notification::QueueEnded);
        }
    }

    // ------------------------------------------------------------------
    // Transport signals
    // ------------------------------------------------------------------

    async fn handle_signal(&mut self, signal: Option<VoiceSignal>) {
        let Some(signal) = signal else {
            // The transport dropped its sender without saying goodbye.
            self.signals = None;
            if self.binding.is_some() {
                self.on_disconnected();
            }
            return;
        };

        match signal {
            VoiceSignal::Finished { token } => {
                if token != self.current || self.in_flight.is_some() {
                    debug!(%token, current = %self.current, "ignoring stale finish");
                    return;
                }
                debug!(%token, "track finished");
                if self.queue.advance(self.loop_enabled).is_some() {
                    self.start_head().await;
                } else {
                    self.finish_queue().await;
                }
            }
            VoiceSignal::Errored { token, reason } => {
                if token != self.current || self.in_flight.is_some() {
                    debug!(%token, "ignoring stale error");
                    return;
                }
                self.on_track_failed(reason).await;
            }
            VoiceSignal::Disconnected => self.on_disconnected(),
            VoiceSignal::Reconnected => {
                if self.grace.take().is_some() {
                    info!("voice connection recovered");
                    self.emit_session(SessionEvent::Reconnected {
                        guild_id: self.guild_id.to_string(),
                    });
                }
            }
        }
    }

    fn on_disconnected(&mut self) {
        if self.binding.is_none() || self.grace.is_some() {
            return;
        }
        let grace = self.ctx.config.reconnect_grace;
        warn!(grace_ms = grace.as_millis() as u64, "voice connection lost");
        self.grace = Some(Box::pin(sleep(grace)));
        self.emit_session(SessionEvent::ConnectionLost {
            guild_id: self.guild_id.to_string(),
        });
    }

    async fn handle_grace_expired(&mut self) {
        self.grace = None;
        warn!("no reconnect within grace period, stopping");
        self.emit_session(SessionEvent::GraceExpired {
            guild_id: self.guild_id.to_string(),
        });
        self.notify(Notification::ConnectionLost);
        self.stop().await;
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn release_binding(&mut self) {
        self.signals = None;
        if let Some(binding) = self.binding.take() {
            let limit = self.call_limit();
            if let Err(err) = bounded(limit, "disconnect", binding.disconnect()).await {
                warn!(error = %err, "voice disconnect failed");
            }
        }
    }

    async fn apply_volume(&mut self) {
        if let Some(binding) = self.binding.clone() {
            let limit = self.call_limit();
            if let Err(err) = bounded(limit, "set_volume", binding.set_volume(self.volume)).await {
                warn!(error = %err, level = self.volume, "failed to apply volume");
            }
        }
    }

    fn call_limit(&self) -> Duration {
        self.ctx.config.transport_call_timeout
    }

    fn fail_waiters(&mut self, err: PlaybackError) {
        if self.connect_waiters.is_empty() {
            return;
        }
        self.publish();
        for waiter in self.connect_waiters.drain(..) {
            waiter.fail(err.clone());
        }
    }

    fn set_state(&mut self, next: PlaybackState) {
        if self.state == next {
            return;
        }
        debug!(from = %self.state, to = %next, "state transition");
        self.emit(PlaybackEvent::StateChanged {
            guild_id: self.guild_id.to_string(),
            from: self.state.to_string(),
            to: next.to_string(),
        });
        self.state = next;
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn snapshot(&self) -> QueueSnapshot {
        let (now_playing, upcoming) = if self.state == PlaybackState::Idle {
            (None, self.queue.iter().cloned().collect())
        } else {
            (
                self.queue.head().cloned(),
                self.queue.upcoming().cloned().collect(),
            )
        };
        QueueSnapshot {
            guild_id: self.guild_id.clone(),
            state: self.state,
            now_playing,
            upcoming,
            loop_enabled: self.loop_enabled,
            volume: self.volume,
        }
    }

    fn notify(&self, notification: Notification) {
        if self.notices.send(notification).is_err() {
            debug!("notifier task is gone, dropping notification");
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.ctx.events.emit(CoreEvent::Playback(event));
    }

    fn emit_session(&self, event: SessionEvent) {
        let _ = self.ctx.events.emit(CoreEvent::Session(event));
    }
}

fn connect_error(err: BridgeError) -> PlaybackError {
    match err {
        BridgeError::ConnectFailed(reason) => PlaybackError::ConnectFailed(reason),
        other => PlaybackError::ConnectFailed(other.to_string()),
    }
}

/// Run one binding call under the transport call timeout.
async fn bounded<F>(limit: Duration, operation: &'static str, call: F) -> Result<()>
where
    F: Future<Output = BridgeResult<()>>,
{
    match timeout(limit, call).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(PlaybackError::Transport(err.to_string())),
        Err(_) => Err(PlaybackError::Transport(format!("{operation} timed out"))),
    }
}

async fn next_signal(
    signals: &mut Option<mpsc::UnboundedReceiver<VoiceSignal>>,
) -> Option<VoiceSignal> {
    match signals {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

async fn grace_elapsed(grace: &mut Option<Pin<Box<Sleep>>>) {
    match grace {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

/// Deliver notifications in order. Sink failures are logged and dropped.
async fn run_notifier(
    guild_id: GuildId,
    sink: Arc<dyn NotificationSink>,
    mut notices: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = notices.recv().await {
        if let Err(err) = sink.send(&guild_id, notification).await {
            warn!(error = %err, "notification delivery failed");
        }
    }
}
