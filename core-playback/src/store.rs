//! # Session Store
//!
//! Maps each guild to its playback session. Lookups and lazy creation are
//! atomic per guild id; the lock is never held across an `.await`.

use std::collections::HashMap;

use bridge_traits::GuildId;
use core_runtime::events::{CoreEvent, SessionEvent};
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::session::{SessionContext, SessionHandle};

pub struct SessionStore {
    ctx: SessionContext,
    sessions: Mutex<HashMap<GuildId, SessionHandle>>,
}

impl SessionStore {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Return the guild's session, spawning it on first use.
    ///
    /// Concurrent callers for the same guild always get the same session. A
    /// session whose actor has exited is replaced.
    pub fn get_or_create(&self, guild_id: &GuildId) -> SessionHandle {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(guild_id) {
            if !existing.is_closed() {
                return existing.clone();
            }
            debug!(guild_id = %guild_id, "replacing closed session");
        }

        let handle = SessionHandle::spawn(guild_id.clone(), self.ctx.clone());
        sessions.insert(guild_id.clone(), handle.clone());
        drop(sessions);

        info!(guild_id = %guild_id, session_id = %handle.id(), "session created");
        let _ = self.ctx.events.emit(CoreEvent::Session(SessionEvent::Created {
            guild_id: guild_id.to_string(),
        }));
        handle
    }

    /// Existing session, if any. Never creates one.
    pub fn get(&self, guild_id: &GuildId) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .get(guild_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Detach the guild's session and shut its actor down. The actor
    /// releases any voice binding it still holds on the way out.
    pub fn remove(&self, guild_id: &GuildId) -> Option<SessionHandle> {
        let removed = self.sessions.lock().remove(guild_id)?;
        removed.close();
        info!(guild_id = %guild_id, "session removed");
        let _ = self.ctx.events.emit(CoreEvent::Session(SessionEvent::Removed {
            guild_id: guild_id.to_string(),
        }));
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Guild ids with a registered session, sorted.
    pub fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop and remove every session concurrently. Returns how many were
    /// shut down.
    pub async fn shutdown_all(&self) -> usize {
        let drained: Vec<(GuildId, SessionHandle)> = self.sessions.lock().drain().collect();
        let count = drained.len();

        join_all(drained.into_iter().map(|(guild_id, handle)| async move {
            if let Err(err) = handle.stop().await {
                debug!(guild_id = %guild_id, error = %err, "session already closed");
            }
            handle.close();
            let _ = self.ctx.events.emit(CoreEvent::Session(SessionEvent::Removed {
                guild_id: guild_id.to_string(),
            }));
        }))
        .await;

        if count > 0 {
            info!(count, "all sessions shut down");
        }
        count
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}
