//! # Queue Controller
//!
//! Ordered track storage for one session. Index 0 is the current track
//! whenever the session is not idle.
//!
//! The queue has no interior locking and never triggers playback. Every
//! mutation goes through the owning session actor, which serializes them.

use bridge_traits::Track;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the tail and return the new length.
    pub fn append(&mut self, track: Track) -> usize {
        self.tracks.push_back(track);
        self.tracks.len()
    }

    /// Remove the head and return the new head.
    ///
    /// With `loop_enabled` the removed head is re-appended to the tail, so a
    /// single-track queue is unchanged.
    pub fn advance(&mut self, loop_enabled: bool) -> Option<&Track> {
        if let Some(finished) = self.tracks.pop_front() {
            if loop_enabled {
                self.tracks.push_back(finished);
            }
        }
        self.tracks.front()
    }

    /// Remove the head without requeueing it, regardless of loop mode.
    ///
    /// Used when the head could not be played; requeueing a broken track
    /// under loop mode would retry it forever.
    pub fn discard_head(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn head(&self) -> Option<&Track> {
        self.tracks.front()
    }

    /// Everything after the head, in play order.
    pub fn upcoming(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().skip(1)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }
}
