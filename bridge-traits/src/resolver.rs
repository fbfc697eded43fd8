//! Track resolution contract.
//!
//! The engine never talks to a media host directly. A resolver turns a
//! direct reference or a free-text query into [`Track`] metadata and, later,
//! turns a track's [`SourceRef`] into a decodable [`AudioStream`].

use async_trait::async_trait;

use crate::error::Result;
use crate::media::{AudioStream, SourceRef, Track};

/// Host-provided metadata and audio lookup.
///
/// # Errors
///
/// - `resolve_direct` returns [`BridgeError::NotFound`](crate::BridgeError::NotFound)
///   when the reference does not name playable content.
/// - `search` may fail with any error; callers treat failures and empty
///   lists the same ("no results").
/// - `open_stream` returns
///   [`BridgeError::StreamUnavailable`](crate::BridgeError::StreamUnavailable)
///   for dead links or blocked content.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Look up metadata for a single direct reference.
    async fn resolve_direct(&self, reference: &SourceRef) -> Result<Track>;

    /// Return up to `limit` candidates in the resolver's own relevance order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>>;

    /// Open a decodable stream for a previously resolved track.
    async fn open_stream(&self, source: &SourceRef) -> Result<AudioStream>;
}
