//! # Resolution Pipeline
//!
//! Turns a user request into an ordered list of playable candidates.
//!
//! Precedence:
//! 1. Classify. A link to the supported media host (youtube.com and its
//!    `www.`/`m.`/`music.` subdomains, youtu.be) is a direct reference;
//!    anything else is free text.
//! 2. A direct reference is looked up on its own. If the video id cannot be
//!    extracted, or the lookup fails, the original string is searched instead.
//! 3. Free text is searched with the caller's limit. Resolver errors and
//!    empty payloads both mean "no results".
//!
//! Every returned track has a non-empty title and a resolvable source
//! reference. Resolver errors never escape [`ResolutionPipeline::resolve`].

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{SourceRef, Track, TrackResolver};
use core_async::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

/// Title used when the resolver returned an entry without one.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

const VIDEO_ID_LEN: usize = 11;
const HOST_SUFFIXES: &[&str] = &["youtube.com", "youtu.be"];
const HOST_PREFIXES: &[&str] = &["www.", "m.", "music."];
const ID_PATH_SEGMENTS: &[&str] = &["embed", "v", "e", "shorts", "live"];

/// How a query string will be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Link to the supported host with an extractable video id.
    DirectReference { video_id: String },
    /// Looks like a link to the supported host but names no video.
    MalformedLink,
    FreeText,
}

impl QueryKind {
    /// Classify a (trimmed) query.
    pub fn classify(query: &str) -> Self {
        let Some(link) = parse_host_link(query) else {
            return QueryKind::FreeText;
        };
        match extract_video_id(&link) {
            Some(video_id) => QueryKind::DirectReference { video_id },
            None => QueryKind::MalformedLink,
        }
    }
}

/// Canonical watch URL handed to the resolver for a direct reference.
pub fn watch_url(video_id: &str) -> SourceRef {
    SourceRef::new(format!("https://www.youtube.com/watch?v={video_id}"))
}

fn has_http_scheme(query: &str) -> bool {
    let lower = query.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

fn is_supported_host(host: &str) -> bool {
    let rest = HOST_PREFIXES
        .iter()
        .find_map(|prefix| host.strip_prefix(*prefix))
        .unwrap_or(host);
    HOST_SUFFIXES.contains(&rest)
}

/// Parse `query` as a URL on the supported host. Scheme-less links are
/// accepted; links carrying credentials are not.
fn parse_host_link(query: &str) -> Option<Url> {
    let url = if has_http_scheme(query) {
        Url::parse(query)
    } else {
        Url::parse(&format!("https://{query}"))
    }
    .ok()?;

    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    is_supported_host(&host).then_some(url)
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn extract_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if host.ends_with("youtu.be") {
        segments.next().map(str::to_string)
    } else {
        let from_query = url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
        from_query.or_else(|| match (segments.next(), segments.next()) {
            (Some(kind), Some(id)) if ID_PATH_SEGMENTS.contains(&kind) => Some(id.to_string()),
            _ => None,
        })
    };

    candidate.filter(|id| is_video_id(id))
}

/// Drop unusable entries and fill placeholders.
fn sanitize(track: Track) -> Option<Track> {
    if !track.source_ref().is_resolvable() {
        return None;
    }
    let track = if track.title().trim().is_empty() {
        track.with_title(UNKNOWN_TITLE)
    } else {
        track
    };
    let track = if track.author().trim().is_empty() {
        track.with_author(bridge_traits::media::UNKNOWN_AUTHOR)
    } else {
        track
    };
    Some(track)
}

/// Query resolution on top of a [`TrackResolver`].
#[derive(Clone)]
pub struct ResolutionPipeline {
    resolver: Arc<dyn TrackResolver>,
    lookup_timeout: Duration,
}

impl ResolutionPipeline {
    pub fn new(resolver: Arc<dyn TrackResolver>, lookup_timeout: Duration) -> Self {
        Self {
            resolver,
            lookup_timeout,
        }
    }

    /// Resolve `query` into at most `max_results` candidates.
    ///
    /// An empty (or whitespace) query returns no candidates without calling
    /// the resolver.
    #[instrument(skip(self), fields(kind))]
    pub async fn resolve(&self, query: &str, max_results: usize) -> Vec<Track> {
        let query = query.trim();
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let kind = QueryKind::classify(query);
        tracing::Span::current().record("kind", tracing::field::debug(&kind));

        match kind {
            QueryKind::DirectReference { video_id } => {
                if let Some(track) = self.lookup_direct(&video_id).await {
                    return vec![track];
                }
                debug!("direct lookup failed, searching original text");
                self.search(query, max_results).await
            }
            QueryKind::MalformedLink => {
                debug!("link names no video, searching original text");
                self.search(query, max_results).await
            }
            QueryKind::FreeText => self.search(query, max_results).await,
        }
    }

    /// Free-text search only; no link classification.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<Track> {
        let query = query.trim();
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let found = match timeout(self.lookup_timeout, self.resolver.search(query, max_results)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(error = %err, "search failed, treating as no results");
                return Vec::new();
            }
            Err(_) => {
                warn!(timeout = ?self.lookup_timeout, "search timed out, treating as no results");
                return Vec::new();
            }
        };

        let raw = found.len();
        let tracks: Vec<Track> = found
            .into_iter()
            .filter_map(sanitize)
            .take(max_results)
            .collect();
        if tracks.len() < raw.min(max_results) {
            debug!(raw, kept = tracks.len(), "dropped unusable search entries");
        }
        tracks
    }

    async fn lookup_direct(&self, video_id: &str) -> Option<Track> {
        let reference = watch_url(video_id);
        match timeout(self.lookup_timeout, self.resolver.resolve_direct(&reference)).await {
            Ok(Ok(track)) => sanitize(track),
            Ok(Err(err)) => {
                debug!(video_id, error = %err, "direct lookup failed");
                None
            }
            Err(_) => {
                debug!(video_id, "direct lookup timed out");
                None
            }
        }
    }
}
