//! Track metadata and the audio sources handed between resolver and voice
//! transport.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Placeholder used when the resolver could not determine an author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Opaque token the resolver understands (for yt-dlp, a watch URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference carries anything the resolver could act on.
    pub fn is_resolvable(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A playable item. Immutable once built; the `with_*` methods return a new
/// value.
///
/// Author and duration may be placeholders (`"Unknown"`, `0`) when the
/// resolver had nothing better.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    title: String,
    author: String,
    duration_seconds: u64,
    source_ref: SourceRef,
    thumbnail_url: Option<String>,
    requested_by: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, source_ref: SourceRef) -> Self {
        Self {
            title: title.into(),
            author: UNKNOWN_AUTHOR.to_string(),
            duration_seconds: 0,
            source_ref,
            thumbnail_url: None,
            requested_by: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_duration_seconds(mut self, seconds: u64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_requested_by(mut self, who: impl Into<String>) -> Self {
        self.requested_by = Some(who.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn source_ref(&self) -> &SourceRef {
        &self.source_ref
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    pub fn requested_by(&self) -> Option<&str> {
        self.requested_by.as_deref()
    }

    /// `M:SS`, or `"Unknown"` when the duration was not reported.
    pub fn display_duration(&self) -> String {
        if self.duration_seconds == 0 {
            return "Unknown".to_string();
        }
        let minutes = self.duration_seconds / 60;
        let seconds = self.duration_seconds % 60;
        format!("{minutes}:{seconds:02}")
    }
}

/// Decodable audio handed to a voice binding.
pub enum AudioStream {
    /// Raw container bytes read from a pipe (e.g. a child process stdout).
    Pipe(Box<DynAsyncRead>),
    /// A URL the transport fetches itself.
    RemoteUrl {
        url: String,
        headers: HashMap<String, String>,
    },
    /// Fully buffered audio.
    Memory(Bytes),
}

/// Dynamic async reader accepted as a pipe source.
pub type DynAsyncRead = dyn core_async::io::AsyncRead + Send + Unpin;

impl AudioStream {
    pub fn pipe<R>(reader: R) -> Self
    where
        R: core_async::io::AsyncRead + Send + Unpin + 'static,
    {
        AudioStream::Pipe(Box::new(reader))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AudioStream::RemoteUrl { .. })
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioStream::Pipe(_) => f.write_str("AudioStream::Pipe(..)"),
            AudioStream::RemoteUrl { url, .. } => {
                f.debug_struct("AudioStream::RemoteUrl").field("url", url).finish()
            }
            AudioStream::Memory(bytes) => write!(f, "AudioStream::Memory({} bytes)", bytes.len()),
        }
    }
}
