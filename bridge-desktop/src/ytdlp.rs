//! Track resolver backed by the `yt-dlp` command line tool.
//!
//! Search and direct lookups run `yt-dlp --dump-json` and parse one JSON
//! object per output line. Streams are the stdout of a long-running
//! `yt-dlp -o -` child; the child is killed when the stream is dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    AudioStream, SourceRef, Track, TrackResolver,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

const DEFAULT_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";

fn default_binary() -> PathBuf {
    PathBuf::from(if cfg!(windows) { "yt-dlp.exe" } else { "yt-dlp" })
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_fragment_retries() -> u32 {
    3
}

/// How to invoke `yt-dlp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Executable name or path.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// Netscape cookies file. Passed only when the file exists.
    #[serde(default)]
    pub cookies_path: Option<PathBuf>,

    /// Format selector for streaming.
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_fragment_retries")]
    pub fragment_retries: u32,

    /// Appended before the target on every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            cookies_path: None,
            format: default_format(),
            fragment_retries: default_fragment_retries(),
            extra_args: Vec::new(),
        }
    }
}

impl YtDlpConfig {
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_path = Some(path.into());
        self
    }

    fn cookie_args(&self) -> Vec<String> {
        match &self.cookies_path {
            Some(path) if path.is_file() => {
                vec!["--cookies".to_string(), path.to_string_lossy().into_owned()]
            }
            Some(path) => {
                debug!(
                    cookies = %file_name(path),
                    "cookies file missing, continuing without it"
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn finish(&self, mut args: Vec<String>, target: String) -> Vec<String> {
        args.extend(self.cookie_args());
        args.extend(self.extra_args.iter().cloned());
        args.push(target);
        args
    }

    pub(crate) fn search_args(&self, query: &str, limit: usize) -> Vec<String> {
        let args = ["--dump-json", "--flat-playlist", "--no-warnings", "--quiet"]
            .map(String::from)
            .to_vec();
        self.finish(args, format!("ytsearch{limit}:{query}"))
    }

    pub(crate) fn lookup_args(&self, url: &str) -> Vec<String> {
        let args = [
            "--dump-json",
            "--no-playlist",
            "--skip-download",
            "--no-warnings",
            "--quiet",
        ]
        .map(String::from)
        .to_vec();
        self.finish(args, url.to_string())
    }

    pub(crate) fn stream_args(&self, url: &str) -> Vec<String> {
        let args = vec![
            "-o".to_string(),
            "-".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "--no-part".to_string(),
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--fragment-retries".to_string(),
            self.fragment_retries.to_string(),
            "--buffer-size".to_string(),
            "16K".to_string(),
        ];
        self.finish(args, url.to_string())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One entry of `--dump-json` output. Flat-playlist entries carry only a
/// subset of these.
#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    url: Option<String>,
    thumbnail: Option<String>,
}

impl Entry {
    fn into_track(self) -> Option<Track> {
        let source = self
            .webpage_url
            .or_else(|| {
                self.id
                    .as_ref()
                    .map(|id| format!("https://www.youtube.com/watch?v={id}"))
            })
            .or(self.url)?;

        let mut track = Track::new(self.title.unwrap_or_default(), SourceRef::new(source));
        if let Some(author) = self.uploader.or(self.channel) {
            track = track.with_author(author);
        }
        if let Some(seconds) = self.duration.filter(|d| d.is_finite() && *d > 0.0) {
            track = track.with_duration_seconds(seconds.round() as u64);
        }
        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail_url(thumbnail);
        }
        Some(track)
    }
}

/// Parse JSON-lines output, skipping lines that are not entries.
pub(crate) fn parse_entries(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<Entry>(line) {
            Ok(entry) => entry.into_track(),
            Err(err) => {
                debug!(error = %err, "skipping unparsable yt-dlp line");
                None
            }
        })
        .collect()
}

/// Audio bytes from a `yt-dlp` child process.
///
/// Owns the child; dropping the stream kills the process.
pub struct ProcessStream {
    stdout: ChildStdout,
    _child: Child,
}

impl AsyncRead for ProcessStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

/// [`TrackResolver`] that shells out to `yt-dlp`.
#[derive(Debug, Clone, Default)]
pub struct YtDlpResolver {
    config: YtDlpConfig,
}

impl YtDlpResolver {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YtDlpConfig {
        &self.config
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, err: io::Error) -> BridgeError {
        if err.kind() == io::ErrorKind::NotFound {
            BridgeError::NotAvailable(format!(
                "yt-dlp binary not found: {}",
                self.config.binary.display()
            ))
        } else {
            BridgeError::Io(err)
        }
    }

    /// Run to completion and return stdout.
    async fn run(&self, args: Vec<String>) -> Result<String> {
        debug!(args = ?args, "running yt-dlp");
        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|err| self.spawn_error(err))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            warn!(status = ?output.status.code(), %reason, "yt-dlp failed");
            return Err(BridgeError::OperationFailed(format!("yt-dlp: {reason}")));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve_direct(&self, reference: &SourceRef) -> Result<Track> {
        let stdout = self.run(self.config.lookup_args(reference.as_str())).await?;
        parse_entries(&stdout)
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NotFound(reference.to_string()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        let stdout = self.run(self.config.search_args(query, limit)).await?;
        let mut tracks = parse_entries(&stdout);
        tracks.truncate(limit);
        Ok(tracks)
    }

    async fn open_stream(&self, source: &SourceRef) -> Result<AudioStream> {
        let args = self.config.stream_args(source.as_str());
        debug!(source = %source, "starting yt-dlp stream");

        let mut child = self
            .command(&args)
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            BridgeError::StreamUnavailable("yt-dlp stdout was not captured".to_string())
        })?;

        if let Some(stderr) = child.stderr.take() {
            let source = source.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(%source, "yt-dlp: {line}");
                }
            });
        }

        Ok(AudioStream::pipe(ProcessStream {
            stdout,
            _child: child,
        }))
    }
}
