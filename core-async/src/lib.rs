//! Async runtime facade for the guild player crates.
//!
//! Every engine crate reaches the executor through this crate instead of
//! naming tokio directly, so the scheduling model (one actor task per guild,
//! cancellable I/O tasks, watch-based snapshots) is expressed against a single
//! small surface.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep, timeout and instants
//! - `sync`: Channels, locks and cancellation tokens
//! - `io`: Async byte stream traits used for audio pipes
//! - `runtime`: Blocking entry points for tests and binaries
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!     let handle = core_async::task::spawn(async move {
//!         core_async::select! {
//!             _ = child.cancelled() => None,
//!             _ = sleep(Duration::from_secs(1)) => Some(42),
//!         }
//!     });
//!     token.cancel();
//!     assert_eq!(handle.await.ok().flatten(), None);
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub use tokio::select;

pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
