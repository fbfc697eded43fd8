//! Synchronization primitives.
//!
//! All primitives are `Send + Sync` and async-aware.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::watch;
//!
//! async fn example() {
//!     let (tx, mut rx) = watch::channel(0u8);
//!     tx.send_replace(3);
//!     let seen = rx.wait_for(|v| *v == 3).await.map(|v| *v);
//!     assert_eq!(seen.ok(), Some(3));
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore,
};

pub use tokio_util::sync::{CancellationToken, DropGuard};
