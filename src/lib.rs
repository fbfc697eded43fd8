//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Bot hosts can depend on `guild-player-workspace` and enable
//! `desktop-shims` to get the yt-dlp resolver and log-backed notifier wired in
//! without naming each crate.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
