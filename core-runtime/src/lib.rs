//! # Core Runtime
//!
//! Shared runtime infrastructure for the guild player:
//! - Logging and tracing setup
//! - Bridge configuration with fail-fast capability checks
//! - Typed event bus for observing sessions
//!
//! Engine crates depend on this one for configuration and events; it never
//! depends on the engine.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
