//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the audiobook core crates:
//! - Logging and tracing setup with redaction helpers
//! - `CoreConfig` builder with fail-fast capability validation
//! - Event bus for playback events and user-facing notifications
//!
//! Nothing here knows about books or sessions beyond the event payloads; the
//! playback and library crates depend on this one, never the reverse.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
