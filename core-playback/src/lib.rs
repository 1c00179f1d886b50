//! # Playback Core
//!
//! Audio playback for the audiobook app: source resolution with a
//! guaranteed-playable fallback, listening-progress checkpoints, and the two
//! session types screens drive.
//!
//! ## Overview
//!
//! - [`SecureAudioSession`]: per-screen engine for the full player. Resolves
//!   and probes the book's audio, restores and checkpoints progress, and
//!   turns every failure into state or a notification.
//! - [`GlobalPlaybackSession`]: the app-wide "now playing" state behind the
//!   mini-player. Owns the one shared output.
//! - [`UrlResolver`](source::UrlResolver), [`ProgressStore`](progress::ProgressStore)
//!   and [`DeviceProfile`](device::DeviceProfile): the collaborators both
//!   sessions share through a [`PlaybackContext`].
//!
//! The two sessions never share an output handle. The full player plays
//! through its own output while mounted; the global session's output is
//! only primed by [`GlobalPlaybackSession::start`].

pub mod book;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod global_session;
mod listener;
pub mod progress;
pub mod secure_session;
pub mod source;

pub use book::ActiveBook;
pub use config::PlaybackConfig;
pub use context::{PlaybackContext, PlaybackContextBuilder};
pub use device::DeviceProfile;
pub use error::{PlaybackError, Result};
pub use global_session::{GlobalPlaybackSession, PlaybackSnapshot};
pub use secure_session::{SavedProgress, SecureAudioSession, SessionPhase, SessionSnapshot};

/// Seconds of media time to whole milliseconds for events.
pub(crate) fn to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}
