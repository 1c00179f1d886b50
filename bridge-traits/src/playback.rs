//! Audio output bridge.
//!
//! An [`AudioOutput`] is the host's media element: it owns the decoder and
//! sink, accepts transport commands and reports what happened through a
//! small fixed set of [`OutputEvent`]s. The playback core never polls the
//! element for progress; it subscribes to these events and keeps its own
//! state in sync.

use crate::platform::{PlatformSend, PlatformSendSync};
use thiserror::Error;

/// Native playback events emitted by an output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Playback position advanced (seconds of media time).
    TimeUpdate { position: f64 },
    /// Stream metadata became available; `duration` in seconds.
    MetadataLoaded { duration: f64 },
    /// The media played to its natural end.
    Ended,
    /// The element started (or resumed) producing audio.
    Played,
    /// The element paused.
    Paused,
}

/// Why an output refused to start playback.
///
/// Hosts map their native failures onto these buckets; browsers report
/// `NotAllowedError` and `NotSupportedError` DOM exceptions, which become
/// [`PlayError::NotAllowed`] and [`PlayError::NotSupported`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    /// Autoplay policy or a missing user gesture blocked playback.
    #[error("Playback not allowed: {0}")]
    NotAllowed(String),

    /// The source's container or codec cannot be decoded by the host.
    #[error("Media format not supported: {0}")]
    NotSupported(String),

    #[error("Playback failed: {0}")]
    Other(String),
}

/// Host media element.
///
/// Transport methods other than [`play`](AudioOutput::play) are fire and
/// forget, matching the behaviour of platform media elements. Their effects
/// are reported asynchronously through [`subscribe`](AudioOutput::subscribe).
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioOutput: PlatformSendSync {
    /// Replace the media source. Does not start playback.
    fn set_source(&self, url: &str);

    /// Currently configured source, if any.
    fn source(&self) -> Option<String>;

    /// Begin (or restart) fetching the current source.
    fn load(&self);

    /// Request playback. Resolves once the host accepted or rejected it.
    async fn play(&self) -> Result<(), PlayError>;

    fn pause(&self);

    /// Move the playhead to `seconds`.
    fn set_position(&self, seconds: f64);

    fn position(&self) -> f64;

    /// Duration in seconds once metadata is known.
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    /// Open a new event subscription. Each subscriber sees every event
    /// emitted after the call.
    fn subscribe(&self) -> Box<dyn OutputEventStream>;
}

/// Stream of output events.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait OutputEventStream: PlatformSend {
    /// Next event, or `None` once the output has been torn down.
    async fn next(&mut self) -> Option<OutputEvent>;
}
