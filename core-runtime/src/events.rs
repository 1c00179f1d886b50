//! # Event Bus System
//!
//! Typed, broadcast-based event distribution for the audiobook core using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: strongly-typed enums for playback, library and
//!   user-facing notifications
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! Playback sessions publish transport changes and notifications here; the
//! host's toast surface and mini-player subscribe independently.
//!
//! ```text
//! ┌────────────────────┐  emit   ┌──────────┐  subscribe  ┌─────────────┐
//! │ SecureAudioSession ├────────>│          ├────────────>│ Toast layer │
//! └────────────────────┘         │ EventBus │             └─────────────┘
//! ┌────────────────────┐  emit   │          │  subscribe  ┌─────────────┐
//! │ GlobalPlayback     ├────────>│          ├────────────>│ Mini-player │
//! └────────────────────┘         └──────────┘             └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, Notification, NotificationKind};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut toasts = bus.subscribe();
//!
//! bus.emit(CoreEvent::Notification(Notification::new(
//!     NotificationKind::DemoAudio,
//!     "Using Demo Audio",
//!     "The original audio is unavailable, playing demo audio instead.",
//! )))
//! .ok();
//!
//! let event = toasts.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Notification(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers in this workspace
//! ignore that case.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback transport and progress events
    Playback(PlaybackEvent),
    /// Personal library changes (likes/saves)
    Library(LibraryEvent),
    /// Non-blocking, user-facing message
    Notification(Notification),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Notification(n) => n.kind.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Notification(n) => n.kind.severity(),
            CoreEvent::Playback(PlaybackEvent::SourceResolved { demo: true, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback. Positions are whole milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A source was resolved for a book (primary or demo fallback).
    SourceResolved {
        book_id: String,
        /// `true` when the fallback demo asset was substituted.
        demo: bool,
    },
    /// Playback started for the first time on this source.
    Started { book_id: String, title: String },
    Paused { book_id: String, position_ms: u64 },
    Resumed { book_id: String, position_ms: u64 },
    /// Playback stopped and the active book was cleared.
    Stopped { book_id: String },
    /// The book played to its end.
    Completed { book_id: String },
    /// Explicit seek or skip.
    PositionChanged {
        book_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    /// A listening-progress checkpoint was written.
    ProgressSaved { book_id: String, position_ms: u64 },
    /// Playback error occurred.
    Error {
        book_id: Option<String>,
        message: String,
        /// Whether the user can retry from the same control.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SourceResolved { .. } => "Audio source resolved",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Book finished",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::ProgressSaved { .. } => "Listening progress saved",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to the user's personal library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    LikeToggled { book_id: String, liked: bool },
    SaveToggled { book_id: String, saved: bool },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::LikeToggled { liked: true, .. } => "Book liked",
            LibraryEvent::LikeToggled { liked: false, .. } => "Book unliked",
            LibraryEvent::SaveToggled { saved: true, .. } => "Book saved",
            LibraryEvent::SaveToggled { saved: false, .. } => "Book removed from library",
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Category of a user-facing notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Primary audio unavailable; the demo asset is playing instead.
    DemoAudio,
    /// A transport control was used before the output was ready.
    PlayerNotReady,
    /// The host blocked playback until the user interacts (autoplay policy).
    PermissionRequired,
    /// The audio format cannot be played on this device.
    FormatUnsupported,
    /// Any other playback start failure.
    PlaybackFailed,
}

impl NotificationKind {
    fn description(&self) -> &str {
        match self {
            NotificationKind::DemoAudio => "Demo audio substituted",
            NotificationKind::PlayerNotReady => "Player not ready",
            NotificationKind::PermissionRequired => "Playback permission required",
            NotificationKind::FormatUnsupported => "Audio format unsupported",
            NotificationKind::PlaybackFailed => "Playback failed",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            NotificationKind::DemoAudio => EventSeverity::Info,
            NotificationKind::PlayerNotReady | NotificationKind::PermissionRequired => {
                EventSeverity::Warning
            }
            NotificationKind::FormatUnsupported | NotificationKind::PlaybackFailed => {
                EventSeverity::Error
            }
        }
    }
}

/// Toast-style message for the host UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes a notification.
    pub fn notify(&self, notification: Notification) {
        self.emit(CoreEvent::Notification(notification)).ok();
    }

    /// Creates a new subscriber to receive future events. Past events are
    /// not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let toasts = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Notification(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered matching event.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            if let Ok(event) = result {
                events.push(event);
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_notification() -> Notification {
        Notification::new(
            NotificationKind::DemoAudio,
            "Using Demo Audio",
            "Playing demo audio instead.",
        )
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Playback(PlaybackEvent::Stopped {
            book_id: "b-1".to_string(),
        });

        assert!(bus.emit(event).is_err());
        // notify swallows the missing-subscriber case
        bus.notify(demo_notification());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Playback(PlaybackEvent::Paused {
            book_id: "b-1".to_string(),
            position_ms: 12_000,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Notification(_)));

        bus.emit(CoreEvent::Library(LibraryEvent::LikeToggled {
            book_id: "b-1".to_string(),
            liked: true,
        }))
        .ok();
        bus.notify(demo_notification());

        let received = stream.recv().await.unwrap();
        assert_eq!(received, CoreEvent::Notification(demo_notification()));
    }

    #[tokio::test]
    async fn test_drain_collects_buffered_events() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());

        for position_ms in [1_000, 2_000, 3_000] {
            bus.emit(CoreEvent::Playback(PlaybackEvent::ProgressSaved {
                book_id: "b-1".to_string(),
                position_ms,
            }))
            .ok();
        }

        assert_eq!(stream.drain().len(), 3);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Playback(PlaybackEvent::ProgressSaved {
                book_id: "b-1".to_string(),
                position_ms: i * 1_000,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error_event = CoreEvent::Playback(PlaybackEvent::Error {
            book_id: None,
            message: "decoder crashed".to_string(),
            recoverable: true,
        });
        assert_eq!(error_event.severity(), EventSeverity::Error);

        let demo = CoreEvent::Notification(demo_notification());
        assert_eq!(demo.severity(), EventSeverity::Info);

        let blocked = CoreEvent::Notification(Notification::new(
            NotificationKind::PermissionRequired,
            "Tap to play",
            "Your browser blocked autoplay.",
        ));
        assert_eq!(blocked.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Playback(PlaybackEvent::Completed {
            book_id: "b-9".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Playback\""));
        assert!(json.contains("\"event\":\"Completed\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_library_event_descriptions() {
        let liked = CoreEvent::Library(LibraryEvent::LikeToggled {
            book_id: "b".into(),
            liked: true,
        });
        assert_eq!(liked.description(), "Book liked");
    }
}
