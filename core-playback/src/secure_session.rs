//! # Secure Audio Session
//!
//! The playback engine behind the full player screen. One session drives one
//! output handle owned by that screen; it never touches the application-wide
//! output held by [`GlobalPlaybackSession`](crate::GlobalPlaybackSession).
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> Resolving -> Ready -> Playing <-> Paused -> Ended
//!             |          ^
//!             v          |
//!        ErrorFallback --+
//! ```
//!
//! Resolution problems never escape as errors: an unusable primary source is
//! replaced by the bundled demo asset and reported through a
//! [`NotificationKind::DemoAudio`] notification. Playback start failures are
//! classified into distinct notifications and leave the session usable.
//!
//! ## Progress
//!
//! For signed-in listeners the session restores the saved position once the
//! output reports metadata, and checkpoints on pause, seek, end of media,
//! every `checkpoint_interval_secs` of media time and on teardown. Nothing
//! is read or written while demo audio is playing.
//!
//! ## Teardown
//!
//! Call [`SecureAudioSession::close`] when the screen goes away. Dropping the
//! session without closing it schedules the final checkpoint on the current
//! Tokio runtime instead.

use crate::book::ActiveBook;
use crate::context::PlaybackContext;
use crate::error::Result;
use crate::listener::OutputListener;
use crate::progress::CheckpointTracker;
use crate::to_millis;
use bridge_traits::{AudioOutput, OutputEvent, PlayError};
use core_runtime::events::{CoreEvent, Notification, NotificationKind, PlaybackEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Lifecycle phase of a [`SecureAudioSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    Resolving,
    /// The primary source failed; the demo asset is being substituted.
    ErrorFallback,
    Ready,
    Playing,
    Paused,
    Ended,
}

/// Checkpoint restored when the session opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavedProgress {
    pub current_position: f64,
    pub duration: Option<f64>,
}

/// Observable state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub book_id: Option<String>,
    /// Source handed to the output. Empty until resolution finishes.
    pub resolved_url: String,
    pub is_playing: bool,
    /// Seconds of media time.
    pub current_time: f64,
    /// Seconds; `0.0` until metadata is known.
    pub duration: f64,
    pub is_loading: bool,
    pub progress: Option<SavedProgress>,
    pub retry_count: u32,
    pub using_demo_audio: bool,
    pub is_mobile_device: bool,
    pub is_slow_network: bool,
}

struct Inner {
    snapshot: SessionSnapshot,
    book: Option<ActiveBook>,
    /// Incremented for every resolution; results tagged with an older value
    /// are discarded.
    generation: u64,
    /// Restored or early seek position, applied when metadata arrives.
    pending_seek: Option<f64>,
    tracker: CheckpointTracker,
    output: Option<Arc<dyn AudioOutput>>,
    listener: Option<OutputListener>,
    has_started: bool,
    closed: bool,
}

impl Inner {
    fn known_duration(&self) -> Option<f64> {
        (self.snapshot.duration > 0.0).then_some(self.snapshot.duration)
    }

    fn clamp_to_duration(&self, position: f64) -> f64 {
        match self.known_duration() {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        }
    }

    fn book_id(&self) -> String {
        self.book
            .as_ref()
            .map(|book| book.id.clone())
            .unwrap_or_default()
    }
}

struct Shared {
    ctx: PlaybackContext,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionSnapshot>,
}

/// Per-screen playback session. See the module docs.
pub struct SecureAudioSession {
    shared: Arc<Shared>,
}

impl SecureAudioSession {
    /// Create an idle session with no output attached.
    pub fn new(ctx: PlaybackContext) -> Self {
        let device = ctx.device;
        let snapshot = SessionSnapshot {
            phase: SessionPhase::Idle,
            book_id: None,
            resolved_url: String::new(),
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            is_loading: false,
            progress: None,
            retry_count: 0,
            using_demo_audio: false,
            is_mobile_device: device.is_mobile,
            is_slow_network: device.is_slow_network,
        };
        let (state_tx, _) = watch::channel(snapshot.clone());
        let tracker = CheckpointTracker::new(ctx.config.checkpoint_interval_secs);

        Self {
            shared: Arc::new(Shared {
                ctx,
                inner: Mutex::new(Inner {
                    snapshot,
                    book: None,
                    generation: 0,
                    pending_seek: None,
                    tracker,
                    output: None,
                    listener: None,
                    has_started: false,
                    closed: false,
                }),
                state_tx,
            }),
        }
    }

    /// Create a session, attach `output` and resolve `book`.
    pub async fn open(
        ctx: PlaybackContext,
        book: ActiveBook,
        output: Arc<dyn AudioOutput>,
    ) -> Result<Self> {
        let session = Self::new(ctx);
        session.attach_output(output)?;
        session.load(book).await;
        Ok(session)
    }

    /// Bind the screen's output. Replaces (and unsubscribes from) any output
    /// attached earlier. If a source is already resolved it is loaded
    /// immediately.
    pub fn attach_output(&self, output: Arc<dyn AudioOutput>) -> Result<()> {
        let listener = self.shared.spawn_listener(&output)?;
        let source = self.shared.update(|inner| {
            inner.listener = Some(listener);
            inner.output = Some(output.clone());
            let ready = !inner.snapshot.is_loading && !inner.snapshot.resolved_url.is_empty();
            ready.then(|| inner.snapshot.resolved_url.clone())
        });

        if let Some(url) = source {
            output.set_source(&url);
            output.load();
        }
        Ok(())
    }

    /// Unbind the output, pausing it if it was playing.
    pub fn detach_output(&self) {
        let (output, was_playing) = self.shared.update(|inner| {
            inner.listener = None;
            let was_playing = std::mem::take(&mut inner.snapshot.is_playing);
            if was_playing {
                inner.snapshot.phase = SessionPhase::Paused;
            }
            (inner.output.take(), was_playing)
        });

        if let (Some(output), true) = (output, was_playing) {
            output.pause();
        }
    }

    /// Resolve `book` and prepare it for playback.
    ///
    /// Loading the book that is already loaded (same id and audio path) is a
    /// no-op, including while its resolution is still in flight. Use
    /// [`retry`](Self::retry) to resolve again.
    #[instrument(skip(self, book), fields(book_id = %book.id))]
    pub async fn load(&self, book: ActiveBook) {
        let begun = {
            let mut inner = self.shared.inner.lock();
            let same_book = inner
                .book
                .as_ref()
                .is_some_and(|b| b.id == book.id && b.audio_path == book.audio_path);
            if same_book && inner.snapshot.phase != SessionPhase::Idle {
                debug!(loading = inner.snapshot.is_loading, "Book already loaded");
                None
            } else {
                let previous = inner.book.as_ref().and_then(|b| {
                    let elapsed = inner.snapshot.current_time;
                    (b.id != book.id && elapsed > 0.0 && !inner.snapshot.using_demo_audio)
                        .then(|| (b.id.clone(), elapsed, inner.known_duration()))
                });
                let begun = self.shared.begin_resolution(&mut inner, book);
                Some((begun, previous))
            }
        };

        let Some(((generation, output), previous)) = begun else {
            return;
        };
        if let Some(output) = output {
            output.pause();
        }
        if let Some((book_id, position, duration)) = previous {
            self.shared.save_for(&book_id, position, duration).await;
        }
        self.shared.resolve(generation).await;
    }

    /// Resolve the current book again.
    ///
    /// Without `force` the call is ignored while a resolution is in flight
    /// or once `max_retries` manual retries have been used. With `force` the
    /// session re-enters resolution unconditionally. Returns whether a
    /// resolution was started.
    pub async fn retry(&self, force: bool) -> bool {
        let max_retries = self.shared.ctx.config.max_retries;
        let begun = {
            let mut inner = self.shared.inner.lock();
            match inner.book.clone() {
                None => None,
                Some(_)
                    if !force
                        && (inner.snapshot.is_loading
                            || inner.snapshot.retry_count >= max_retries) =>
                {
                    None
                }
                Some(book) => {
                    let retries = inner.snapshot.retry_count + 1;
                    let begun = self.shared.begin_resolution(&mut inner, book);
                    inner.snapshot.retry_count = retries;
                    Some(begun)
                }
            }
        };

        let Some((generation, output)) = begun else {
            debug!(force, "Retry ignored");
            return false;
        };
        info!(force, "Retrying audio resolution");
        if let Some(output) = output {
            output.pause();
        }
        self.shared.resolve(generation).await;
        true
    }

    /// Start playback when stopped, pause when playing.
    ///
    /// Reports an unattached output or an unresolved source as
    /// [`NotificationKind::PlayerNotReady`]. Start failures become
    /// notifications; the session stays paused and the call can be repeated.
    pub async fn toggle_play(&self) {
        let (output, is_playing) = {
            let inner = self.shared.inner.lock();
            let ready = !inner.snapshot.is_loading && !inner.snapshot.resolved_url.is_empty();
            (
                inner.output.clone().filter(|_| ready),
                inner.snapshot.is_playing,
            )
        };

        let Some(output) = output else {
            self.shared.notify(
                NotificationKind::PlayerNotReady,
                "Player Not Ready",
                "Audio is still loading. Please try again in a moment.",
            );
            return;
        };

        if is_playing {
            self.shared.pause(output).await;
        } else {
            self.shared.play(output).await;
        }
    }

    /// Move to `time` seconds and checkpoint.
    pub async fn seek_to(&self, time: f64) {
        if !time.is_finite() {
            return;
        }
        self.shared.seek(time).await;
    }

    /// Seek by `delta_seconds`, clamped into `[0, duration]`.
    pub async fn skip(&self, delta_seconds: f64) {
        if !delta_seconds.is_finite() {
            return;
        }
        let target = {
            let inner = self.shared.inner.lock();
            inner.clamp_to_duration(inner.snapshot.current_time + delta_seconds)
        };
        self.shared.seek(target).await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state_tx.borrow().clone()
    }

    /// Watch state changes. The receiver starts with the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// Tear down: unsubscribe from the output, pause it and write the final
    /// checkpoint.
    pub async fn close(self) {
        if let Some(position) = self.shared.begin_teardown() {
            self.shared.checkpoint(position).await;
        }
    }
}

impl Drop for SecureAudioSession {
    fn drop(&mut self) {
        let Some(position) = self.shared.begin_teardown() else {
            return;
        };
        let shared = self.shared.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { shared.checkpoint(position).await });
            }
            Err(_) => warn!(position, "No runtime at teardown; final checkpoint skipped"),
        }
    }
}

impl Shared {
    /// Mutate state under the lock and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock();
        let result = f(&mut inner);
        self.state_tx.send_replace(inner.snapshot.clone());
        result
    }

    fn emit(&self, event: PlaybackEvent) {
        self.ctx.events.emit(CoreEvent::Playback(event)).ok();
    }

    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        self.ctx
            .events
            .notify(Notification::new(kind, title, message));
    }

    fn spawn_listener(self: &Arc<Self>, output: &Arc<dyn AudioOutput>) -> Result<OutputListener> {
        let mut stream = output.subscribe();
        let weak = Arc::downgrade(self);
        OutputListener::spawn(async move {
            while let Some(event) = stream.next().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.on_output_event(event).await;
            }
        })
    }

    /// Reset per-source state and enter `Resolving`. Returns the new
    /// generation and the output to quiet, if one is playing.
    fn begin_resolution(
        &self,
        inner: &mut Inner,
        book: ActiveBook,
    ) -> (u64, Option<Arc<dyn AudioOutput>>) {
        inner.generation += 1;
        let was_playing = inner.snapshot.is_playing;

        inner.snapshot.phase = SessionPhase::Resolving;
        inner.snapshot.book_id = Some(book.id.clone());
        inner.snapshot.resolved_url.clear();
        inner.snapshot.is_playing = false;
        inner.snapshot.current_time = 0.0;
        inner.snapshot.duration = 0.0;
        inner.snapshot.is_loading = true;
        inner.snapshot.progress = None;
        inner.book = Some(book);
        inner.pending_seek = None;
        inner.tracker.reset(0.0);
        inner.has_started = false;
        self.state_tx.send_replace(inner.snapshot.clone());

        let output = inner.output.clone().filter(|_| was_playing);
        (inner.generation, output)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().generation == generation
    }

    async fn resolve(&self, generation: u64) {
        let book = {
            let inner = self.inner.lock();
            match &inner.book {
                Some(book) if inner.generation == generation => book.clone(),
                _ => return,
            }
        };

        let resolved = self
            .ctx
            .resolver
            .resolve_playable(&book.audio_path, self.ctx.device.is_mobile)
            .await;
        if !self.is_current(generation) {
            debug!(book_id = %book.id, "Discarding superseded resolution");
            return;
        }

        if resolved.is_fallback {
            self.update(|inner| inner.snapshot.phase = SessionPhase::ErrorFallback);
            warn!(book_id = %book.id, "Primary audio unavailable; substituting demo audio");
            self.update(|inner| {
                inner.snapshot.using_demo_audio = true;
                inner.snapshot.retry_count = 0;
                inner.snapshot.resolved_url = resolved.url.clone();
            });
            self.notify(
                NotificationKind::DemoAudio,
                "Using Demo Audio",
                "The original audio file is unavailable. Playing demo audio instead.",
            );
        } else {
            self.update(|inner| {
                inner.snapshot.using_demo_audio = false;
                inner.snapshot.resolved_url = resolved.url.clone();
            });
            self.restore_progress(generation, &book.id).await;
        }

        let Some(output) = self.update(|inner| {
            if inner.generation != generation {
                return None;
            }
            inner.snapshot.phase = SessionPhase::Ready;
            inner.snapshot.is_loading = false;
            Some(inner.output.clone())
        }) else {
            return;
        };

        info!(
            book_id = %book.id,
            url = %redact_url(&resolved.url),
            demo = resolved.is_fallback,
            "Audio source ready"
        );
        if let Some(output) = output {
            output.set_source(&resolved.url);
            output.load();
        }
        self.emit(PlaybackEvent::SourceResolved {
            book_id: book.id,
            demo: resolved.is_fallback,
        });
    }

    /// Seed the saved position for signed-in listeners on primary audio.
    async fn restore_progress(&self, generation: u64, book_id: &str) {
        let Some(user_id) = self.ctx.current_user_id() else {
            debug!("Anonymous listener; progress not restored");
            return;
        };

        match self.ctx.progress.load(&user_id, book_id).await {
            Ok(Some(saved)) if saved.current_position > 0.0 => {
                self.update(|inner| {
                    if inner.generation != generation || inner.snapshot.using_demo_audio {
                        return;
                    }
                    debug!(position = saved.current_position, "Restoring saved position");
                    inner.snapshot.progress = Some(SavedProgress {
                        current_position: saved.current_position,
                        duration: saved.duration,
                    });
                    inner.pending_seek = Some(saved.current_position);
                    inner.tracker.reset(saved.current_position);
                });
            }
            Ok(_) => {}
            Err(e) => warn!(book_id, error = %e, "Failed to load listening progress"),
        }
    }

    async fn play(&self, output: Arc<dyn AudioOutput>) {
        if self.ctx.device.is_mobile {
            // Mobile browsers only start reliably on a freshly loaded element.
            // Reloading rewinds the element, so capture the position first.
            let resume_at = {
                let inner = self.inner.lock();
                inner.pending_seek.unwrap_or(inner.snapshot.current_time)
            };
            output.load();
            tokio::time::sleep(self.ctx.config.mobile_settle_delay).await;
            if resume_at > 0.0 {
                output.set_position(resume_at);
                self.update(|inner| {
                    inner.snapshot.current_time = resume_at;
                    inner.tracker.reset(resume_at);
                });
            }
        }

        match output.play().await {
            Ok(()) => {
                let (first_start, book, position) = self.update(|inner| {
                    inner.snapshot.is_playing = true;
                    inner.snapshot.phase = SessionPhase::Playing;
                    inner.snapshot.retry_count = 0;
                    let first = !std::mem::replace(&mut inner.has_started, true);
                    (first, inner.book.clone(), inner.snapshot.current_time)
                });
                let Some(book) = book else { return };
                if first_start {
                    self.emit(PlaybackEvent::Started {
                        book_id: book.id,
                        title: book.title,
                    });
                } else {
                    self.emit(PlaybackEvent::Resumed {
                        book_id: book.id,
                        position_ms: to_millis(position),
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "Playback start rejected");
                let book_id = self.update(|inner| {
                    inner.snapshot.is_playing = false;
                    inner.book.as_ref().map(|book| book.id.clone())
                });
                let (kind, title, message) = play_failure_notice(&e);
                self.notify(kind, title, message);
                self.emit(PlaybackEvent::Error {
                    book_id,
                    message: e.to_string(),
                    recoverable: true,
                });
            }
        }
    }

    async fn pause(&self, output: Arc<dyn AudioOutput>) {
        output.pause();
        let (book_id, position) = self.update(|inner| {
            inner.snapshot.is_playing = false;
            inner.snapshot.phase = SessionPhase::Paused;
            (inner.book_id(), inner.snapshot.current_time)
        });
        self.emit(PlaybackEvent::Paused {
            book_id,
            position_ms: to_millis(position),
        });
        self.checkpoint(position).await;
    }

    async fn seek(&self, time: f64) {
        let (output, position, book_id, duration) = self.update(|inner| {
            let position = inner.clamp_to_duration(time);
            inner.snapshot.current_time = position;
            inner.tracker.reset(position);
            if inner.output.is_none() || inner.known_duration().is_none() {
                inner.pending_seek = Some(position);
            }
            (
                inner.output.clone(),
                position,
                inner.book_id(),
                inner.snapshot.duration,
            )
        });

        if let Some(output) = output {
            output.set_position(position);
        }
        self.emit(PlaybackEvent::PositionChanged {
            book_id,
            position_ms: to_millis(position),
            duration_ms: to_millis(duration),
        });
        self.checkpoint(position).await;
    }

    async fn on_output_event(&self, event: OutputEvent) {
        match event {
            OutputEvent::TimeUpdate { position } => {
                let due = self.update(|inner| {
                    inner.snapshot.current_time = position;
                    if inner.snapshot.is_playing && !inner.snapshot.using_demo_audio {
                        inner.tracker.observe(position)
                    } else {
                        inner.tracker.reset(position);
                        false
                    }
                });
                if due {
                    self.checkpoint(position).await;
                }
            }
            OutputEvent::MetadataLoaded { duration } => {
                let seek = self.update(|inner| {
                    inner.snapshot.duration = if duration.is_finite() && duration > 0.0 {
                        duration
                    } else {
                        0.0
                    };
                    let target = inner.pending_seek.take()?;
                    let position = inner.clamp_to_duration(target);
                    inner.snapshot.current_time = position;
                    inner.tracker.reset(position);
                    inner.output.clone().map(|output| (output, position))
                });
                if let Some((output, position)) = seek {
                    debug!(position, "Applying start position");
                    output.set_position(position);
                }
            }
            OutputEvent::Played => {
                self.update(|inner| {
                    inner.snapshot.is_playing = true;
                    inner.snapshot.phase = SessionPhase::Playing;
                });
            }
            OutputEvent::Paused => {
                self.update(|inner| {
                    inner.snapshot.is_playing = false;
                    if inner.snapshot.phase == SessionPhase::Playing {
                        inner.snapshot.phase = SessionPhase::Paused;
                    }
                });
            }
            OutputEvent::Ended => {
                let book_id = self.update(|inner| {
                    inner.snapshot.is_playing = false;
                    inner.snapshot.phase = SessionPhase::Ended;
                    inner.snapshot.current_time = 0.0;
                    inner.tracker.reset(0.0);
                    inner.book_id()
                });
                self.emit(PlaybackEvent::Completed { book_id });
                // Position 0 marks the book finished and ready to restart.
                self.checkpoint(0.0).await;
            }
        }
    }

    /// Write a checkpoint for the current book unless demo audio is active
    /// or the listener is anonymous.
    async fn checkpoint(&self, position: f64) {
        let target = {
            let inner = self.inner.lock();
            if inner.snapshot.using_demo_audio {
                None
            } else {
                inner
                    .book
                    .as_ref()
                    .map(|book| (book.id.clone(), inner.known_duration()))
            }
        };
        if let Some((book_id, duration)) = target {
            self.save_for(&book_id, position, duration).await;
        }
    }

    async fn save_for(&self, book_id: &str, position: f64, duration: Option<f64>) {
        let Some(user_id) = self.ctx.current_user_id() else {
            return;
        };

        match self
            .ctx
            .progress
            .save(&user_id, book_id, position, duration)
            .await
        {
            Ok(saved) => self.emit(PlaybackEvent::ProgressSaved {
                book_id: book_id.to_string(),
                position_ms: to_millis(saved.current_position),
            }),
            Err(e) => warn!(book_id, position, error = %e, "Failed to save listening progress"),
        }
    }

    /// Detach everything once. Returns the position for the final
    /// checkpoint, if one is owed.
    fn begin_teardown(&self) -> Option<f64> {
        let (output, position) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return None;
            }
            inner.closed = true;
            inner.listener = None;
            let output = inner.output.take().filter(|_| inner.snapshot.is_playing);
            inner.snapshot.is_playing = false;
            let owed = inner.book.is_some()
                && inner.snapshot.current_time > 0.0
                && !inner.snapshot.using_demo_audio;
            self.state_tx.send_replace(inner.snapshot.clone());
            (output, owed.then_some(inner.snapshot.current_time))
        };

        if let Some(output) = output {
            output.pause();
        }
        position
    }
}

fn play_failure_notice(err: &PlayError) -> (NotificationKind, &'static str, &'static str) {
    match err {
        PlayError::NotAllowed(_) => (
            NotificationKind::PermissionRequired,
            "Playback Permission Required",
            "Tap play again to allow audio playback.",
        ),
        PlayError::NotSupported(_) => (
            NotificationKind::FormatUnsupported,
            "Audio Format Not Supported",
            "This audio format can't be played on your device.",
        ),
        PlayError::Other(_) => (
            NotificationKind::PlaybackFailed,
            "Playback Error",
            "Unable to play audio. Please try again.",
        ),
    }
}
