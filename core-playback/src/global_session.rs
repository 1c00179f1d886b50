//! # Global Playback Session
//!
//! Application-wide "what's playing" state behind the mini-player. The
//! session owns the single shared output handle for the life of the
//! application and mirrors that output's events into a [`PlaybackSnapshot`].
//! Screens read the snapshot and call the operations below; nothing else
//! mutates it.

use crate::book::ActiveBook;
use crate::context::PlaybackContext;
use crate::error::{PlaybackError, Result};
use crate::listener::OutputListener;
use crate::to_millis;
use bridge_traits::{AudioOutput, OutputEvent};
use core_runtime::events::{CoreEvent, PlaybackEvent};
use core_runtime::logging::redact_url;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Observable state of the global session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub active_book: Option<ActiveBook>,
    pub current_time: f64,
    pub duration: f64,
    pub mini_player_visible: bool,
}

struct GlobalShared {
    ctx: PlaybackContext,
    output: Arc<dyn AudioOutput>,
    state_tx: watch::Sender<PlaybackSnapshot>,
}

/// Owner of the shared output and the mini-player state.
pub struct GlobalPlaybackSession {
    shared: Arc<GlobalShared>,
    _listener: OutputListener,
}

impl GlobalPlaybackSession {
    /// Take ownership of the application's output and start following its
    /// events. Must be called inside a Tokio runtime.
    pub fn new(ctx: PlaybackContext, output: Arc<dyn AudioOutput>) -> Result<Self> {
        let (state_tx, _) = watch::channel(PlaybackSnapshot::default());
        let shared = Arc::new(GlobalShared {
            ctx,
            output,
            state_tx,
        });
        let listener = spawn_listener(&shared)?;

        Ok(Self {
            shared,
            _listener: listener,
        })
    }

    /// Make `book` the active book and prime the output with its audio.
    ///
    /// Does not start playback; `is_playing` follows the output's own play
    /// events. Starting the active book again keeps the loaded source and
    /// position unless its audio path changed; a changed title or cover is
    /// still applied.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::SourceUnavailable`] if the book has no audio path.
    pub fn start(&self, book: ActiveBook) -> Result<()> {
        let current = self.shared.state_tx.borrow().active_book.clone();
        if let Some(current) = current.filter(|current| current.id == book.id) {
            if current == book {
                debug!(book_id = %book.id, "Book already active");
                return Ok(());
            }
            if current.audio_path == book.audio_path {
                debug!(book_id = %book.id, "Refreshing active book details");
                self.shared
                    .state_tx
                    .send_modify(|state| state.active_book = Some(book));
                return Ok(());
            }
        }

        let url = self
            .shared
            .ctx
            .resolver
            .resolve_audio_url(&book.audio_path, self.shared.ctx.device.is_mobile);
        if url.is_empty() {
            return Err(PlaybackError::SourceUnavailable(book.id));
        }

        info!(book_id = %book.id, url = %redact_url(&url), "Priming shared output");
        self.shared.state_tx.send_modify(|state| {
            state.active_book = Some(book);
            state.is_playing = false;
            state.current_time = 0.0;
            state.duration = 0.0;
        });
        self.shared.output.set_source(&url);
        self.shared.output.load();
        Ok(())
    }

    /// Pause, rewind and clear the active book.
    pub fn stop(&self) {
        self.shared.output.pause();
        self.shared.output.set_position(0.0);

        let mut previous = None;
        self.shared.state_tx.send_modify(|state| {
            previous = state.active_book.take().map(|book| book.id);
            *state = PlaybackSnapshot::default();
        });
        if let Some(book_id) = previous {
            self.shared
                .ctx
                .events
                .emit(CoreEvent::Playback(PlaybackEvent::Stopped { book_id }))
                .ok();
        }
    }

    /// Play or pause the active book. Without one this does nothing. A
    /// rejected play request is logged and leaves the state unchanged.
    pub async fn toggle(&self) {
        let (has_book, is_playing) = {
            let state = self.shared.state_tx.borrow();
            (state.active_book.is_some(), state.is_playing)
        };
        if !has_book {
            return;
        }

        if is_playing {
            self.shared.output.pause();
            self.shared
                .state_tx
                .send_modify(|state| state.is_playing = false);
            return;
        }

        match self.shared.output.play().await {
            Ok(()) => self
                .shared
                .state_tx
                .send_modify(|state| state.is_playing = state.active_book.is_some()),
            Err(e) => warn!(error = %e, "Mini-player play request rejected"),
        }
    }

    pub fn seek_to(&self, time: f64) {
        if !time.is_finite() {
            return;
        }
        let time = time.max(0.0);
        self.shared.output.set_position(time);
        self.shared
            .state_tx
            .send_modify(|state| state.current_time = time);
    }

    /// Show or hide the mini-player. It is only ever shown while a book is
    /// active.
    pub fn set_mini_player_visible(&self, visible: bool) {
        self.shared.state_tx.send_modify(|state| {
            state.mini_player_visible = visible && state.active_book.is_some();
        });
    }

    pub fn is_active(&self, book_id: &str) -> bool {
        self.shared
            .state_tx
            .borrow()
            .active_book
            .as_ref()
            .is_some_and(|book| book.id == book_id)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.shared.state_tx.subscribe()
    }
}

fn spawn_listener(shared: &Arc<GlobalShared>) -> Result<OutputListener> {
    let mut stream = shared.output.subscribe();
    let weak: Weak<GlobalShared> = Arc::downgrade(shared);
    OutputListener::spawn(async move {
        while let Some(event) = stream.next().await {
            let Some(shared) = weak.upgrade() else {
                break;
            };
            shared.on_output_event(event);
        }
    })
}

impl GlobalShared {
    fn on_output_event(&self, event: OutputEvent) {
        let mut completed = None;
        self.state_tx.send_if_modified(|state| {
            let Some(book) = &state.active_book else {
                // Late events from a stopped source.
                return false;
            };
            match event {
                OutputEvent::TimeUpdate { position } => state.current_time = position,
                OutputEvent::MetadataLoaded { duration } => {
                    state.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 }
                }
                OutputEvent::Played => state.is_playing = true,
                OutputEvent::Paused => state.is_playing = false,
                OutputEvent::Ended => {
                    state.is_playing = false;
                    completed = Some((book.id.clone(), state.current_time));
                }
            }
            true
        });

        if let Some((book_id, position)) = completed {
            debug!(%book_id, position_ms = to_millis(position), "Shared output finished");
            self.ctx
                .events
                .emit(CoreEvent::Playback(PlaybackEvent::Completed { book_id }))
                .ok();
        }
    }
}
