//! Search the hosted catalogue and open the first hit in a simulated player.
//!
//! ```text
//! LISTENBOOK_BACKEND_URL=https://project.backend.example \
//! LISTENBOOK_API_KEY=anon-key \
//! cargo run -p core-service --example listen -- "austen"
//! ```
//!
//! Set `LISTENBOOK_USER_ID` to checkpoint progress as that user.

use anyhow::{bail, Context};
use async_trait::async_trait;
use bridge_traits::time::LogLevel;
use bridge_traits::{AudioOutput, OutputEvent, OutputEventStream, PlayError, UserSession};
use core_library::repositories::PageRequest;
use core_runtime::events::CoreEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{bootstrap_desktop, ServiceOptions};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Pretends to play: one `TimeUpdate` per tick while playing.
struct SimulatedOutput {
    source: Mutex<Option<String>>,
    position: Mutex<f64>,
    playing: Mutex<bool>,
    events: broadcast::Sender<OutputEvent>,
}

impl SimulatedOutput {
    fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            source: Mutex::new(None),
            position: Mutex::new(0.0),
            playing: Mutex::new(false),
            events,
        })
    }

    fn tick(&self, seconds: f64) {
        if !*self.playing.lock() {
            return;
        }
        let position = {
            let mut position = self.position.lock();
            *position += seconds;
            *position
        };
        self.events.send(OutputEvent::TimeUpdate { position }).ok();
    }
}

#[async_trait]
impl AudioOutput for SimulatedOutput {
    fn set_source(&self, url: &str) {
        *self.source.lock() = Some(url.to_string());
    }

    fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    fn load(&self) {
        self.events
            .send(OutputEvent::MetadataLoaded { duration: 3600.0 })
            .ok();
    }

    async fn play(&self) -> Result<(), PlayError> {
        *self.playing.lock() = true;
        self.events.send(OutputEvent::Played).ok();
        Ok(())
    }

    fn pause(&self) {
        *self.playing.lock() = false;
        self.events.send(OutputEvent::Paused).ok();
    }

    fn set_position(&self, seconds: f64) {
        *self.position.lock() = seconds;
    }

    fn position(&self) -> f64 {
        *self.position.lock()
    }

    fn duration(&self) -> Option<f64> {
        Some(3600.0)
    }

    fn is_paused(&self) -> bool {
        !*self.playing.lock()
    }

    fn subscribe(&self) -> Box<dyn OutputEventStream> {
        Box::new(Events(self.events.subscribe()))
    }
}

struct Events(broadcast::Receiver<OutputEvent>);

#[async_trait]
impl OutputEventStream for Events {
    async fn next(&mut self) -> Option<OutputEvent> {
        loop {
            match self.0.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let backend_url =
        std::env::var("LISTENBOOK_BACKEND_URL").context("LISTENBOOK_BACKEND_URL is not set")?;
    let api_key = std::env::var("LISTENBOOK_API_KEY").context("LISTENBOOK_API_KEY is not set")?;
    let query = std::env::args().nth(1).unwrap_or_default();

    let (core, sessions) =
        bootstrap_desktop(backend_url, api_key, ServiceOptions::default()).await?;
    if let Ok(user_id) = std::env::var("LISTENBOOK_USER_ID") {
        sessions.sign_in(UserSession::new(user_id));
    }

    let mut events = core.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                CoreEvent::Notification(n) => println!("[toast] {}: {}", n.title, n.message),
                other => println!("[event] {}", other.description()),
            }
        }
    });

    let page = core.search_books(&query, PageRequest::default()).await?;
    println!("{} result(s) for {:?}", page.total, query);
    for book in &page.items {
        println!("  {} - {} ({})", book.id, book.title, book.author);
    }

    let Some(book) = page.items.first() else {
        bail!("nothing to play");
    };

    let output = SimulatedOutput::new();
    let session = core.open_player(&book.id, output.clone()).await?;
    println!("opened {:?}", session.snapshot().phase);

    session.toggle_play().await;
    for _ in 0..25 {
        output.tick(1.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let snapshot = session.snapshot();
    println!(
        "stopped at {:.0}s of {:.0}s (demo audio: {})",
        snapshot.current_time, snapshot.duration, snapshot.using_demo_audio
    );
    core.close_player(session).await;
    Ok(())
}
