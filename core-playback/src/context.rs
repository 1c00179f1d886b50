//! Shared collaborators for every playback session.

use crate::config::PlaybackConfig;
use crate::device::DeviceProfile;
use crate::error::{PlaybackError, Result};
use crate::progress::ProgressStore;
use crate::source::UrlResolver;
use bridge_traits::{Clock, HttpClient, ObjectStore, SessionProvider, SystemClock};
use core_library::repositories::ProgressRepository;
use core_runtime::events::EventBus;
use std::sync::Arc;

/// Everything a session needs besides its own output. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackContext {
    pub(crate) resolver: Arc<UrlResolver>,
    pub(crate) progress: Arc<ProgressStore>,
    pub(crate) sessions: Arc<dyn SessionProvider>,
    pub(crate) events: EventBus,
    pub(crate) device: DeviceProfile,
    pub(crate) config: Arc<PlaybackConfig>,
}

impl PlaybackContext {
    pub fn builder() -> PlaybackContextBuilder {
        PlaybackContextBuilder::default()
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn device(&self) -> DeviceProfile {
        self.device
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub(crate) fn current_user_id(&self) -> Option<String> {
        self.sessions.current_user().map(|user| user.user_id)
    }
}

impl std::fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("device", &self.device)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PlaybackContext`].
#[derive(Default)]
pub struct PlaybackContextBuilder {
    config: Option<PlaybackConfig>,
    http_client: Option<Arc<dyn HttpClient>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    progress_repository: Option<Arc<dyn ProgressRepository>>,
    session_provider: Option<Arc<dyn SessionProvider>>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<EventBus>,
    device: DeviceProfile,
}

impl PlaybackContextBuilder {
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn progress_repository(mut self, repo: Arc<dyn ProgressRepository>) -> Self {
        self.progress_repository = Some(repo);
        self
    }

    pub fn session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session_provider = Some(provider);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing bus; otherwise one is created with
    /// `config.event_buffer` capacity.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    pub fn build(self) -> Result<PlaybackContext> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let missing = |name: &str| PlaybackError::InvalidConfig(format!("{name} is required"));
        let http = self.http_client.ok_or_else(|| missing("http_client"))?;
        let store = self.object_store.ok_or_else(|| missing("object_store"))?;
        let repo = self
            .progress_repository
            .ok_or_else(|| missing("progress_repository"))?;
        let sessions = self
            .session_provider
            .ok_or_else(|| missing("session_provider"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(config.event_buffer));

        Ok(PlaybackContext {
            resolver: Arc::new(UrlResolver::new(http, store, clock.clone(), &config)),
            progress: Arc::new(ProgressStore::new(repo, clock)),
            sessions,
            events,
            device: self.device,
            config: Arc::new(config),
        })
    }
}
