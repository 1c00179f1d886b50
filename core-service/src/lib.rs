//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`CoreConfig`] (host-provided HTTP client, session
//! provider and optional device/network bridges) into the playback core and
//! the library repositories. Hosts hold one [`CoreService`] for the lifetime
//! of the app and hand it the output behind the mini-player; each full-player
//! screen then asks for its own [`SecureAudioSession`] via
//! [`CoreService::open_player`].
//!
//! Desktop apps typically enable the `desktop-shims` feature (which depends
//! on `bridge-desktop`) and call [`bootstrap_desktop`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{AudioOutput, ObjectStore};
use core_library::adapters::{
    RestBookRepository, RestClient, RestLibraryRepository, RestProgressRepository,
};
use core_library::repositories::{
    BookRepository, LibraryRepository, Page, PageRequest, ProgressRepository,
    SqliteBookRepository, SqliteLibraryRepository, SqliteProgressRepository,
};
use core_library::{Book, ListeningProgress};
use core_playback::{
    ActiveBook, DeviceProfile, GlobalPlaybackSession, PlaybackConfig, PlaybackContext,
    SecureAudioSession,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, Receiver};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::StaticSessionProvider;

/// The three repositories the service reads and writes through.
#[derive(Clone)]
pub struct LibraryStores {
    pub books: Arc<dyn BookRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub library: Arc<dyn LibraryRepository>,
}

impl LibraryStores {
    /// Hosted backend tables over the configured HTTP client.
    pub fn rest(config: &CoreConfig) -> Self {
        let client = RestClient::new(
            Arc::clone(&config.http_client),
            config.backend_url.clone(),
            config.api_key.clone(),
            Arc::clone(&config.session_provider),
        )
        .with_clock(Arc::clone(&config.clock));

        Self {
            books: Arc::new(RestBookRepository::new(client.clone())),
            progress: Arc::new(RestProgressRepository::new(client.clone())),
            library: Arc::new(RestLibraryRepository::new(client)),
        }
    }

    /// Local SQLite tables. The pool must already be migrated
    /// (see `core_library::db::create_pool`).
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            books: Arc::new(SqliteBookRepository::new(pool.clone())),
            progress: Arc::new(SqliteProgressRepository::new(pool.clone())),
            library: Arc::new(SqliteLibraryRepository::new(pool)),
        }
    }
}

impl std::fmt::Debug for LibraryStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LibraryStores { .. }")
    }
}

/// A "continue listening" row: the book and where the user left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueListening {
    pub book: Book,
    pub progress: ListeningProgress,
}

/// Optional knobs for [`CoreService::new`].
#[derive(Default)]
pub struct ServiceOptions {
    /// Playback tuning; defaults to [`PlaybackConfig::default`].
    pub playback: PlaybackConfig,
    /// Repositories; defaults to the hosted backend via [`LibraryStores::rest`].
    pub stores: Option<LibraryStores>,
    /// The app-wide output behind the mini-player.
    pub global_output: Option<Arc<dyn AudioOutput>>,
}

impl ServiceOptions {
    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_stores(mut self, stores: LibraryStores) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn with_global_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.global_output = Some(output);
        self
    }
}

struct ServiceInner {
    config: CoreConfig,
    stores: LibraryStores,
    playback: PlaybackContext,
    global: Option<GlobalPlaybackSession>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Wire the configured bridges into a running core.
    ///
    /// Detects the device profile once, builds the shared playback context
    /// and, when an output is supplied, the global playback session.
    ///
    /// # Errors
    ///
    /// `CapabilityMissing` when no `ObjectStore` is configured and no default
    /// is available, or any playback configuration error.
    pub async fn new(config: CoreConfig, options: ServiceOptions) -> Result<Self> {
        config.validate()?;

        let object_store = resolve_object_store(&config)?;
        let stores = options
            .stores
            .unwrap_or_else(|| LibraryStores::rest(&config));

        let device = DeviceProfile::detect(
            config.device_info.as_deref(),
            config.network_monitor.as_deref(),
        )
        .await;
        debug!(
            is_mobile = device.is_mobile,
            is_slow_network = device.is_slow_network,
            "Detected device profile"
        );

        let playback = PlaybackContext::builder()
            .config(options.playback)
            .http_client(Arc::clone(&config.http_client))
            .object_store(object_store)
            .progress_repository(Arc::clone(&stores.progress))
            .session_provider(Arc::clone(&config.session_provider))
            .clock(Arc::clone(&config.clock))
            .events(EventBus::new(config.event_buffer_size))
            .device(device)
            .build()?;

        let global = options
            .global_output
            .map(|output| GlobalPlaybackSession::new(playback.clone(), output))
            .transpose()?;

        info!(
            backend = %config.backend_url,
            has_global_output = global.is_some(),
            "Core service initialized"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                stores,
                playback,
                global,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn stores(&self) -> &LibraryStores {
        &self.inner.stores
    }

    pub fn playback_context(&self) -> &PlaybackContext {
        &self.inner.playback
    }

    /// The mini-player session, if the host supplied an output for it.
    pub fn global(&self) -> Option<&GlobalPlaybackSession> {
        self.inner.global.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        self.inner.playback.events()
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.events().subscribe()
    }

    // ------------------------------------------------------------------
    // Player
    // ------------------------------------------------------------------

    /// Open the full player for a catalogue book.
    ///
    /// Reads the book, primes the global session with it (so the
    /// mini-player can take over when the screen closes), hides the
    /// mini-player, and returns a session already resolving its audio
    /// through `output`.
    ///
    /// # Errors
    ///
    /// `BookNotFound` if the id is unknown; library errors from the lookup.
    pub async fn open_player(
        &self,
        book_id: &str,
        output: Arc<dyn AudioOutput>,
    ) -> Result<SecureAudioSession> {
        let book = self
            .inner
            .stores
            .books
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| CoreError::BookNotFound(book_id.to_string()))?;
        let active = ActiveBook::from(&book);

        if let Some(global) = self.global() {
            if let Err(e) = global.start(active.clone()) {
                warn!(book_id = %book_id, error = %e, "Global session not primed");
            }
            global.set_mini_player_visible(false);
        }

        let session =
            SecureAudioSession::open(self.inner.playback.clone(), active, output).await?;
        Ok(session)
    }

    /// Close a full-player session and reveal the mini-player.
    ///
    /// Awaits the session's final checkpoint.
    pub async fn close_player(&self, session: SecureAudioSession) {
        session.close().await;
        if let Some(global) = self.global() {
            global.set_mini_player_visible(true);
        }
    }

    // ------------------------------------------------------------------
    // Catalogue
    // ------------------------------------------------------------------

    pub async fn book(&self, book_id: &str) -> Result<Option<Book>> {
        Ok(self.inner.stores.books.find_by_id(book_id).await?)
    }

    pub async fn search_books(&self, query: &str, page: PageRequest) -> Result<Page<Book>> {
        Ok(self.inner.stores.books.search(query, page).await?)
    }

    pub async fn books_in_genre(&self, genre: &str, page: PageRequest) -> Result<Page<Book>> {
        Ok(self.inner.stores.books.query_by_genre(genre, page).await?)
    }

    // ------------------------------------------------------------------
    // Personal library
    // ------------------------------------------------------------------

    /// Like or unlike a book for the signed-in user; returns the new state.
    pub async fn toggle_like(&self, book_id: &str) -> Result<bool> {
        let user_id = self.require_user()?;
        let liked = self
            .inner
            .stores
            .library
            .toggle_like(&user_id, book_id)
            .await?;

        self.emit_library(LibraryEvent::LikeToggled {
            book_id: book_id.to_string(),
            liked,
        });
        Ok(liked)
    }

    /// Save or unsave a book for the signed-in user; returns the new state.
    pub async fn toggle_save(&self, book_id: &str) -> Result<bool> {
        let user_id = self.require_user()?;
        let saved = self
            .inner
            .stores
            .library
            .toggle_save(&user_id, book_id)
            .await?;

        self.emit_library(LibraryEvent::SaveToggled {
            book_id: book_id.to_string(),
            saved,
        });
        Ok(saved)
    }

    /// Anonymous users have liked nothing.
    pub async fn is_liked(&self, book_id: &str) -> Result<bool> {
        match self.current_user_id() {
            Some(user_id) => Ok(self.inner.stores.library.is_liked(&user_id, book_id).await?),
            None => Ok(false),
        }
    }

    pub async fn is_saved(&self, book_id: &str) -> Result<bool> {
        match self.current_user_id() {
            Some(user_id) => Ok(self.inner.stores.library.is_saved(&user_id, book_id).await?),
            None => Ok(false),
        }
    }

    pub async fn saved_books(&self) -> Result<Vec<Book>> {
        match self.current_user_id() {
            Some(user_id) => Ok(self.inner.stores.library.saved_books(&user_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Most recently checkpointed books for the signed-in user.
    ///
    /// Rows whose book no longer exists in the catalogue are skipped.
    pub async fn continue_listening(&self, limit: u32) -> Result<Vec<ContinueListening>> {
        let Some(user_id) = self.current_user_id() else {
            return Ok(Vec::new());
        };

        let recent = self
            .inner
            .stores
            .progress
            .recent_for_user(&user_id, limit)
            .await?;

        let mut rows = Vec::with_capacity(recent.len());
        for progress in recent {
            match self.inner.stores.books.find_by_id(&progress.book_id).await? {
                Some(book) => rows.push(ContinueListening { book, progress }),
                None => debug!(book_id = %progress.book_id, "Skipping progress for missing book"),
            }
        }
        Ok(rows)
    }

    fn current_user_id(&self) -> Option<String> {
        self.inner
            .config
            .session_provider
            .current_user()
            .map(|user| user.user_id)
    }

    fn require_user(&self) -> Result<String> {
        self.current_user_id().ok_or(CoreError::NotAuthenticated)
    }

    fn emit_library(&self, event: LibraryEvent) {
        self.events().emit(CoreEvent::Library(event)).ok();
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("config", &self.inner.config)
            .field("playback", &self.inner.playback)
            .field("has_global", &self.inner.global.is_some())
            .finish()
    }
}

fn resolve_object_store(config: &CoreConfig) -> Result<Arc<dyn ObjectStore>> {
    if let Some(store) = &config.object_store {
        return Ok(Arc::clone(store));
    }

    #[cfg(feature = "desktop-shims")]
    return Ok(Arc::new(bridge_desktop::PublicBucketStore::new(
        config.backend_url.clone(),
    )));

    #[cfg(not(feature = "desktop-shims"))]
    Err(CoreError::CapabilityMissing {
        capability: "ObjectStore".to_string(),
        message: "An ObjectStore is required to turn audio paths into URLs. \
                  Enable `desktop-shims` or set CoreConfig::object_store."
            .to_string(),
    })
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the reqwest HTTP client, the TCP-probe network monitor and desktop
/// device info from `bridge-desktop`, with the hosted backend as store.
/// Returns the session provider so the host can sign users in and out.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, ServiceOptions};
///
/// let (core, sessions) = bootstrap_desktop(
///     "https://project.backend.example",
///     "public-anon-key",
///     ServiceOptions::default(),
/// )
/// .await?;
/// let page = core.search_books("austen", Default::default()).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    backend_url: impl Into<String>,
    api_key: impl Into<String>,
    options: ServiceOptions,
) -> Result<(CoreService, Arc<StaticSessionProvider>)> {
    use bridge_desktop::{DesktopDeviceInfo, DesktopNetworkMonitor, ReqwestHttpClient};

    let http = ReqwestHttpClient::new()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let sessions = Arc::new(StaticSessionProvider::anonymous());

    let config = CoreConfig::builder()
        .backend_url(backend_url)
        .api_key(api_key)
        .http_client(Arc::new(http))
        .session_provider(sessions.clone())
        .network_monitor(Arc::new(DesktopNetworkMonitor::new()))
        .device_info(Arc::new(DesktopDeviceInfo::new()))
        .build()?;

    let core = CoreService::new(config, options).await?;
    Ok((core, sessions))
}
