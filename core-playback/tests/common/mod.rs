//! Shared fakes for playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioOutput, BridgeError, HttpClient, HttpMethod, HttpRequest, HttpResponse, ObjectStore,
    OutputEvent, OutputEventStream, PlayError, SessionProvider, UserSession,
};
use bytes::Bytes;
use core_library::repositories::ProgressRepository;
use core_library::{LibraryError, ListeningProgress};
use core_playback::{DeviceProfile, PlaybackConfig, PlaybackContext};
use core_runtime::events::{CoreEvent, EventBus, EventStream, NotificationKind};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub const FALLBACK_URL: &str = "/assets/audio/demo.mp3";

// ============================================================================
// Audio output
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    SetSource(String),
    Load,
    Play,
    Pause,
    SetPosition(f64),
}

/// Records transport calls and lets the test drive output events.
pub struct FakeOutput {
    calls: Mutex<Vec<OutputCall>>,
    events: broadcast::Sender<OutputEvent>,
    play_results: Mutex<VecDeque<Result<(), PlayError>>>,
    source: Mutex<Option<String>>,
    position: Mutex<f64>,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            events,
            play_results: Mutex::new(VecDeque::new()),
            source: Mutex::new(None),
            position: Mutex::new(0.0),
        })
    }

    pub fn fail_next_play(&self, error: PlayError) {
        self.play_results.lock().push_back(Err(error));
    }

    /// Emit a native event to every subscriber.
    pub fn emit(&self, event: OutputEvent) {
        self.events.send(event).ok();
    }

    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &OutputCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn subscribers(&self) -> usize {
        self.events.receiver_count()
    }

    fn record(&self, call: OutputCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    fn set_source(&self, url: &str) {
        *self.source.lock() = Some(url.to_string());
        self.record(OutputCall::SetSource(url.to_string()));
    }

    fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    fn load(&self) {
        self.record(OutputCall::Load);
    }

    async fn play(&self) -> Result<(), PlayError> {
        self.record(OutputCall::Play);
        let result = self.play_results.lock().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.emit(OutputEvent::Played);
        }
        result
    }

    fn pause(&self) {
        self.record(OutputCall::Pause);
        self.emit(OutputEvent::Paused);
    }

    fn set_position(&self, seconds: f64) {
        *self.position.lock() = seconds;
        self.record(OutputCall::SetPosition(seconds));
    }

    fn position(&self) -> f64 {
        *self.position.lock()
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn is_paused(&self) -> bool {
        true
    }

    fn subscribe(&self) -> Box<dyn OutputEventStream> {
        Box::new(FakeEventStream(self.events.subscribe()))
    }
}

struct FakeEventStream(broadcast::Receiver<OutputEvent>);

#[async_trait]
impl OutputEventStream for FakeEventStream {
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

// ============================================================================
// HTTP
// ============================================================================

struct Route {
    fragment: String,
    status: Option<u16>,
    delay: Duration,
}

/// Answers probes by URL fragment. `None` status simulates a transport
/// failure.
pub struct FakeHttp {
    default_status: Option<u16>,
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<(HttpMethod, String)>>,
}

impl FakeHttp {
    pub fn answering(status: u16) -> Arc<Self> {
        Arc::new(Self {
            default_status: Some(status),
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            default_status: None,
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn route(&self, fragment: &str, status: Option<u16>, delay: Duration) {
        self.routes.lock().push(Route {
            fragment: fragment.to_string(),
            status,
            delay,
        });
    }

    pub fn requests(&self) -> Vec<(HttpMethod, String)> {
        self.requests.lock().clone()
    }

    pub fn head_requests(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(method, _)| *method == HttpMethod::Head)
            .count()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests
            .lock()
            .push((request.method, request.url.clone()));

        let (status, delay) = {
            let routes = self.routes.lock();
            routes
                .iter()
                .find(|route| request.url.contains(&route.fragment))
                .map(|route| (route.status, route.delay))
                .unwrap_or((self.default_status, Duration::ZERO))
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match status {
            Some(status) => Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
            None => Err(BridgeError::OperationFailed("connection refused".into())),
        }
    }
}

// ============================================================================
// Storage, identity
// ============================================================================

pub struct FakeStore;

impl ObjectStore for FakeStore {
    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://storage.example/{bucket}/{key}")
    }
}

pub struct FixedSessions(pub Option<UserSession>);

impl SessionProvider for FixedSessions {
    fn current_user(&self) -> Option<UserSession> {
        self.0.clone()
    }
}

// ============================================================================
// Progress repository
// ============================================================================

/// In-memory check-then-act repository that counts every call.
#[derive(Default)]
pub struct CountingProgressRepo {
    rows: Mutex<HashMap<(String, String), ListeningProgress>>,
    pub finds: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
}

impl CountingProgressRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, progress: ListeningProgress) {
        self.rows.lock().insert(
            (progress.user_id.clone(), progress.book_id.clone()),
            progress,
        );
    }

    pub fn position(&self, user_id: &str, book_id: &str) -> Option<f64> {
        self.rows
            .lock()
            .get(&(user_id.to_string(), book_id.to_string()))
            .map(|p| p.current_position)
    }

    pub fn total_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
            + self.inserts.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inserts.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressRepository for CountingProgressRepo {
    async fn find(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> core_library::Result<Option<ListeningProgress>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .get(&(user_id.to_string(), book_id.to_string()))
            .cloned())
    }

    async fn insert(&self, progress: &ListeningProgress) -> core_library::Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let key = (progress.user_id.clone(), progress.book_id.clone());
        let mut rows = self.rows.lock();
        if rows.contains_key(&key) {
            return Err(LibraryError::InvalidInput {
                field: "listening_progress".into(),
                message: "duplicate row".into(),
            });
        }
        rows.insert(key, progress.clone());
        Ok(())
    }

    async fn update(&self, progress: &ListeningProgress) -> core_library::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let key = (progress.user_id.clone(), progress.book_id.clone());
        match self.rows.lock().get_mut(&key) {
            Some(row) => {
                *row = progress.clone();
                Ok(())
            }
            None => Err(LibraryError::NotFound {
                entity_type: "ListeningProgress".into(),
                id: format!("{}/{}", key.0, key.1),
            }),
        }
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        _limit: u32,
    ) -> core_library::Result<Vec<ListeningProgress>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, user_id: &str, book_id: &str) -> core_library::Result<bool> {
        Ok(self
            .rows
            .lock()
            .remove(&(user_id.to_string(), book_id.to_string()))
            .is_some())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub http: Arc<FakeHttp>,
    pub repo: Arc<CountingProgressRepo>,
    pub events: EventBus,
    pub ctx: PlaybackContext,
}

pub struct HarnessBuilder {
    user: Option<String>,
    device: DeviceProfile,
    http: Arc<FakeHttp>,
    repo: Arc<CountingProgressRepo>,
    progress_repo: Option<Arc<dyn ProgressRepository>>,
    config: PlaybackConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            user: None,
            device: DeviceProfile::default(),
            http: FakeHttp::answering(200),
            repo: CountingProgressRepo::new(),
            progress_repo: None,
            config: PlaybackConfig::default()
                .with_probe_timeout(Duration::from_millis(500))
                .with_mobile_settle_delay(Duration::from_millis(10)),
        }
    }

    pub fn signed_in(mut self, user_id: &str) -> Self {
        self.user = Some(user_id.to_string());
        self
    }

    pub fn device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    pub fn http(mut self, http: Arc<FakeHttp>) -> Self {
        self.http = http;
        self
    }

    /// Use a different repository than the counting one.
    pub fn progress_repository(mut self, repo: Arc<dyn ProgressRepository>) -> Self {
        self.progress_repo = Some(repo);
        self
    }

    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Harness {
        let events = EventBus::new(256);
        let progress_repo = self
            .progress_repo
            .unwrap_or_else(|| self.repo.clone() as Arc<dyn ProgressRepository>);
        let ctx = PlaybackContext::builder()
            .config(self.config)
            .http_client(self.http.clone())
            .object_store(Arc::new(FakeStore))
            .progress_repository(progress_repo)
            .session_provider(Arc::new(FixedSessions(
                self.user.map(UserSession::new),
            )))
            .events(events.clone())
            .device(self.device)
            .build()
            .expect("valid playback context");

        Harness {
            http: self.http,
            repo: self.repo,
            events,
            ctx,
        }
    }
}

impl Harness {
    /// Subscribe before acting so notifications are not missed.
    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }
}

pub fn notification_kinds(stream: &mut EventStream) -> Vec<NotificationKind> {
    stream
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            CoreEvent::Notification(n) => Some(n.kind),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Waiting
// ============================================================================

pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    predicate: impl FnMut(&T) -> bool,
) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("state condition not reached in time")
        .expect("state channel closed")
        .clone()
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
