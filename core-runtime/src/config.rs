//! # Core Configuration Module
//!
//! Provides configuration management for the audiobook core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the hosted-backend coordinates and every host
//! capability the core depends on. The builder fails fast when a required
//! bridge is missing so hosts discover wiring mistakes at startup rather than
//! on first playback.
//!
//! ## Required
//!
//! - `backend_url` - Base URL of the hosted backend (REST tables + storage)
//! - `api_key` - Public (anon) API key sent with every backend request
//! - `HttpClient` - REST calls and reachability probes
//! - `SessionProvider` - Current authenticated user, if any
//!
//! ## Optional (with defaults)
//!
//! - `Clock` - defaults to [`SystemClock`]
//! - `ObjectStore` - defaults to the backend's public bucket layout when the
//!   `desktop-shims` feature is enabled
//! - `NetworkMonitor` / `DeviceInfo` - when absent the core assumes a desktop
//!   device on a fast link
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .backend_url("https://project.example.co")
//!     .api_key("public-anon-key")
//!     .http_client(Arc::new(MyHttpClient))
//!     .session_provider(Arc::new(MySessionProvider))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing backend URL and bridges
//! let config = CoreConfig::builder()
//!     .api_key("anon")
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, DeviceInfo, HttpClient, NetworkMonitor, ObjectStore, SessionProvider, SystemClock,
};
use std::sync::Arc;

/// Core configuration for the audiobook core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the hosted backend, without trailing slash
    pub backend_url: String,

    /// Public API key for the hosted backend
    pub api_key: String,

    /// HTTP client (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Current-user accessor (required)
    pub session_provider: Arc<dyn SessionProvider>,

    /// Public URL resolution for storage buckets
    pub object_store: Option<Arc<dyn ObjectStore>>,

    /// Network connectivity and link quality (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Device characteristics (optional)
    pub device_info: Option<Arc<dyn DeviceInfo>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Buffer size for the core event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("backend_url", &self.backend_url)
            .field("api_key", &"[REDACTED]")
            .field("http_client", &"HttpClient { ... }")
            .field("session_provider", &"SessionProvider { ... }")
            .field(
                "object_store",
                &self.object_store.as_ref().map(|_| "ObjectStore { ... }"),
            )
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field(
                "device_info",
                &self.device_info.as_ref().map(|_| "DeviceInfo { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Backend URL is non-empty and uses http(s)
    /// - API key is non-empty
    /// - Event buffer is within bounds
    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            return Err(Error::Config("Backend URL cannot be empty".to_string()));
        }

        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "Backend URL must start with http:// or https://, got '{}'",
                self.backend_url
            )));
        }

        if self.api_key.trim().is_empty() {
            return Err(Error::Config("API key cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size must be between 1 and 10,000".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the REST endpoint for a table.
    pub fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.backend_url, table)
    }
}

fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for backend access and audio probes. \
                 Desktop: use bridge_desktop::ReqwestHttpClient. \
                 Mobile/Web: inject the platform HTTP stack."
            .to_string(),
    }
}

fn session_provider_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SessionProvider".to_string(),
        message: "SessionProvider implementation is required to decide whether listening \
                 progress is persisted. Inject an anonymous provider for signed-out hosts."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    backend_url: Option<String>,
    api_key: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    session_provider: Option<Arc<dyn SessionProvider>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    device_info: Option<Arc<dyn DeviceInfo>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the backend base URL. A trailing slash is removed.
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.backend_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    /// use bridge_traits::{HttpClient, HttpRequest, HttpResponse, BridgeError};
    /// use async_trait::async_trait;
    /// use std::sync::Arc;
    ///
    /// struct MyHttpClient;
    ///
    /// #[async_trait]
    /// impl HttpClient for MyHttpClient {
    ///     async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, BridgeError> {
    ///         unimplemented!()
    ///     }
    /// }
    ///
    /// let builder = CoreConfig::builder().http_client(Arc::new(MyHttpClient));
    /// ```
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session_provider = Some(provider);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn device_info(mut self, info: Arc<dyn DeviceInfo>) -> Self {
        self.device_info = Some(info);
        self
    }

    /// Overrides the time source (tests use `ManualClock`).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - Backend URL or API key is missing
    /// - Required bridges are missing (HttpClient, SessionProvider)
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let backend_url = self.backend_url.ok_or_else(|| {
            Error::Config("Backend URL is required. Use .backend_url() to set it.".to_string())
        })?;

        let api_key = self.api_key.ok_or_else(|| {
            Error::Config("API key is required. Use .api_key() to set it.".to_string())
        })?;

        let http_client = self.http_client.ok_or_else(http_client_missing_error)?;
        let session_provider = self
            .session_provider
            .ok_or_else(session_provider_missing_error)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = CoreConfig {
            backend_url,
            api_key,
            http_client,
            session_provider,
            object_store: self.object_store,
            network_monitor: self.network_monitor,
            device_info: self.device_info,
            clock,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse, UserSession};

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Err(BridgeError::NotAvailable("test".to_string()))
        }
    }

    struct AnonymousSessions;

    impl SessionProvider for AnonymousSessions {
        fn current_user(&self) -> Option<UserSession> {
            None
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .backend_url("https://project.example.co/")
            .api_key("anon-key")
            .http_client(Arc::new(MockHttpClient))
            .session_provider(Arc::new(AnonymousSessions))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.backend_url, "https://project.example.co");
        assert_eq!(config.api_key, "anon-key");
        assert!(config.object_store.is_none());
        assert!(config.network_monitor.is_none());
        assert_eq!(
            config.event_buffer_size,
            crate::events::DEFAULT_EVENT_BUFFER_SIZE
        );
    }

    #[test]
    fn test_builder_requires_backend_url() {
        let result = CoreConfig::builder()
            .api_key("anon-key")
            .http_client(Arc::new(MockHttpClient))
            .session_provider(Arc::new(AnonymousSessions))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Backend URL is required")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_http_client() {
        let result = CoreConfig::builder()
            .backend_url("https://project.example.co")
            .api_key("anon-key")
            .session_provider(Arc::new(AnonymousSessions))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("expected missing capability, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_session_provider() {
        let result = CoreConfig::builder()
            .backend_url("https://project.example.co")
            .api_key("anon-key")
            .http_client(Arc::new(MockHttpClient))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "SessionProvider"
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_backend() {
        let result = complete_builder().backend_url("ftp://files").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_api_key() {
        let result = complete_builder().api_key("   ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let result = complete_builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rest_endpoint() {
        let config = complete_builder().build().unwrap();
        assert_eq!(
            config.rest_endpoint("listening_progress"),
            "https://project.example.co/rest/v1/listening_progress"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = complete_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("anon-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = complete_builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.backend_url, config.backend_url);
    }
}
