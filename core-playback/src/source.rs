//! # Audio Source Resolution
//!
//! Turns a book's logical audio path into a URL the output can load, and
//! probes that URL before the session commits to it. Storage public URLs are
//! well-formed even when the object is missing or private, so every primary
//! URL is probed and the bundled demo asset takes over when the probe fails.

use crate::config::PlaybackConfig;
use bridge_traits::{Clock, HttpClient, HttpMethod, HttpRequest, ObjectStore, RetryPolicy};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Schemes the output can load directly.
const DIRECT_SCHEMES: &[&str] = &["http", "https", "blob", "data"];

/// Schemes that refer to in-memory media and never need probing.
const LOCAL_SCHEMES: &[&str] = &["blob", "data"];

/// Returns `true` if `path` is already an absolute, loadable URL.
pub fn is_absolute_url(path: &str) -> bool {
    Url::parse(path)
        .map(|url| DIRECT_SCHEMES.contains(&url.scheme()))
        .unwrap_or(false)
}

/// Outcome of resolving and probing a book's audio path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub url: String,
    /// `true` when the demo asset replaced an unusable primary source.
    pub is_fallback: bool,
}

/// Resolves audio paths against the object store and checks reachability.
pub struct UrlResolver {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    bucket: String,
    fallback_url: String,
    probe_timeout: Duration,
}

impl UrlResolver {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: &PlaybackConfig,
    ) -> Self {
        Self {
            http,
            store,
            clock,
            bucket: config.audio_bucket.clone(),
            fallback_url: config.fallback_audio_url.clone(),
            probe_timeout: config.probe_timeout,
        }
    }

    /// Map an audio path to a loadable URL.
    ///
    /// Absolute URLs pass through unchanged. Anything else is an object key
    /// in the audio bucket. Mobile hosts get a `t=<unix millis>` query
    /// parameter on storage URLs so a stale cached response is never reused.
    /// Returns an empty string for an empty path.
    pub fn resolve_audio_url(&self, path: &str, is_mobile: bool) -> String {
        let path = path.trim();
        if path.is_empty() {
            return String::new();
        }

        if is_absolute_url(path) {
            return path.to_string();
        }

        let public_url = self.store.public_url(&self.bucket, path);
        if !is_mobile {
            return public_url;
        }

        let millis = self.clock.unix_timestamp_millis().to_string();
        match Url::parse(&public_url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("t", &millis);
                url.to_string()
            }
            Err(_) => {
                let separator = if public_url.contains('?') { '&' } else { '?' };
                format!("{public_url}{separator}t={millis}")
            }
        }
    }

    /// Probe `url` with HEAD, then with a one-byte ranged GET for stores that
    /// reject HEAD. Each request is bounded by the probe timeout; any error
    /// counts as unreachable.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn check_reachable(&self, url: &str) -> bool {
        if url.starts_with('/') {
            // Host-bundled asset.
            return true;
        }

        match Url::parse(url) {
            Ok(parsed) if LOCAL_SCHEMES.contains(&parsed.scheme()) => return true,
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                debug!("Not a probeable URL");
                return false;
            }
        }

        let head = HttpRequest::new(HttpMethod::Head, url);
        if self.probe(head).await {
            return true;
        }

        let get = HttpRequest::new(HttpMethod::Get, url).header("Range", "bytes=0-0");
        let reachable = self.probe(get).await;
        if !reachable {
            warn!("Audio source unreachable");
        }
        reachable
    }

    async fn probe(&self, request: HttpRequest) -> bool {
        let method = request.method;
        let request = request.timeout(self.probe_timeout);
        let outcome = tokio::time::timeout(
            self.probe_timeout,
            self.http.execute_with_retry(request, RetryPolicy::no_retry()),
        )
        .await;

        match outcome {
            Ok(Ok(response)) => {
                debug!(?method, status = response.status, "Probe answered");
                response.is_success()
            }
            Ok(Err(e)) => {
                debug!(?method, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(
                    ?method,
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Probe timed out"
                );
                false
            }
        }
    }

    /// The always-available demo asset.
    pub fn fallback_audio_url(&self) -> &str {
        &self.fallback_url
    }

    /// Resolve, probe and fall back. Never returns an empty URL.
    pub async fn resolve_playable(&self, path: &str, is_mobile: bool) -> ResolvedSource {
        let url = self.resolve_audio_url(path, is_mobile);
        if !url.is_empty() && self.check_reachable(&url).await {
            return ResolvedSource {
                url,
                is_fallback: false,
            };
        }

        ResolvedSource {
            url: self.fallback_url.clone(),
            is_fallback: true,
        }
    }
}
