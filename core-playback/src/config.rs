//! # Playback Configuration
//!
//! Tunables for source resolution, checkpointing and mobile workarounds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback core configuration.
///
/// Every field has a serde default, so a partial JSON document (or `{}`)
/// deserializes to a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Storage bucket holding audiobook files.
    ///
    /// Default: `"audiobooks"`.
    #[serde(default = "default_audio_bucket")]
    pub audio_bucket: String,

    /// Always-available demo asset played when the primary source fails.
    ///
    /// Default: `/assets/audio/demo.mp3` (bundled with the host).
    #[serde(default = "default_fallback_audio_url")]
    pub fallback_audio_url: String,

    /// Upper bound on each reachability request (HEAD, then GET).
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// Media-time spacing of periodic progress checkpoints.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,

    /// Pause between forcing a reload and calling play on mobile hosts.
    ///
    /// Default: 300 ms.
    #[serde(default = "default_mobile_settle_delay")]
    pub mobile_settle_delay: Duration,

    /// Manual retries allowed before `retry(false)` is ignored.
    ///
    /// Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Capacity of the event bus built when the host does not share one.
    ///
    /// Default: 64.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            audio_bucket: default_audio_bucket(),
            fallback_audio_url: default_fallback_audio_url(),
            probe_timeout: default_probe_timeout(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            mobile_settle_delay: default_mobile_settle_delay(),
            max_retries: default_max_retries(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PlaybackConfig {
    pub fn with_audio_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.audio_bucket = bucket.into();
        self
    }

    pub fn with_fallback_audio_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_audio_url = url.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_checkpoint_interval_secs(mut self, secs: u64) -> Self {
        self.checkpoint_interval_secs = secs;
        self
    }

    pub fn with_mobile_settle_delay(mut self, delay: Duration) -> Self {
        self.mobile_settle_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.audio_bucket.trim().is_empty() {
            return Err("audio_bucket must not be empty".to_string());
        }

        if self.fallback_audio_url.trim().is_empty() {
            return Err("fallback_audio_url must not be empty".to_string());
        }

        if self.probe_timeout.is_zero() {
            return Err("probe_timeout must be > 0".to_string());
        }

        if self.checkpoint_interval_secs == 0 {
            return Err("checkpoint_interval_secs must be > 0".to_string());
        }

        if self.event_buffer == 0 {
            return Err("event_buffer must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_audio_bucket() -> String {
    "audiobooks".to_string()
}

fn default_fallback_audio_url() -> String {
    "/assets/audio/demo.mp3".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_checkpoint_interval_secs() -> u64 {
    10
}

fn default_mobile_settle_delay() -> Duration {
    Duration::from_millis(300)
}

fn default_max_retries() -> u32 {
    3
}

fn default_event_buffer() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.audio_bucket, "audiobooks");
        assert_eq!(config.fallback_audio_url, "/assets/audio/demo.mp3");
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.checkpoint_interval_secs, 10);
        assert_eq!(config.mobile_settle_delay, Duration::from_millis(300));
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"audio_bucket": "narrations"}"#).unwrap();
        assert_eq!(config.audio_bucket, "narrations");
        assert_eq!(config.checkpoint_interval_secs, 10);
        assert_eq!(config, PlaybackConfig::default().with_audio_bucket("narrations"));
    }

    #[test]
    fn test_validation() {
        assert!(PlaybackConfig::default()
            .with_checkpoint_interval_secs(0)
            .validate()
            .is_err());
        assert!(PlaybackConfig::default()
            .with_fallback_audio_url("  ")
            .validate()
            .is_err());
        assert!(PlaybackConfig::default()
            .with_probe_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
