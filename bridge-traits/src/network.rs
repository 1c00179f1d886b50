//! Network Monitoring Abstraction
//!
//! Provides network connectivity and link quality information.

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Effective link quality as reported by the host (mirrors the browser
/// Network Information API buckets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectiveConnectionType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
}

impl EffectiveConnectionType {
    /// Parse the host's textual representation (`"slow-2g"`, `"2g"`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Some(Self::Slow2g),
            "2g" => Some(Self::TwoG),
            "3g" => Some(Self::ThreeG),
            "4g" => Some(Self::FourG),
            _ => None,
        }
    }

    /// `slow-2g` and `2g` links cannot sustain progressive audio loading.
    pub fn is_slow(self) -> bool {
        matches!(self, Self::Slow2g | Self::TwoG)
    }
}

/// Network information
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// Whether the connection is metered (has data limits/costs)
    pub is_metered: bool,
    /// Whether the connection is considered expensive by the OS
    pub is_expensive: bool,
    /// Reported link quality, when the host exposes one
    pub effective_type: Option<EffectiveConnectionType>,
}

impl NetworkInfo {
    /// Returns `true` when the host reports a slow link.
    pub fn is_slow(&self) -> bool {
        self.effective_type.is_some_and(EffectiveConnectionType::is_slow)
    }
}

/// Network monitor trait
///
/// Provides network connectivity information so the playback core can:
/// - Adapt preloading on slow or metered links
/// - Report offline state instead of spinning indefinitely
///
/// # Platform Support
///
/// - **Desktop**: TCP reachability probe
/// - **iOS**: Network framework
/// - **Android**: ConnectivityManager
/// - **Web**: Navigator.onLine + Network Information API (limited)
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait NetworkMonitor: PlatformSendSync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Check if connection is metered
    async fn is_metered(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                is_metered: true,
                ..
            })
        )
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of network info updates. Implementations should
    /// emit an event whenever network status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait NetworkChangeStream: PlatformSend {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
