//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{
        EffectiveConnectionType, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus,
        NetworkType,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "1.1.1.1:53";

/// Desktop network monitor implementation
///
/// Connectivity is inferred from a TCP connect to a well-known resolver.
/// Desktop links are reported as unmetered with no effective type unless the
/// host overrides it (useful for throttled test setups).
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    effective_type: Option<EffectiveConnectionType>,
    cached_info: Arc<Mutex<Option<NetworkInfo>>>,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self {
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            effective_type: None,
            cached_info: Arc::new(Mutex::new(None)),
        }
    }

    /// Probe a different `host:port` for connectivity.
    pub fn with_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = addr.into();
        self
    }

    /// Report a fixed link quality, e.g. when the host is throttled.
    pub fn with_effective_type(mut self, effective_type: EffectiveConnectionType) -> Self {
        self.effective_type = Some(effective_type);
        self
    }

    /// Most recent probe result, if any probe ran.
    pub async fn last_known(&self) -> Option<NetworkInfo> {
        self.cached_info.lock().await.clone()
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            Duration::from_secs(3),
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            is_metered: false,
            is_expensive: false,
            effective_type: self.effective_type,
        };

        *self.cached_info.lock().await = Some(info.clone());
        debug!(status = ?status, "Network info updated");

        Ok(info)
    }

    async fn is_metered(&self) -> bool {
        false
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: Self {
                probe_addr: self.probe_addr.clone(),
                effective_type: self.effective_type,
                cached_info: Arc::clone(&self.cached_info),
            },
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            if self.last_status.is_some() {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }

            if let Ok(info) = self.monitor.get_network_info().await {
                if self.last_status.as_ref() != Some(&info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_probe_reports_disconnected() {
        let monitor = DesktopNetworkMonitor::new().with_probe_addr("127.0.0.1:9");
        let info = monitor.get_network_info().await.unwrap();

        assert_eq!(info.status, NetworkStatus::Disconnected);
        assert!(info.network_type.is_none());
        assert!(!info.is_metered);
        assert!(monitor.last_known().await.is_some());
    }

    #[tokio::test]
    async fn test_effective_type_override() {
        let monitor = DesktopNetworkMonitor::new()
            .with_probe_addr("127.0.0.1:9")
            .with_effective_type(EffectiveConnectionType::Slow2g);
        let info = monitor.get_network_info().await.unwrap();
        assert!(info.is_slow());
    }

    #[tokio::test]
    async fn test_change_stream_emits_first_status() {
        let monitor = DesktopNetworkMonitor::new().with_probe_addr("127.0.0.1:9");
        let mut stream = monitor.subscribe_changes().await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.status, NetworkStatus::Disconnected);
    }
}
