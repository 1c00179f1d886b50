//! Device and link-quality detection.
//!
//! Computed once when the playback context is built and treated as constant
//! for the life of the process.

use bridge_traits::{DeviceInfo, NetworkMonitor};
use tracing::{debug, warn};

/// User agent fragments that identify phones and tablets (matched
/// case-insensitively).
const MOBILE_AGENT_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceProfile {
    pub is_mobile: bool,
    pub is_slow_network: bool,
}

impl DeviceProfile {
    /// Query the host once. Missing capabilities read as a desktop on a
    /// normal link; a failing network monitor reads as not slow.
    pub async fn detect(
        device: Option<&dyn DeviceInfo>,
        network: Option<&dyn NetworkMonitor>,
    ) -> Self {
        let is_mobile = device.is_some_and(|device| {
            device.max_touch_points() > 0
                || device
                    .user_agent()
                    .is_some_and(|agent| is_mobile_user_agent(&agent))
        });

        let is_slow_network = match network {
            Some(monitor) => match monitor.get_network_info().await {
                Ok(info) => info.is_slow(),
                Err(e) => {
                    warn!(error = %e, "Network info unavailable");
                    false
                }
            },
            None => false,
        };

        let profile = Self {
            is_mobile,
            is_slow_network,
        };
        debug!(?profile, "Device profile detected");
        profile
    }

    pub fn mobile() -> Self {
        Self {
            is_mobile: true,
            is_slow_network: false,
        }
    }
}

pub fn is_mobile_user_agent(agent: &str) -> bool {
    let agent = agent.to_ascii_lowercase();
    MOBILE_AGENT_MARKERS
        .iter()
        .any(|marker| agent.contains(marker))
}
