//! Desktop device descriptor.

use bridge_traits::device::DeviceInfo;

/// Desktop hosts are never touch-first; the user agent names the OS so the
/// core's mobile heuristics stay off.
#[derive(Debug, Clone)]
pub struct DesktopDeviceInfo {
    user_agent: String,
}

impl DesktopDeviceInfo {
    pub fn new() -> Self {
        Self {
            user_agent: format!(
                "listenbook-desktop/{} ({})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS
            ),
        }
    }

    /// Report a specific user agent (embedded webviews forward theirs).
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Default for DesktopDeviceInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceInfo for DesktopDeviceInfo {
    fn user_agent(&self) -> Option<String> {
        Some(self.user_agent.clone())
    }
}
