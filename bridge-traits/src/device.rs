//! Device Information Abstraction

use crate::platform::PlatformSendSync;

/// Static facts about the device the host is running on.
pub trait DeviceInfo: PlatformSendSync {
    /// User agent string (browser) or an equivalent platform descriptor.
    fn user_agent(&self) -> Option<String>;

    /// Number of simultaneous touch points the primary input supports.
    fn max_touch_points(&self) -> u32 {
        0
    }
}
