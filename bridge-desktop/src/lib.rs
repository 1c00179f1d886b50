//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `NetworkMonitor` using a TCP reachability probe
//! - `ObjectStore` building public bucket URLs for the hosted backend
//! - `SessionProvider` holding the signed-in user in process
//! - `DeviceInfo` describing a non-touch desktop host
//!
//! Desktop hosts provide their own `AudioOutput` (the webview's media
//! element or a native sink); none is bundled here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{PublicBucketStore, ReqwestHttpClient};
//!
//! let http = ReqwestHttpClient::new()?;
//! let storage = PublicBucketStore::new("https://project.backend.example");
//! ```

mod auth;
mod device;
mod http;
mod network;
mod storage;

pub use auth::StaticSessionProvider;
pub use device::DesktopDeviceInfo;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use storage::PublicBucketStore;
